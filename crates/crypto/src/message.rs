//! Versioned binary messages exchanged while joining a project
//!
//! Every message starts with a header of `version` (compact varint) followed by
//! a one-byte ASCII type tag. Decoding checks the tag and then the version
//! before it touches the body, so an invite fed to the join request decoder
//! fails with a type error instead of garbage.
//!
//! Kinds with optional fields carry a presence bitfield right after the
//! header, one bit per optional field in declaration order.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{
    BACKUP_CODE_BYTES, INVITE_SECRET_MESSAGE_TYPE, INVITE_SECRET_MESSAGE_VERSION, INVITE_TYPE,
    INVITE_VERSION, JOIN_REQUEST_TYPE, JOIN_REQUEST_VERSION, ROOT_KEY_SIZE,
};
use crate::keys::PublicKey;

/// Errors that can occur when decoding a message
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("invalid message buffer: {0}")]
    InvalidMessageBuffer(String),
    #[error("invalid message buffer: expected type {expected}, got {actual}")]
    UnexpectedMessageType { expected: char, actual: char },
    #[error("invalid version: expected version {expected}, got {actual}")]
    UnsupportedVersion { expected: u64, actual: u64 },
}

impl MessageError {
    fn truncated(field: &str) -> Self {
        MessageError::InvalidMessageBuffer(format!("buffer too short for {field}"))
    }
}

/// The kinds of message with a versioned header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    JoinRequest,
    Invite,
    InviteSecretMessage,
}

impl MessageKind {
    /// Version this crate writes and accepts
    pub fn version(&self) -> u64 {
        match self {
            MessageKind::JoinRequest => JOIN_REQUEST_VERSION,
            MessageKind::Invite => INVITE_VERSION,
            MessageKind::InviteSecretMessage => INVITE_SECRET_MESSAGE_VERSION,
        }
    }

    /// Single-byte type tag written after the version
    pub fn type_tag(&self) -> u8 {
        match self {
            MessageKind::JoinRequest => JOIN_REQUEST_TYPE,
            MessageKind::Invite => INVITE_TYPE,
            MessageKind::InviteSecretMessage => INVITE_SECRET_MESSAGE_TYPE,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::JoinRequest => f.write_str("join request"),
            MessageKind::Invite => f.write_str("invite"),
            MessageKind::InviteSecretMessage => f.write_str("invite secret message"),
        }
    }
}

/// A message with a versioned, tagged header
///
/// Implementors only describe their body; the header is written and checked
/// by [`encode_message`] and [`decode_message`].
pub trait Message: Sized {
    const KIND: MessageKind;

    /// Append the body (everything after the header) to `buf`
    fn encode_body(&self, buf: &mut Vec<u8>);

    /// Read the body from `buf`, advancing it past the consumed bytes
    fn decode_body(buf: &mut &[u8]) -> Result<Self, MessageError>;

    fn encode(&self) -> Vec<u8> {
        encode_message(self)
    }

    fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        decode_message(bytes)
    }
}

/// Encode a message with its header
pub fn encode_message<M: Message>(message: &M) -> Vec<u8> {
    let mut buf = Vec::new();
    put_uint(&mut buf, M::KIND.version());
    buf.put_u8(M::KIND.type_tag());
    message.encode_body(&mut buf);
    buf
}

/// Decode a message, checking the type tag and then the version before
/// parsing the body
///
/// # Errors
///
/// Returns an error if:
/// - The header cannot be read
/// - The type tag belongs to another kind of message
/// - The version is not the one this crate supports
/// - The body is malformed or followed by trailing bytes
pub fn decode_message<M: Message>(bytes: &[u8]) -> Result<M, MessageError> {
    let mut buf = bytes;
    let version = get_uint(&mut buf, "version")?;
    let tag = get_u8(&mut buf, "type")?;

    let expected = M::KIND;
    if tag != expected.type_tag() {
        tracing::trace!(kind = %expected, tag, "message type mismatch");
        return Err(MessageError::UnexpectedMessageType {
            expected: char::from(expected.type_tag()),
            actual: char::from(tag),
        });
    }
    if version != expected.version() {
        return Err(MessageError::UnsupportedVersion {
            expected: expected.version(),
            actual: version,
        });
    }

    let message = M::decode_body(&mut buf)?;
    if buf.has_remaining() {
        return Err(MessageError::InvalidMessageBuffer(format!(
            "{} trailing bytes after {expected}",
            buf.remaining()
        )));
    }
    Ok(message)
}

/// Request to join a project, sent in the clear by the joining device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Identity public key of the device asking to join
    pub identity_public_key: PublicKey,
    /// Address the inviter can reach the joiner on directly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<SocketAddrV4>,
    /// Name shown to the inviter. Not encrypted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl JoinRequest {
    const HAS_HOST: u64 = 1 << 0;
    const HAS_NAME: u64 = 1 << 1;

    pub fn new(identity_public_key: PublicKey) -> Self {
        Self {
            identity_public_key,
            host: None,
            name: None,
        }
    }

    pub fn with_host(mut self, host: SocketAddrV4) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Message for JoinRequest {
    const KIND: MessageKind = MessageKind::JoinRequest;

    fn encode_body(&self, buf: &mut Vec<u8>) {
        let mut flags = 0;
        if self.host.is_some() {
            flags |= Self::HAS_HOST;
        }
        if self.name.is_some() {
            flags |= Self::HAS_NAME;
        }
        put_uint(buf, flags);
        buf.put_slice(self.identity_public_key.as_bytes());
        if let Some(host) = &self.host {
            buf.put_slice(&host.ip().octets());
            buf.put_u16_le(host.port());
        }
        if let Some(name) = &self.name {
            put_bytes(buf, name.as_bytes());
        }
    }

    fn decode_body(buf: &mut &[u8]) -> Result<Self, MessageError> {
        let flags = get_flags(buf, Self::HAS_HOST | Self::HAS_NAME)?;
        let identity_public_key = PublicKey::from(get_fixed32(buf, "identity public key")?);

        let host = if flags & Self::HAS_HOST != 0 {
            let mut octets = [0u8; 4];
            get_exact(buf, &mut octets, "host address")?;
            ensure(buf, 2, "host port")?;
            Some(SocketAddrV4::new(Ipv4Addr::from(octets), buf.get_u16_le()))
        } else {
            None
        };

        let name = if flags & Self::HAS_NAME != 0 {
            let bytes = get_bytes(buf, "name")?;
            let name = String::from_utf8(bytes).map_err(|_| {
                MessageError::InvalidMessageBuffer("name is not valid utf-8".to_string())
            })?;
            Some(name)
        } else {
            None
        };

        Ok(Self {
            identity_public_key,
            host,
            name,
        })
    }
}

/// Envelope carrying an encrypted [`InviteSecretMessage`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    /// Public half of the single-use exchange keypair the invite was sealed with
    pub ephemeral_public_key: [u8; 32],
    pub encrypted_message: Vec<u8>,
}

impl Message for Invite {
    const KIND: MessageKind = MessageKind::Invite;

    fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.put_slice(&self.ephemeral_public_key);
        put_bytes(buf, &self.encrypted_message);
    }

    fn decode_body(buf: &mut &[u8]) -> Result<Self, MessageError> {
        let ephemeral_public_key = get_fixed32(buf, "ephemeral public key")?;
        let encrypted_message = get_bytes(buf, "encrypted message")?;
        Ok(Self {
            ephemeral_public_key,
            encrypted_message,
        })
    }
}

/// Plaintext of an invite
///
/// Holds the project key and optionally the key project data is encrypted
/// with. Zeroed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct InviteSecretMessage {
    pub project_key: [u8; 32],
    /// Without it the joiner can sync the project but not read its data
    pub encryption_key: Option<[u8; 32]>,
}

impl fmt::Debug for InviteSecretMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InviteSecretMessage")
            .field("project_key", &"[redacted]")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl InviteSecretMessage {
    const HAS_ENCRYPTION_KEY: u64 = 1 << 0;
}

impl Message for InviteSecretMessage {
    const KIND: MessageKind = MessageKind::InviteSecretMessage;

    fn encode_body(&self, buf: &mut Vec<u8>) {
        let flags = if self.encryption_key.is_some() {
            Self::HAS_ENCRYPTION_KEY
        } else {
            0
        };
        put_uint(buf, flags);
        buf.put_slice(&self.project_key);
        if let Some(key) = &self.encryption_key {
            buf.put_slice(key);
        }
    }

    fn decode_body(buf: &mut &[u8]) -> Result<Self, MessageError> {
        let flags = get_flags(buf, Self::HAS_ENCRYPTION_KEY)?;
        let project_key = get_fixed32(buf, "project key")?;
        let encryption_key = if flags & Self::HAS_ENCRYPTION_KEY != 0 {
            Some(get_fixed32(buf, "encryption key")?)
        } else {
            None
        };
        Ok(Self {
            project_key,
            encryption_key,
        })
    }
}

/// Raw form of a backup code: root key followed by its CRC16 (little endian)
///
/// Has no header, the surrounding `M` prefix identifies it.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct BackupCodeBytes {
    pub root_key: [u8; ROOT_KEY_SIZE],
    pub crc16: u16,
}

impl fmt::Debug for BackupCodeBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupCodeBytes")
            .field("root_key", &"[redacted]")
            .field("crc16", &format_args!("{:#06x}", self.crc16))
            .finish()
    }
}

impl BackupCodeBytes {
    pub fn encode(&self) -> [u8; BACKUP_CODE_BYTES] {
        let mut out = [0u8; BACKUP_CODE_BYTES];
        let mut buf = &mut out[..];
        buf.put_slice(&self.root_key);
        buf.put_u16_le(self.crc16);
        out
    }

    /// # Errors
    ///
    /// Returns an error unless `bytes` is exactly 18 bytes long.
    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        if bytes.len() != BACKUP_CODE_BYTES {
            return Err(MessageError::InvalidMessageBuffer(format!(
                "backup code must be {BACKUP_CODE_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        let mut buf = bytes;
        let mut root_key = [0u8; ROOT_KEY_SIZE];
        buf.copy_to_slice(&mut root_key);
        let crc16 = buf.get_u16_le();
        Ok(Self { root_key, crc16 })
    }
}

// Compact unsigned varint: values below 0xfd are a single byte, larger values
// are a marker byte followed by a little endian u16, u32 or u64.
fn put_uint(buf: &mut Vec<u8>, n: u64) {
    if n < 0xfd {
        buf.put_u8(n as u8);
    } else if n <= u64::from(u16::MAX) {
        buf.put_u8(0xfd);
        buf.put_u16_le(n as u16);
    } else if n <= u64::from(u32::MAX) {
        buf.put_u8(0xfe);
        buf.put_u32_le(n as u32);
    } else {
        buf.put_u8(0xff);
        buf.put_u64_le(n);
    }
}

fn get_uint(buf: &mut &[u8], field: &str) -> Result<u64, MessageError> {
    match get_u8(buf, field)? {
        0xfd => {
            ensure(buf, 2, field)?;
            Ok(u64::from(buf.get_u16_le()))
        }
        0xfe => {
            ensure(buf, 4, field)?;
            Ok(u64::from(buf.get_u32_le()))
        }
        0xff => {
            ensure(buf, 8, field)?;
            Ok(buf.get_u64_le())
        }
        n => Ok(u64::from(n)),
    }
}

fn get_flags(buf: &mut &[u8], known: u64) -> Result<u64, MessageError> {
    let flags = get_uint(buf, "flags")?;
    if flags & !known != 0 {
        return Err(MessageError::InvalidMessageBuffer(format!(
            "unknown optional field flags {flags:#x}"
        )));
    }
    Ok(flags)
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_uint(buf, bytes.len() as u64);
    buf.put_slice(bytes);
}

fn get_bytes(buf: &mut &[u8], field: &str) -> Result<Vec<u8>, MessageError> {
    let len = get_uint(buf, field)?;
    let len = usize::try_from(len).map_err(|_| MessageError::truncated(field))?;
    ensure(buf, len, field)?;
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    Ok(bytes)
}

fn get_u8(buf: &mut &[u8], field: &str) -> Result<u8, MessageError> {
    ensure(buf, 1, field)?;
    Ok(buf.get_u8())
}

fn get_fixed32(buf: &mut &[u8], field: &str) -> Result<[u8; 32], MessageError> {
    let mut out = [0u8; 32];
    get_exact(buf, &mut out, field)?;
    Ok(out)
}

fn get_exact(buf: &mut &[u8], out: &mut [u8], field: &str) -> Result<(), MessageError> {
    ensure(buf, out.len(), field)?;
    buf.copy_to_slice(out);
    Ok(())
}

fn ensure(buf: &[u8], len: usize, field: &str) -> Result<(), MessageError> {
    if buf.remaining() < len {
        return Err(MessageError::truncated(field));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn public_key() -> PublicKey {
        PublicKey::from([7u8; 32])
    }

    #[test]
    fn test_join_request_layout() {
        let encoded = JoinRequest::new(public_key()).encode();
        // version, type, flags, key
        assert_eq!(&encoded[..3], &[1, b'J', 0]);
        assert_eq!(&encoded[3..], &[7u8; 32]);
    }

    #[test]
    fn test_join_request_with_optional_fields() {
        let request = JoinRequest::new(public_key())
            .with_host(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 20), 8080))
            .with_name("Field laptop");
        let encoded = request.encode();
        assert_eq!(encoded[2], 0b11);
        assert_eq!(&encoded[35..39], &[192, 168, 1, 20]);
        assert_eq!(&encoded[39..41], &8080u16.to_le_bytes());

        let decoded = JoinRequest::decode(&encoded).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let request = JoinRequest::new(public_key()).with_name("only a name");
        let decoded = JoinRequest::decode(&request.encode()).unwrap();
        assert_eq!(decoded.host, None);
        assert_eq!(decoded.name.as_deref(), Some("only a name"));

        let json = serde_json::to_value(&JoinRequest::new(public_key())).unwrap();
        assert!(json.get("host").is_none());
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_invite_secret_message_roundtrip() {
        let without = InviteSecretMessage {
            project_key: [1u8; 32],
            encryption_key: None,
        };
        let with = InviteSecretMessage {
            project_key: [1u8; 32],
            encryption_key: Some([2u8; 32]),
        };
        assert_eq!(without.encode().len(), 3 + 32);
        assert_eq!(with.encode().len(), 3 + 64);
        assert_eq!(InviteSecretMessage::decode(&without.encode()).unwrap(), without);
        assert_eq!(InviteSecretMessage::decode(&with.encode()).unwrap(), with);
    }

    #[test]
    fn test_secret_message_debug_is_redacted() {
        let secret = InviteSecretMessage {
            project_key: [0xab; 32],
            encryption_key: Some([0xcd; 32]),
        };
        let debug = format!("{secret:?}");
        assert!(!debug.contains(&hex::encode([0xab; 32])));
        assert!(!debug.contains("ab"));
        assert!(!debug.contains("cd"));
    }

    #[test]
    fn test_invite_roundtrip() {
        let invite = Invite {
            ephemeral_public_key: [3u8; 32],
            encrypted_message: vec![9u8; 300],
        };
        let encoded = invite.encode();
        // 300 needs the u16 length form
        assert_eq!(encoded[34], 0xfd);
        assert_eq!(Invite::decode(&encoded).unwrap(), invite);
    }

    #[test]
    fn test_type_checked_before_version() {
        let mut encoded = JoinRequest::new(public_key()).encode();
        encoded[0] = 2;
        encoded[1] = b'I';
        assert!(matches!(
            JoinRequest::decode(&encoded),
            Err(MessageError::UnexpectedMessageType {
                expected: 'J',
                actual: 'I'
            })
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut encoded = JoinRequest::new(public_key()).encode();
        encoded[0] = 2;
        let err = JoinRequest::decode(&encoded).unwrap_err();
        assert!(matches!(
            err,
            MessageError::UnsupportedVersion {
                expected: 1,
                actual: 2
            }
        ));
        assert!(err.to_string().to_lowercase().contains("invalid"));
    }

    #[test]
    fn test_truncated_and_empty_buffers() {
        assert!(matches!(
            JoinRequest::decode(&[]),
            Err(MessageError::InvalidMessageBuffer(_))
        ));
        assert!(matches!(
            JoinRequest::decode(&[1]),
            Err(MessageError::InvalidMessageBuffer(_))
        ));
        let encoded = JoinRequest::new(public_key()).encode();
        assert!(matches!(
            JoinRequest::decode(&encoded[..20]),
            Err(MessageError::InvalidMessageBuffer(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut encoded = JoinRequest::new(public_key()).encode();
        encoded.push(0);
        assert!(matches!(
            JoinRequest::decode(&encoded),
            Err(MessageError::InvalidMessageBuffer(_))
        ));
    }

    #[test]
    fn test_unknown_flags_rejected() {
        let mut encoded = InviteSecretMessage {
            project_key: [1u8; 32],
            encryption_key: None,
        }
        .encode();
        encoded[2] = 0b10;
        assert!(matches!(
            InviteSecretMessage::decode(&encoded),
            Err(MessageError::InvalidMessageBuffer(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_name_rejected() {
        let mut encoded = JoinRequest::new(public_key()).with_name("ab").encode();
        let len = encoded.len();
        encoded[len - 1] = 0xff;
        assert!(JoinRequest::decode(&encoded).is_err());
    }

    #[test]
    fn test_varint_boundaries() {
        for n in [0u64, 0xfc, 0xfd, 0xffff, 0x1_0000, u64::from(u32::MAX) + 1] {
            let mut buf = Vec::new();
            put_uint(&mut buf, n);
            let mut slice = &buf[..];
            assert_eq!(get_uint(&mut slice, "n").unwrap(), n);
            assert!(slice.is_empty());
        }
    }

    #[test]
    fn test_backup_code_bytes() {
        let bytes = BackupCodeBytes {
            root_key: [5u8; 16],
            crc16: 0xa7d9,
        };
        let encoded = bytes.encode();
        assert_eq!(&encoded[16..], &[0xd9, 0xa7]);
        assert_eq!(BackupCodeBytes::decode(&encoded).unwrap(), bytes);
        assert!(BackupCodeBytes::decode(&encoded[..17]).is_err());
    }
}
