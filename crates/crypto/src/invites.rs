//! Joining a project
//!
//! Two messages travel out of band, as a QR code or a link:
//!
//! 1. The joiner sends a [`JoinRequest`] carrying their identity public key.
//!    It is not encrypted, so the optional name should not reveal anything
//!    secret.
//! 2. The inviter answers with an invite: an [`InviteSecretMessage`] holding
//!    the project key, encrypted so that only the holder of the identity
//!    secret key can read it.
//!
//! Use [`Encoding::Base32`] for QR codes and [`Encoding::Base62`] for links.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::encoding::{Encoding, EncodingError};
use crate::invite::{decrypt_message, encrypt_message, InviteCryptoError};
use crate::keys::{ExchangeKeypair, PublicKey, SecretKey};
use crate::message::{Invite, InviteSecretMessage, JoinRequest, Message, MessageError};

/// Errors that can occur while encoding or decoding join requests and invites
#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    #[error("invalid join request: failed to decode string: {0}")]
    JoinRequestEncoding(#[source] EncodingError),
    #[error("invalid join request: {0}")]
    JoinRequestMessage(#[source] MessageError),
    #[error("failed to encrypt invite: {0}")]
    Encrypt(#[source] InviteCryptoError),
    #[error("invalid invite: failed to decode string: {0}")]
    InviteEncoding(#[source] EncodingError),
    #[error("invalid invite: {0}")]
    InviteMessage(#[source] MessageError),
    #[error("invalid invite: {0}")]
    Decrypt(#[source] InviteCryptoError),
    #[error("invalid invite secret message: {0}")]
    SecretMessage(#[source] MessageError),
}

/// What to put in an invite and how to encode it
///
/// Key material is zeroed on drop.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct InviteOptions {
    #[zeroize(skip)]
    pub encoding: Encoding,
    /// Key of the project the invite is for
    pub project_key: [u8; 32],
    /// Key project data is encrypted with on disk. Without it the joiner can
    /// sync but not read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<[u8; 32]>,
}

impl std::fmt::Debug for InviteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InviteOptions")
            .field("encoding", &self.encoding)
            .field("project_key", &"[redacted]")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl InviteOptions {
    pub fn new(encoding: Encoding, project_key: [u8; 32]) -> Self {
        Self {
            encoding,
            project_key,
            encryption_key: None,
        }
    }

    pub fn with_encryption_key(mut self, encryption_key: [u8; 32]) -> Self {
        self.encryption_key = Some(encryption_key);
        self
    }
}

/// Encode a join request as a string
pub fn encode_join_request(join_request: &JoinRequest, encoding: Encoding) -> String {
    encoding.encode(&join_request.encode())
}

/// Decode a join request from a string
///
/// # Errors
///
/// Returns an error if the string is not valid for `encoding` or does not
/// hold a join request.
pub fn decode_join_request(s: &str, encoding: Encoding) -> Result<JoinRequest, InviteError> {
    let bytes = encoding
        .decode(s)
        .map_err(InviteError::JoinRequestEncoding)?;
    JoinRequest::decode(&bytes).map_err(|e| {
        tracing::debug!(%encoding, error = %e, "rejected join request");
        InviteError::JoinRequestMessage(e)
    })
}

/// Generate an encrypted invite answering `join_request`
///
/// Only the device owning the identity key in the join request can decrypt
/// it. Every call seals with a new ephemeral keypair, so two invites for the
/// same request never share a ciphertext.
///
/// # Errors
///
/// Returns an error if the identity key in the join request cannot be used
/// for encryption.
pub fn generate_invite(
    join_request: &JoinRequest,
    options: &InviteOptions,
) -> Result<String, InviteError> {
    let secret_message = InviteSecretMessage {
        project_key: options.project_key,
        encryption_key: options.encryption_key,
    };
    let plaintext = zeroize::Zeroizing::new(secret_message.encode());

    let ephemeral = ExchangeKeypair::generate();
    let encrypted_message = encrypt_message(
        &plaintext,
        &ephemeral,
        &join_request.identity_public_key,
    )
    .map_err(InviteError::Encrypt)?;

    let invite = Invite {
        ephemeral_public_key: ephemeral.public_key(),
        encrypted_message,
    };
    let encoded = options.encoding.encode(&invite.encode());
    tracing::debug!(
        encoding = %options.encoding,
        has_encryption_key = options.encryption_key.is_some(),
        len = encoded.len(),
        "generated invite"
    );
    Ok(encoded)
}

/// Decode and decrypt the secret message of an invite
///
/// `identity_public_key` and `identity_secret_key` are the identity keypair
/// of the device the invite was generated for.
///
/// # Errors
///
/// Returns an error if the string does not hold an invite, or the invite was
/// not generated for this identity.
pub fn decode_invite_secret_message(
    s: &str,
    identity_public_key: &PublicKey,
    identity_secret_key: &SecretKey,
    encoding: Encoding,
) -> Result<InviteSecretMessage, InviteError> {
    let bytes = encoding.decode(s).map_err(InviteError::InviteEncoding)?;
    let invite = Invite::decode(&bytes).map_err(InviteError::InviteMessage)?;

    let plaintext = decrypt_message(
        &invite.encrypted_message,
        identity_public_key,
        identity_secret_key,
        &invite.ephemeral_public_key,
    )
    .map(zeroize::Zeroizing::new)
    .map_err(InviteError::Decrypt)?;

    let secret_message =
        InviteSecretMessage::decode(&plaintext).map_err(InviteError::SecretMessage)?;
    tracing::debug!(%encoding, "decoded invite");
    Ok(secret_message)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::keys::Keypair;

    #[test]
    fn test_join_request_roundtrip() {
        let keypair = Keypair::generate();
        let request = JoinRequest::new(keypair.public_key).with_name("Ana's phone");

        for encoding in [Encoding::Base32, Encoding::Base62] {
            let encoded = encode_join_request(&request, encoding);
            let decoded = decode_join_request(&encoded, encoding).unwrap();
            assert_eq!(decoded, request);
        }
    }

    #[test]
    fn test_invite_roundtrip() {
        let joiner = Keypair::generate();
        let request = JoinRequest::new(joiner.public_key);
        let options = InviteOptions::new(Encoding::Base62, [4u8; 32]);

        let invite = generate_invite(&request, &options).unwrap();
        let secret = decode_invite_secret_message(
            &invite,
            &joiner.public_key,
            &joiner.secret_key,
            Encoding::Base62,
        )
        .unwrap();
        assert_eq!(secret.project_key, [4u8; 32]);
        assert_eq!(secret.encryption_key, None);
    }

    #[test]
    fn test_invite_for_someone_else() {
        let joiner = Keypair::generate();
        let eavesdropper = Keypair::generate();
        let options = InviteOptions::new(Encoding::Base32, [4u8; 32]);
        let invite = generate_invite(&JoinRequest::new(joiner.public_key), &options).unwrap();

        let result = decode_invite_secret_message(
            &invite,
            &eavesdropper.public_key,
            &eavesdropper.secret_key,
            Encoding::Base32,
        );
        assert!(matches!(
            result,
            Err(InviteError::Decrypt(InviteCryptoError::DecryptionFailure))
        ));
    }

    #[test]
    fn test_errors_name_the_failed_step() {
        let joiner = Keypair::generate();

        // a join request is not an invite
        let request = encode_join_request(&JoinRequest::new(joiner.public_key), Encoding::Base62);
        let result = decode_invite_secret_message(
            &request,
            &joiner.public_key,
            &joiner.secret_key,
            Encoding::Base62,
        );
        assert!(matches!(
            result,
            Err(InviteError::InviteMessage(
                MessageError::UnexpectedMessageType { .. }
            ))
        ));

        assert!(matches!(
            decode_join_request("not+base62", Encoding::Base62),
            Err(InviteError::JoinRequestEncoding(_))
        ));
    }

    #[test]
    fn test_invite_options_debug_is_redacted() {
        let options = InviteOptions::new(Encoding::Base62, [0xab; 32]).with_encryption_key([0xcd; 32]);
        let debug = format!("{options:?}");
        assert!(debug.contains("Base62"));
        assert!(!debug.contains(&hex::encode([0xab; 32])));
        assert!(!debug.contains("ab"));
        assert!(!debug.contains("cd"));
    }

    #[test]
    fn test_invite_options_zeroize() {
        let mut options = InviteOptions::new(Encoding::Base32, [7u8; 32]).with_encryption_key([8u8; 32]);
        options.zeroize();
        assert_eq!(options.project_key, [0u8; 32]);
        assert_eq!(options.encryption_key, None);
        assert_eq!(options.encoding, Encoding::Base32);
    }

    #[test]
    fn test_invite_options_serde() {
        let options = InviteOptions::new(Encoding::Base32, [1u8; 32]);
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["encoding"], "base32");
        assert!(json.get("encryption_key").is_none());
    }
}
