//! Human-transcribable backup codes for a device root key
//!
//! A backup code is `M` followed by the crockford base32 encoding of the root
//! key and its CRC16, 30 characters in total. The CRC catches transcription
//! mistakes, it is not a MAC.

use crc::{Crc, CRC_16_IBM_3740};
use zeroize::Zeroizing;

use crate::constants::{BACKUP_CODE_IDENTIFIER, BACKUP_CODE_LENGTH};
use crate::encoding::Encoding;
use crate::key_manager::RootKey;
use crate::message::BackupCodeBytes;

/// CRC-16/CCITT-FALSE: poly 0x1021, init 0xffff, no reflection
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Errors that can occur when decoding a backup code
#[derive(Debug, thiserror::Error)]
pub enum BackupCodeError {
    #[error("invalid backup code: must start with M")]
    InvalidPrefix,
    #[error("invalid backup code: must be 30 characters, got {0}")]
    InvalidLength(usize),
    #[error("invalid backup code: invalid base32 encoding")]
    InvalidBase32,
    #[error("invalid backup code: invalid byte encoding")]
    InvalidBytes,
    #[error("invalid backup code: CRC mismatch (expected {expected:#06x}, got {actual:#06x})")]
    CrcMismatch { expected: u16, actual: u16 },
}

pub(crate) fn crc16(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}

/// Encode a root key as a backup code
pub fn encode(root_key: &RootKey) -> String {
    let bytes = BackupCodeBytes {
        root_key: *root_key.as_bytes(),
        crc16: crc16(root_key.as_bytes()),
    };
    let raw = Zeroizing::new(bytes.encode());

    let mut code = String::with_capacity(BACKUP_CODE_LENGTH);
    code.push(BACKUP_CODE_IDENTIFIER);
    code.push_str(&Encoding::Base32.encode(&raw[..]));
    code
}

/// Decode the root key from a backup code
///
/// Lowercase input and the `O`/`0`, `I`/`L`/`1` lookalikes are accepted.
///
/// # Errors
///
/// Returns an error if:
/// - The code does not start with `M`
/// - The code is not exactly 30 characters
/// - The remainder is not valid crockford base32
/// - The CRC does not match the root key
pub fn decode(code: &str) -> Result<RootKey, BackupCodeError> {
    let Some(encoded) = code.strip_prefix(BACKUP_CODE_IDENTIFIER) else {
        return Err(BackupCodeError::InvalidPrefix);
    };
    let length = code.chars().count();
    if length != BACKUP_CODE_LENGTH {
        return Err(BackupCodeError::InvalidLength(length));
    }

    let raw = Encoding::Base32
        .decode(encoded)
        .map(Zeroizing::new)
        .map_err(|_| BackupCodeError::InvalidBase32)?;
    let bytes = BackupCodeBytes::decode(&raw).map_err(|_| BackupCodeError::InvalidBytes)?;

    let expected = crc16(&bytes.root_key);
    if bytes.crc16 != expected {
        return Err(BackupCodeError::CrcMismatch {
            expected,
            actual: bytes.crc16,
        });
    }
    Ok(RootKey::from(bytes.root_key))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16(b"123456789"), 0x29b1);
    }

    #[test]
    fn test_known_backup_code() {
        let mut root_key = [0u8; 16];
        hex::decode_to_slice("15c1d5fd40f4f35eb1877e65febf94ac", &mut root_key).unwrap();
        let root_key = RootKey::from(root_key);

        assert_eq!(crc16(root_key.as_bytes()), 0xa7d9);
        let code = encode(&root_key);
        assert_eq!(code, "M2Q0XBZA0YKSNXCC7FSJZXFWMNKCTE");
        assert_eq!(decode(&code).unwrap(), root_key);
        assert_eq!(decode(&code.to_lowercase().replacen('m', "M", 1)).unwrap(), root_key);
    }

    #[test]
    fn test_rejects_in_order() {
        assert!(matches!(decode(""), Err(BackupCodeError::InvalidPrefix)));
        assert!(matches!(
            decode("B8GWDNX8FV8VN2W99D6PJ0P9K6DKM7"),
            Err(BackupCodeError::InvalidPrefix)
        ));
        assert!(matches!(
            decode("MHYDGXENRVKWVZE5JWS6J2XF58JFH"),
            Err(BackupCodeError::InvalidLength(29))
        ));
        assert!(matches!(
            decode("ML_hPa3@dDi6aWuY7q2agoHx9u2gaX"),
            Err(BackupCodeError::InvalidBase32)
        ));
    }

    #[test]
    fn test_crc_mismatch() {
        let code = encode(&RootKey::from([0x42; 16]));
        let mut chars: Vec<char> = code.chars().collect();
        chars[5] = if chars[5] == 'W' { 'V' } else { 'W' };
        let corrupted: String = chars.into_iter().collect();
        let err = decode(&corrupted).unwrap_err();
        assert!(matches!(err, BackupCodeError::CrcMismatch { .. }));
        assert!(err.to_string().starts_with("invalid backup code"));
    }
}
