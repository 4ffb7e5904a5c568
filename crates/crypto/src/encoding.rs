//! String encodings for bytes that travel through QR codes, URLs and IDs
//!
//! - `base32` uses the crockford alphabet: uppercase `A-Z` and `0-9`, which
//!   QR codes can carry in the compact alphanumeric mode. Decoding is
//!   case-insensitive and forgives the usual `O`/`0` and `I`/`L`/`1` mix-ups.
//! - `base62` is used for links. Unlike base64 it has no `+` or `/`, which
//!   break auto-linking in SMS and chat apps.
//! - z-base-32 is only used for public identifiers (project ids).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use data_encoding::Specification;
use serde::{Deserialize, Serialize};

const CROCKFORD_SYMBOLS: &str = "0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const CROCKFORD_TRANSLATE_FROM: &str = "abcdefghjkmnpqrstvwxyzoOiIlL";
const CROCKFORD_TRANSLATE_TO: &str = "ABCDEFGHJKMNPQRSTVWXYZ001111";

const Z_BASE_32_SYMBOLS: &str = "ybndrfg8ejkmcpqxot1uwisza345h769";

const BASE62_ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

static CROCKFORD: LazyLock<data_encoding::Encoding> = LazyLock::new(|| {
    let mut spec = Specification::new();
    spec.symbols.push_str(CROCKFORD_SYMBOLS);
    spec.translate.from.push_str(CROCKFORD_TRANSLATE_FROM);
    spec.translate.to.push_str(CROCKFORD_TRANSLATE_TO);
    spec.encoding().expect("crockford base32 alphabet is valid")
});

static Z_BASE_32: LazyLock<data_encoding::Encoding> = LazyLock::new(|| {
    let mut spec = Specification::new();
    spec.symbols.push_str(Z_BASE_32_SYMBOLS);
    spec.encoding().expect("z-base-32 alphabet is valid")
});

/// Errors that can occur when decoding an encoded string
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("invalid {0} string: empty input")]
    Empty(Encoding),
    #[error("invalid {0} string: unexpected characters")]
    InvalidCharacters(Encoding),
    #[error("invalid {encoding} string: {reason}")]
    Decode { encoding: Encoding, reason: String },
    #[error("invalid z-base-32 string: {0}")]
    ZBase32(String),
    #[error("invalid encoding name: {0}")]
    UnknownEncoding(String),
}

/// Presentation encoding for join requests and invites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Crockford base32, for alphanumeric QR codes
    Base32,
    /// Base62, for links
    Base62,
}

impl Encoding {
    /// Name of the encoding as used in configuration (`"base32"` / `"base62"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Base32 => "base32",
            Encoding::Base62 => "base62",
        }
    }

    /// Encode bytes to a string
    pub fn encode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Base32 => CROCKFORD.encode(bytes),
            Encoding::Base62 => base_x::encode(BASE62_ALPHABET, bytes),
        }
    }

    /// Decode a string produced by [`Encoding::encode`]
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty or is not valid for this
    /// encoding.
    pub fn decode(&self, s: &str) -> Result<Vec<u8>, EncodingError> {
        if s.is_empty() {
            return Err(EncodingError::Empty(*self));
        }
        match self {
            Encoding::Base32 => {
                if !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
                    return Err(EncodingError::InvalidCharacters(*self));
                }
                CROCKFORD
                    .decode(s.as_bytes())
                    .map_err(|e| EncodingError::Decode {
                        encoding: *self,
                        reason: e.to_string(),
                    })
            }
            Encoding::Base62 => base_x::decode(BASE62_ALPHABET, s)
                .map_err(|_| EncodingError::InvalidCharacters(*self)),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base32" => Ok(Encoding::Base32),
            "base62" => Ok(Encoding::Base62),
            other => Err(EncodingError::UnknownEncoding(other.to_string())),
        }
    }
}

/// Encode bytes as z-base-32
pub fn z32_encode(bytes: &[u8]) -> String {
    Z_BASE_32.encode(bytes)
}

/// Decode a z-base-32 string
pub fn z32_decode(s: &str) -> Result<Vec<u8>, EncodingError> {
    Z_BASE_32
        .decode(s.as_bytes())
        .map_err(|e| EncodingError::ZBase32(e.to_string()))
}
