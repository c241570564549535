//! Application key parsing and generation
//!
//! Keys are written the way Laravel's `APP_KEY` is: standard base64 of 32
//! random bytes, usually behind a `base64:` marker. The marker is optional;
//! the remainder is always base64-decoded.

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, LaracryptError, Result};

/// Length of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Marker announcing that the rest of the key string is base64.
pub const BASE64_PREFIX: &str = "base64:";

/// A validated 32-byte key, wiped from memory on drop.
#[derive(Clone)]
pub struct Key {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl Key {
    /// Parse a key string, with or without the `base64:` marker.
    pub fn parse(key: &str) -> Result<Self> {
        let encoded = key.strip_prefix(BASE64_PREFIX).unwrap_or(key);

        let decoded = Zeroizing::new(STANDARD.decode(encoded).map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::InvalidKey,
                "could not decode key: not valid base64",
                e,
            )
        })?);

        if decoded.len() != KEY_LEN {
            return Err(LaracryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidKey,
                format!(
                    "key must be {} bytes, got {} after decoding",
                    KEY_LEN,
                    decoded.len()
                ),
            ));
        }

        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }

    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Generate a fresh random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(bytes.as_mut());
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Render the key as `base64:<standard base64>`, the form `.env` files use.
    pub fn to_base64_string(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("{}{}", BASE64_PREFIX, STANDARD.encode(*self.bytes)))
    }
}

impl FromStr for Key {
    type Err = LaracryptError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(len: usize) -> String {
        format!("{}{}", BASE64_PREFIX, STANDARD.encode(vec![0x5Au8; len]))
    }

    #[test]
    fn test_parse_with_prefix() {
        let key = Key::parse(&encoded(32)).unwrap();
        assert_eq!(key.as_bytes(), &[0x5Au8; KEY_LEN]);
    }

    #[test]
    fn test_parse_without_prefix() {
        let key = Key::parse(&STANDARD.encode([7u8; 32])).unwrap();
        assert_eq!(key.as_bytes(), &[7u8; KEY_LEN]);
    }

    #[test]
    fn test_wrong_lengths_rejected() {
        for len in [0, 16, 24, 31, 33, 64] {
            let err = Key::parse(&encoded(len)).expect_err("expected invalid key");
            assert_eq!(err.kind, Some(ErrorKind::InvalidKey), "length {}", len);
            assert_eq!(err.category, ErrorCategory::User);
        }
    }

    #[test]
    fn test_bad_base64_rejected() {
        let err = Key::parse("base64:not$base64").expect_err("expected invalid key");
        assert_eq!(err.kind, Some(ErrorKind::InvalidKey));
    }

    #[test]
    fn test_raw_32_char_string_is_not_a_key() {
        // 32 ASCII characters are valid base64 but decode to 24 bytes.
        let err = Key::parse("abcdefghijklmnopqrstuvwxyz012345").expect_err("expected invalid key");
        assert_eq!(err.kind, Some(ErrorKind::InvalidKey));
    }

    #[test]
    fn test_generate_roundtrips_through_string_form() {
        let key = Key::generate();
        let rendered = key.to_base64_string();
        assert!(rendered.starts_with(BASE64_PREFIX));

        let parsed: Key = rendered.parse().unwrap();
        assert_eq!(parsed.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_generate_is_random() {
        assert_ne!(Key::generate().as_bytes(), Key::generate().as_bytes());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = Key::from_bytes([0x41u8; KEY_LEN]);
        assert_eq!(format!("{:?}", key), "Key(<redacted>)");
    }
}
