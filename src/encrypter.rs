//! Encryption/decryption of payloads in Laravel's `AES-256-CBC` format
//!
//! Encrypting:
//! - PKCS#7-pad the plaintext to the AES block size
//! - AES-256-CBC encrypt under a fresh random 16-byte IV
//! - HMAC-SHA256 the base64 IV text followed by the base64 ciphertext text
//! - wrap `{iv, value, mac, tag}` as base64 JSON
//!
//! Decrypting runs the same steps backwards, and the MAC is checked before
//! any field is decoded or any block is decrypted.
//!
//! Structured values go through [`crate::serial`] first, so that arrays of
//! mixed data survive the trip through the string pipeline.

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, trace};

use crate::block_cipher::{self, BLOCK_SIZE};
use crate::envelope::Envelope;
use crate::error::{ErrorCategory, ErrorKind, LaracryptError, Result};
use crate::key::Key;
use crate::mac;
use crate::padding;
use crate::serial;
use crate::value::Value;

/// Encrypts and decrypts payloads under a single key.
///
/// Holds no state besides the key, so one instance can be shared freely
/// across threads.
#[derive(Debug, Clone)]
pub struct Encrypter {
    key: Key,
}

impl Encrypter {
    pub fn new(key: Key) -> Self {
        Self { key }
    }

    /// Parse a key string (optionally `base64:`-prefixed) and build an encrypter.
    pub fn from_key_str(key: &str) -> Result<Self> {
        Ok(Self::new(Key::parse(key)?))
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Encrypt raw bytes under a random IV.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let mut iv = [0u8; BLOCK_SIZE];
        OsRng.fill_bytes(&mut iv);

        self.encrypt_with_iv(plaintext, &iv)
    }

    /// Encrypt raw bytes under the provided IV.
    ///
    /// This function is ONLY for testing purposes to generate deterministic output.
    /// NEVER use this in production - always use `encrypt()` which generates a random IV.
    pub fn encrypt_with_iv(&self, plaintext: &[u8], iv: &[u8; BLOCK_SIZE]) -> Result<String> {
        let padded = padding::pad(plaintext, BLOCK_SIZE);
        let ciphertext = block_cipher::encrypt(&self.key, iv, &padded)?;

        let iv_b64 = STANDARD.encode(iv);
        let value_b64 = STANDARD.encode(&ciphertext);
        let digest = mac::compute(&self.key, &iv_b64, &value_b64);

        let payload = Envelope::from_encoded(iv_b64, value_b64, &digest).encode()?;
        trace!(
            plaintext_len = plaintext.len(),
            payload_len = payload.len(),
            "encrypted payload"
        );
        Ok(payload)
    }

    /// Verify and decrypt a payload, returning the raw plaintext bytes.
    pub fn decrypt(&self, payload: &str) -> Result<Vec<u8>> {
        let envelope = Envelope::decode(payload)?;

        if !mac::verify(&self.key, &envelope.iv, &envelope.value, &envelope.mac) {
            debug!("rejecting payload with invalid MAC");
            return Err(LaracryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "the MAC is invalid",
            ));
        }

        let iv: [u8; BLOCK_SIZE] = envelope.iv_bytes()?.try_into().map_err(|iv: Vec<u8>| {
            LaracryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::MalformedEnvelope,
                format!("iv must be {} bytes, got {}", BLOCK_SIZE, iv.len()),
            )
        })?;
        let ciphertext = envelope.ciphertext_bytes()?;

        let padded = block_cipher::decrypt(&self.key, &iv, &ciphertext)?;
        let plaintext = padding::unpad(&padded)?.to_vec();

        trace!(plaintext_len = plaintext.len(), "decrypted payload");
        Ok(plaintext)
    }

    /// Encrypt a string without serializing it (Laravel's `encryptString`).
    pub fn encrypt_string(&self, plaintext: &str) -> Result<String> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Decrypt a payload whose plaintext must be UTF-8 (Laravel's `decryptString`).
    pub fn decrypt_string(&self, payload: &str) -> Result<String> {
        String::from_utf8(self.decrypt(payload)?).map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::InvalidUtf8,
                "decrypted plaintext is not valid UTF-8",
                e,
            )
        })
    }

    /// Serialize then encrypt any value (Laravel's `encrypt($value)`).
    pub fn encrypt_value(&self, value: &Value) -> Result<String> {
        let serialized = serial::serialize(value)?;
        debug!(
            value_type = value.type_name(),
            serialized_len = serialized.len(),
            "serialized value for encryption"
        );
        self.encrypt(&serialized)
    }

    /// Decrypt then unserialize a value of any type (Laravel's `decrypt($payload)`).
    pub fn decrypt_value(&self, payload: &str) -> Result<Value> {
        let plaintext = self.decrypt(payload)?;
        serial::unserialize(&plaintext)
            .map_err(|e| e.with_context("could not unserialize decrypted payload"))
    }

    /// Serialize then encrypt an array. Anything other than
    /// [`Value::Array`] at the top level is rejected.
    pub fn encrypt_array(&self, value: &Value) -> Result<String> {
        if !matches!(value, Value::Array(_)) {
            return Err(LaracryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::SerializationUnsupportedType,
                format!("expected an array, got {}", value.type_name()),
            ));
        }
        self.encrypt_value(value)
    }

    /// Decrypt then unserialize a payload that must hold an array.
    pub fn decrypt_array(&self, payload: &str) -> Result<Value> {
        let plaintext = self.decrypt(payload)?;
        serial::unserialize_array(&plaintext)
            .map_err(|e| e.with_context("could not unserialize decrypted payload"))
    }
}

/// Encrypt raw bytes under a key string.
pub fn encrypt(plaintext: &[u8], key: &str) -> Result<String> {
    Encrypter::from_key_str(key)?.encrypt(plaintext)
}

/// Decrypt a payload to raw bytes under a key string.
pub fn decrypt(payload: &str, key: &str) -> Result<Vec<u8>> {
    Encrypter::from_key_str(key)?.decrypt(payload)
}

/// Encrypt a string under a key string.
pub fn encrypt_string(plaintext: &str, key: &str) -> Result<String> {
    Encrypter::from_key_str(key)?.encrypt_string(plaintext)
}

/// Decrypt a payload to a string under a key string.
pub fn decrypt_string(payload: &str, key: &str) -> Result<String> {
    Encrypter::from_key_str(key)?.decrypt_string(payload)
}

/// Serialize and encrypt an array under a key string.
pub fn encrypt_array(value: &Value, key: &str) -> Result<String> {
    Encrypter::from_key_str(key)?.encrypt_array(value)
}

/// Decrypt and unserialize an array under a key string.
pub fn decrypt_array(payload: &str, key: &str) -> Result<Value> {
    Encrypter::from_key_str(key)?.decrypt_array(payload)
}

/// Serialize and encrypt a value of any type under a key string.
pub fn encrypt_value(value: &Value, key: &str) -> Result<String> {
    Encrypter::from_key_str(key)?.encrypt_value(value)
}

/// Decrypt and unserialize a value of any type under a key string.
pub fn decrypt_value(payload: &str, key: &str) -> Result<Value> {
    Encrypter::from_key_str(key)?.decrypt_value(payload)
}
