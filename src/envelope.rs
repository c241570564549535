//! Payload envelope
//!
//! The envelope is a JSON object carrying the IV, the ciphertext and the
//! MAC, base64-encoded as a whole:
//!
//! ```text
//! base64({"iv":"<b64>","value":"<b64>","mac":"<hex>","tag":""})
//! ```
//!
//! `tag` belongs to the framework's AEAD ciphers. For CBC it is always empty
//! on output and ignored on input.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ErrorCategory, ErrorKind, LaracryptError, Result};

/// The decoded JSON object, fields still in their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub iv: String,
    pub value: String,
    pub mac: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tag: String,
}

/// `tag` is never checked, so a JSON `null` reads the same as `""`.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Envelope {
    /// Build an envelope from raw IV, ciphertext and MAC bytes.
    pub fn new(iv: &[u8], ciphertext: &[u8], mac: &[u8]) -> Self {
        Self::from_encoded(STANDARD.encode(iv), STANDARD.encode(ciphertext), mac)
    }

    /// Build an envelope from already base64-encoded IV and ciphertext.
    pub fn from_encoded(iv_b64: String, value_b64: String, mac: &[u8]) -> Self {
        Self {
            iv: iv_b64,
            value: value_b64,
            mac: hex::encode(mac),
            tag: String::new(),
        }
    }

    /// Serialize to the opaque payload string.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self).map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "could not encode payload as JSON",
                e,
            )
        })?;
        Ok(STANDARD.encode(json))
    }

    /// Parse an opaque payload string.
    pub fn decode(payload: &str) -> Result<Self> {
        let json = STANDARD.decode(payload.trim()).map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::MalformedEnvelope,
                "payload is not valid base64",
                e,
            )
        })?;

        serde_json::from_slice(&json).map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::MalformedEnvelope,
                "the payload is invalid",
                e,
            )
        })
    }

    /// Decode the `iv` field; only meaningful after the MAC has verified.
    pub fn iv_bytes(&self) -> Result<Vec<u8>> {
        decode_field("iv", &self.iv)
    }

    /// Decode the `value` field; only meaningful after the MAC has verified.
    pub fn ciphertext_bytes(&self) -> Result<Vec<u8>> {
        decode_field("value", &self.value)
    }
}

fn decode_field(name: &str, encoded: &str) -> Result<Vec<u8>> {
    STANDARD.decode(encoded).map_err(|e| {
        LaracryptError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::MalformedEnvelope,
            format!("envelope field `{}` is not valid base64", name),
            e,
        )
    })
}
