//! Laracrypt - Laravel-compatible payload encryption
//!
//! Produces and consumes the payloads of Laravel's `AES-256-CBC` encrypter:
//! base64 JSON envelopes carrying an IV, the CBC ciphertext and an
//! HMAC-SHA256 over the encoded fields. Structured values travel as PHP
//! `serialize()` text.
//!
//! ```no_run
//! use laracrypt::{Encrypter, Value};
//!
//! let encrypter = Encrypter::from_key_str("base64:AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=")?;
//! let payload = encrypter.encrypt_array(&Value::array([("user_id", 42)]))?;
//! let value = encrypter.decrypt_array(&payload)?;
//! assert_eq!(value.get("user_id"), Some(&Value::Int(42)));
//! # Ok::<(), laracrypt::error::LaracryptError>(())
//! ```

#![forbid(unsafe_code)]

pub mod block_cipher;
pub mod encrypter;
pub mod envelope;
pub mod error;
pub mod file_ops;
pub mod key;
pub mod keysource;
pub mod mac;
pub mod padding;
pub mod serial;
pub mod value;

pub use encrypter::{
    Encrypter, decrypt, decrypt_array, decrypt_string, decrypt_value, encrypt, encrypt_array,
    encrypt_string, encrypt_value,
};
pub use error::{ErrorCategory, ErrorKind, LaracryptError, Result};
pub use key::Key;
pub use value::Value;
