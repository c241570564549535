//! File encryption/decryption operations
//!
//! This module provides high-level file operations for encrypting and
//! decrypting whole files into the payload format, either as raw text or as
//! JSON documents carried as serialized values.

use crate::encrypter::Encrypter;
use crate::error::{ErrorCategory, ErrorKind, LaracryptError, Result};
use crate::keysource::KeyReader;
use crate::value::Value;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

/// How file contents map to the encrypted plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaintextFormat {
    /// File bytes are the plaintext (`encryptString`).
    #[default]
    Raw,
    /// File holds JSON, converted to a [`Value`] and serialized before
    /// encryption (`encrypt($value)`); decrypted values are written as JSON.
    Json,
}

/// Encrypt a file with a key
///
/// Reads plaintext from `input_path`, encrypts it using a key from
/// `key_reader`, and writes the payload to `output_path`.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_file(
    input_path: &Path,
    output_path: &Path,
    key_reader: &mut dyn KeyReader,
    format: PlaintextFormat,
) -> Result<()> {
    let plaintext = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let encrypter = load_encrypter(key_reader)?;

    let payload = match format {
        PlaintextFormat::Raw => encrypter.encrypt(&plaintext),
        PlaintextFormat::Json => {
            let json: serde_json::Value = serde_json::from_slice(&plaintext).map_err(|e| {
                LaracryptError::with_source(
                    ErrorCategory::User,
                    format!("{} is not valid JSON", input_path.display()),
                    e,
                )
            })?;
            encrypter.encrypt_value(&Value::from(json))
        }
    }
    .map_err(|e| e.with_context("encryption failed"))?;

    debug!(input = %input_path.display(), ?format, "encrypted file");
    write_file_secure(output_path, payload.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))
}

/// Decrypt a file with a key
///
/// Reads a payload from `input_path`, decrypts it using a key from
/// `key_reader`, and writes the plaintext to `output_path`.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn decrypt_file(
    input_path: &Path,
    output_path: &Path,
    key_reader: &mut dyn KeyReader,
    format: PlaintextFormat,
) -> Result<()> {
    let payload_bytes = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let payload = String::from_utf8(payload_bytes).map_err(|e| {
        LaracryptError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            "input file is not valid UTF-8",
            e,
        )
    })?;
    let encrypter = load_encrypter(key_reader)?;

    let plaintext = match format {
        PlaintextFormat::Raw => encrypter
            .decrypt(&payload)
            .map_err(|e| e.with_context("failed to decrypt"))?,
        PlaintextFormat::Json => {
            let value = encrypter
                .decrypt_value(&payload)
                .map_err(|e| e.with_context("failed to decrypt"))?;
            let mut rendered = serde_json::to_vec_pretty(&value.to_json()?).map_err(|e| {
                LaracryptError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::InternalInvariant,
                    "failed to render JSON",
                    e,
                )
            })?;
            rendered.push(b'\n');
            rendered
        }
    };

    debug!(input = %input_path.display(), ?format, "decrypted file");
    write_file_secure(output_path, &plaintext)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))
}

fn load_encrypter(key_reader: &mut dyn KeyReader) -> Result<Encrypter> {
    let key = key_reader.read_key()?;
    Encrypter::from_key_str(&key)
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                LaracryptError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents).map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn read_error(path: &Path, err: io::Error) -> LaracryptError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    LaracryptError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
