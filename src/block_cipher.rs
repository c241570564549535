//! AES-256 in CBC mode over pre-padded buffers
//!
//! Padding is handled by [`crate::padding`]; the cipher here is always driven
//! with `NoPadding`. Decryption of garbage yields garbage, never an error:
//! integrity is established by the MAC before this module is reached.

use aes::Aes256;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::{ErrorCategory, ErrorKind, LaracryptError, Result};
use crate::key::Key;

/// AES block size in bytes, also the IV length.
pub const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Encrypt a block-aligned buffer.
pub fn encrypt(key: &Key, iv: &[u8; BLOCK_SIZE], padded: &[u8]) -> Result<Vec<u8>> {
    if padded.len() % BLOCK_SIZE != 0 {
        return Err(LaracryptError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "plaintext handed to the cipher is not block aligned",
        ));
    }

    let mut buf = padded.to_vec();
    let len = buf.len();
    Aes256CbcEnc::new(key.as_bytes().into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .map_err(|_| {
            LaracryptError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "AES-256-CBC encryption failed",
            )
        })?;
    Ok(buf)
}

/// Decrypt a ciphertext, returning the still-padded plaintext.
pub fn decrypt(key: &Key, iv: &[u8; BLOCK_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(LaracryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidCiphertextLength,
            "ciphertext length must be a multiple of the block size",
        ));
    }

    let mut buf = ciphertext.to_vec();
    let len = Aes256CbcDec::new(key.as_bytes().into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| {
            LaracryptError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "AES-256-CBC decryption failed",
            )
        })?
        .len();
    buf.truncate(len);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KEY_LEN;

    fn test_key() -> Key {
        Key::from_bytes([0x11u8; KEY_LEN])
    }

    #[test]
    fn test_roundtrip() {
        let key = test_key();
        let iv = [0x42u8; BLOCK_SIZE];
        let plaintext = [0xABu8; 48];

        let ciphertext = encrypt(&key, &iv, &plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len());
        assert_ne!(&ciphertext[..], &plaintext[..]);

        let decrypted = decrypt(&key, &iv, &ciphertext).unwrap();
        assert_eq!(&decrypted[..], &plaintext[..]);
    }

    #[test]
    fn test_deterministic_given_iv() {
        let key = test_key();
        let iv = [7u8; BLOCK_SIZE];
        let a = encrypt(&key, &iv, &[1u8; 16]).unwrap();
        let b = encrypt(&key, &iv, &[1u8; 16]).unwrap();
        assert_eq!(a, b);

        let other = encrypt(&key, &[8u8; BLOCK_SIZE], &[1u8; 16]).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn test_empty_input() {
        let key = test_key();
        let iv = [0u8; BLOCK_SIZE];
        assert!(encrypt(&key, &iv, &[]).unwrap().is_empty());
        assert!(decrypt(&key, &iv, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_unaligned_ciphertext() {
        let err = decrypt(&test_key(), &[0u8; BLOCK_SIZE], &[0u8; 17])
            .expect_err("expected length error");
        assert_eq!(err.kind, Some(ErrorKind::InvalidCiphertextLength));
    }

    #[test]
    fn test_unaligned_plaintext_is_internal_error() {
        let err = encrypt(&test_key(), &[0u8; BLOCK_SIZE], &[0u8; 15])
            .expect_err("expected invariant error");
        assert_eq!(err.kind, Some(ErrorKind::InternalInvariant));
        assert_eq!(err.category, ErrorCategory::Internal);
    }

    #[test]
    fn test_garbage_decrypts_without_error() {
        let decrypted = decrypt(&test_key(), &[3u8; BLOCK_SIZE], &[0x5Au8; 32]).unwrap();
        assert_eq!(decrypted.len(), 32);
    }
}
