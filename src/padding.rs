//! PKCS#7 padding
//!
//! Padding always adds between 1 and `block_size` bytes, each holding the
//! number of bytes added. Unpadding only inspects the final byte: the other
//! padding bytes are not checked, matching what the framework accepts.

use crate::error::{ErrorCategory, ErrorKind, LaracryptError, Result};

/// Pad `data` to a multiple of `block_size`.
///
/// A block-aligned input receives a full block of padding.
pub fn pad(data: &[u8], block_size: usize) -> Vec<u8> {
    debug_assert!(block_size > 0 && block_size <= 255);
    let padding_len = block_size - data.len() % block_size;
    let mut padded = Vec::with_capacity(data.len() + padding_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + padding_len, padding_len as u8);
    padded
}

/// Strip the padding from a decrypted buffer.
pub fn unpad(data: &[u8]) -> Result<&[u8]> {
    let Some(&last) = data.last() else {
        return Err(invalid_padding("invalid padding size: input is empty"));
    };
    let padding_len = usize::from(last);
    if padding_len == 0 {
        return Err(invalid_padding("invalid padding size: zero"));
    }
    if padding_len > data.len() {
        return Err(invalid_padding(
            "unpadding size is larger than data size",
        ));
    }
    Ok(&data[..data.len() - padding_len])
}

fn invalid_padding(msg: &str) -> LaracryptError {
    LaracryptError::with_kind(ErrorCategory::User, ErrorKind::InvalidPadding, msg)
}
