//! HMAC-SHA256 over the encoded envelope fields
//!
//! The MAC input is the base64 text of the IV immediately followed by the
//! base64 text of the ciphertext. Computing it over the raw bytes instead
//! produces MACs the framework will never accept.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::key::Key;

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 digest in bytes.
pub const MAC_LEN: usize = 32;

fn keyed(key: &Key, iv_b64: &str, value_b64: &str) -> HmacSha256 {
    // HMAC hashes or zero-pads keys of any length, so `new_from_slice`
    // only errors for fixed-size MACs. A 32-byte key cannot hit that path.
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(iv_b64.as_bytes());
    mac.update(value_b64.as_bytes());
    mac
}

/// Compute the MAC for an envelope's `iv` and `value` fields.
pub fn compute(key: &Key, iv_b64: &str, value_b64: &str) -> [u8; MAC_LEN] {
    keyed(key, iv_b64, value_b64).finalize().into_bytes().into()
}

/// Check a hex-encoded MAC in constant time.
///
/// A claimed MAC that is not hex, or not 32 bytes, does not verify.
pub fn verify(key: &Key, iv_b64: &str, value_b64: &str, claimed_hex: &str) -> bool {
    let Ok(claimed) = hex::decode(claimed_hex) else {
        return false;
    };
    keyed(key, iv_b64, value_b64).verify_slice(&claimed).is_ok()
}
