//! Cryptographic utilities for gate credentials.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Number of random bytes behind a gate credential.
pub const CREDENTIAL_BYTES: usize = 32;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates a new gate credential token.
///
/// The token is 32 bytes from the operating system RNG encoded as URL-safe
/// base64 without padding, so it can be embedded in a QR code or URL as-is.
/// Only `sha256_hex(token)` is ever persisted.
pub fn generate_credential_token() -> String {
    let mut bytes = [0u8; CREDENTIAL_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Returns the storage digest for a presented credential token.
///
/// Surrounding whitespace is ignored since tokens are often pasted or scanned.
pub fn credential_digest(token: &str) -> String {
    sha256_hex(token.trim())
}
