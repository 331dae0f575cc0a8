//! PIN hashing. One-way salted SHA-256; the raw PIN exists only inside
//! the single verification call and is never persisted or logged.
//!
//! A 4-digit PIN has a search space of 10^4 — no hash makes offline
//! guessing hard. The real defense is the persisted rate limiter and the
//! multiple_pin_failures threat pattern.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Fresh random salt, hex-encoded.
pub fn new_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// Hex-encoded SHA-256 of salt-bytes || pin-bytes.
pub fn hash_pin(pin: &str, salt_hex: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(pin.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Constant-time comparison against a stored hash.
pub fn verify_pin(pin: &str, salt_hex: &str, stored_hash: &str) -> bool {
    let computed = hash_pin(pin, salt_hex);
    if computed.len() != stored_hash.len() {
        return false;
    }
    computed
        .bytes()
        .zip(stored_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
