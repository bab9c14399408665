// src/auth.rs

//! Salted passphrase hashing.
//!
//! Records store a random salt and the SHA-256 digest of salt plus
//! passphrase, both base64-encoded. Plaintext passphrases from old
//! metadata files are migrated to this scheme on startup.

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Generate a salt and the matching hash for a new passphrase.
pub fn generate_hash(passphrase: &str) -> (String, String) {
    let mut salt_bytes = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = base64::engine::general_purpose::STANDARD.encode(salt_bytes);
    let hash = hash_passphrase(passphrase, &salt);
    (salt, hash)
}

/// Check a passphrase against a stored salt and hash.
///
/// Comparison is constant-time to keep timing from leaking prefix
/// matches.
pub fn verify_passphrase(passphrase: &str, salt: &str, hash: &str) -> bool {
    if salt.is_empty() || hash.is_empty() {
        return false;
    }
    let computed = hash_passphrase(passphrase, salt);
    constant_time_eq(computed.as_bytes(), hash.as_bytes())
}

fn hash_passphrase(passphrase: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(passphrase.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
