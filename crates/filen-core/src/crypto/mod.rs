//! Cryptographic primitives for the Filen protocol.
//!
//! Four concerns live here, all deterministic given their inputs:
//!
//! - [`kdf`]: PBKDF2 password derivation for login
//! - [`envelope`]: the versioned `002` metadata envelope (AES-256-GCM)
//! - [`bulk`]: per-chunk AEAD for file content
//! - [`hash`]: the server-side filename lookup HMAC and SHA-512 digests

pub mod bulk;
pub mod envelope;
pub mod hash;
pub mod kdf;

use rand::Rng;
use rand::RngCore;
use thiserror::Error;

/// Alphabet used for printable random tokens (IVs, file keys, upload keys).
///
/// The 12-char metadata IV is sent as ASCII inside the envelope string, so it
/// must stay within this URL-safe set. This is a server wire contract.
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Errors that can occur during cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The metadata string does not start with a supported version tag.
    ///
    /// Only envelope version `002` is produced or accepted. Anything else is
    /// either a future format or corruption; refuse rather than guess.
    #[error("unsupported metadata envelope version (expected \"002\")")]
    BadVersion,

    /// GCM authentication failed.
    ///
    /// The ciphertext is invalid for the given key: wrong master key, or the
    /// data was tampered with in transit or at rest. The two cases are
    /// cryptographically indistinguishable.
    #[error("authentication failed - wrong key or corrupted ciphertext")]
    BadAuth,

    /// The envelope or chunk is structurally too short to contain an IV,
    /// ciphertext and tag.
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// Base64 payload of a metadata envelope failed to decode.
    #[error("invalid base64 in metadata envelope: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The login derivation was asked for an auth version this client does
    /// not implement.
    #[error("unsupported auth version {0} (expected 1 or 2)")]
    UnsupportedAuthVersion(u32),
}

/// Generate a random printable token of `len` characters from the URL-safe
/// alphabet.
pub fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..TOKEN_ALPHABET.len());
            TOKEN_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate `len` random bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_has_requested_length_and_charset() {
        let token = random_token(32);
        assert_eq!(token.len(), 32);
        assert!(token.bytes().all(|b| TOKEN_ALPHABET.contains(&b)));
    }

    #[test]
    fn tokens_are_not_repeated() {
        // 64^32 possibilities; a collision here means the RNG is broken.
        assert_ne!(random_token(32), random_token(32));
    }

    #[test]
    fn random_bytes_length() {
        assert_eq!(random_bytes(12).len(), 12);
    }
}
