//! Bulk data AEAD for file content chunks.
//!
//! Each 1 MiB plaintext chunk is sealed independently with AES-256-GCM under
//! the per-file key. The wire layout is `nonce12 ‖ ciphertext ‖ tag16`; a
//! chunk can only be verified once it has been received whole, which is why
//! the streaming reader always fetches whole chunks.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use super::CryptoError;

/// Nonce length, in bytes.
const NONCE_LEN: usize = 12;

/// GCM authentication tag length, in bytes.
const TAG_LEN: usize = 16;

/// Encrypt one chunk of file content: `nonce12 ‖ ciphertext ‖ tag16`.
pub fn encrypt_chunk(plaintext: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Malformed("chunk encryption failed".into()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt one chunk. Requires exactly the `nonce12 ‖ ciphertext ‖ tag16`
/// layout produced by [`encrypt_chunk`].
pub fn decrypt_chunk(encrypted: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    if encrypted.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Malformed(format!(
            "chunk of {} bytes is shorter than nonce + tag",
            encrypted.len()
        )));
    }

    let (nonce, ciphertext) = encrypted.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::BadAuth)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";

    #[test]
    fn round_trip() {
        let data = b"chunk payload bytes".to_vec();
        let sealed = encrypt_chunk(&data, &KEY).unwrap();
        assert_eq!(decrypt_chunk(&sealed, &KEY).unwrap(), data);
    }

    #[test]
    fn layout_overhead_is_nonce_plus_tag() {
        let data = vec![7u8; 1000];
        let sealed = encrypt_chunk(&data, &KEY).unwrap();
        assert_eq!(sealed.len(), 12 + data.len() + 16);
    }

    #[test]
    fn empty_chunk_round_trips() {
        let sealed = encrypt_chunk(&[], &KEY).unwrap();
        assert_eq!(sealed.len(), 12 + 16);
        assert!(decrypt_chunk(&sealed, &KEY).unwrap().is_empty());
    }

    #[test]
    fn any_flipped_byte_fails_auth() {
        let sealed = encrypt_chunk(b"sensitive", &KEY).unwrap();
        for i in 0..sealed.len() {
            let mut corrupted = sealed.clone();
            corrupted[i] ^= 0x01;
            assert!(
                decrypt_chunk(&corrupted, &KEY).is_err(),
                "corruption at byte {i} went undetected"
            );
        }
    }

    #[test]
    fn wrong_key_fails_auth() {
        let sealed = encrypt_chunk(b"data", &KEY).unwrap();
        let other = *b"fedcba9876543210fedcba9876543210";
        assert!(matches!(
            decrypt_chunk(&sealed, &other),
            Err(CryptoError::BadAuth)
        ));
    }

    #[test]
    fn short_input_is_malformed() {
        assert!(matches!(
            decrypt_chunk(&[0u8; 10], &KEY),
            Err(CryptoError::Malformed(_))
        ));
    }
}
