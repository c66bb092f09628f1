//! The versioned metadata envelope (`002`).
//!
//! Every string the server stores about a node - names, sizes, MIME types,
//! the file metadata JSON, even the account master keys themselves - travels
//! inside this envelope:
//!
//! ```text
//! "002" ‖ iv (12 ASCII chars) ‖ base64(ciphertext ‖ tag16)
//! ```
//!
//! The IV is printable ASCII, not binary: its UTF-8 bytes are the GCM nonce.
//! That layout is imposed by the server wire format and must be preserved
//! byte-exact. The version prefix exists so the algorithm can rotate without
//! breaking old blobs.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::trace;
use zeroize::Zeroizing;

use super::kdf::stretch_key;
use super::{random_token, CryptoError};

/// Envelope version produced and accepted by this client.
const VERSION_TAG: &str = "002";

/// Length of the printable IV, in characters.
const IV_LEN: usize = 12;

/// GCM authentication tag length, in bytes.
const TAG_LEN: usize = 16;

/// Derive the 32-byte AES key for an envelope from its printable key string.
///
/// One PBKDF2-HMAC-SHA512 round with the key bytes as both password and salt.
fn envelope_key(key: &str) -> Zeroizing<[u8; 32]> {
    let mut derived = Zeroizing::new([0u8; 32]);
    stretch_key(key.as_bytes(), key.as_bytes(), &mut *derived);
    derived
}

/// Encrypt a metadata string under a printable key, producing a `002`
/// envelope.
pub fn encrypt_metadata(plaintext: &str, key: &str) -> Result<String, CryptoError> {
    let iv = random_token(IV_LEN);
    let derived = envelope_key(key);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*derived));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(iv.as_bytes()), plaintext.as_bytes())
        .map_err(|_| CryptoError::Malformed("metadata encryption failed".into()))?;

    trace!(plaintext_len = plaintext.len(), "metadata envelope sealed");
    Ok(format!("{VERSION_TAG}{iv}{}", BASE64.encode(ciphertext)))
}

/// Decrypt a `002` envelope. Strict inverse of [`encrypt_metadata`].
pub fn decrypt_metadata(envelope: &str, key: &str) -> Result<String, CryptoError> {
    let Some(rest) = envelope.strip_prefix(VERSION_TAG) else {
        return Err(CryptoError::BadVersion);
    };
    if rest.len() < IV_LEN || !rest.is_char_boundary(IV_LEN) {
        return Err(CryptoError::Malformed("envelope shorter than IV".into()));
    }
    let (iv, payload) = rest.split_at(IV_LEN);

    let data = BASE64.decode(payload)?;
    if data.len() < TAG_LEN {
        return Err(CryptoError::Malformed(
            "envelope payload shorter than auth tag".into(),
        ));
    }

    let derived = envelope_key(key);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*derived));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv.as_bytes()), data.as_ref())
        .map_err(|_| CryptoError::BadAuth)?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Malformed("decrypted metadata is not UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn round_trip() {
        let envelope = encrypt_metadata("hello world", KEY).unwrap();
        assert_eq!(decrypt_metadata(&envelope, KEY).unwrap(), "hello world");
    }

    #[test]
    fn envelope_layout() {
        let plaintext = "some metadata";
        let envelope = encrypt_metadata(plaintext, KEY).unwrap();

        assert!(envelope.starts_with("002"));
        // 3-char version + 12-char IV + base64 of (plaintext + 16-byte tag).
        let payload_len = plaintext.len() + 16;
        let b64_len = payload_len.div_ceil(3) * 4;
        assert_eq!(envelope.len(), 3 + 12 + b64_len);

        // The IV stays within the printable token alphabet.
        let iv = &envelope[3..15];
        assert!(iv
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let envelope = encrypt_metadata("x", KEY).unwrap();
        let forged = format!("001{}", &envelope[3..]);
        assert!(matches!(
            decrypt_metadata(&forged, KEY),
            Err(CryptoError::BadVersion)
        ));
    }

    #[test]
    fn wrong_key_fails_auth() {
        let envelope = encrypt_metadata("secret", KEY).unwrap();
        assert!(matches!(
            decrypt_metadata(&envelope, "another-key-another-key-another!"),
            Err(CryptoError::BadAuth)
        ));
    }

    #[test]
    fn truncated_envelope_is_malformed() {
        assert!(matches!(
            decrypt_metadata("002abc", KEY),
            Err(CryptoError::Malformed(_))
        ));
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let envelope = encrypt_metadata("", KEY).unwrap();
        assert_eq!(decrypt_metadata(&envelope, KEY).unwrap(), "");
    }

    #[test]
    fn non_bmp_names_round_trip() {
        let name = "report-\u{1F5C4}\u{1F512}.pdf";
        let envelope = encrypt_metadata(name, KEY).unwrap();
        assert_eq!(decrypt_metadata(&envelope, KEY).unwrap(), name);
    }
}
