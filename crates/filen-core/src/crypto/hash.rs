//! Filename lookup hashes and content digests.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha512};
use std::io::Read;
use std::path::Path;
use zeroize::Zeroizing;

use super::kdf::stretch_key;

type HmacSha256 = Hmac<sha2::Sha256>;

/// Compute the server-side filename lookup index.
///
/// A 32-byte HMAC key is derived from the master key salted with the
/// lowercase email (one PBKDF2 round), then HMAC-SHA256 is taken over the
/// lowercase name. Lowercasing both inputs makes the index case-insensitive
/// and stable across sessions.
pub fn hash_filename(name: &str, email: &str, master_key: &str) -> String {
    let mut hmac_key = Zeroizing::new([0u8; 32]);
    stretch_key(
        master_key.as_bytes(),
        email.to_lowercase().as_bytes(),
        &mut *hmac_key,
    );

    let mut mac = HmacSha256::new_from_slice(&*hmac_key)
        .expect("HMAC accepts any key length");
    mac.update(name.to_lowercase().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Lowercase-hex SHA-512 of a byte slice.
pub fn sha512_hex(data: &[u8]) -> String {
    hex::encode(Sha512::digest(data))
}

/// Lowercase-hex SHA-512 of a local file, read in 1 MiB slices.
pub fn sha512_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha512::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MK: &str = "aabbccddeeff00112233445566778899aabbccddeeff00112233445566778899";

    #[test]
    fn filename_hash_is_case_insensitive() {
        let a = hash_filename("Report.PDF", "User@Example.com", MK);
        let b = hash_filename("report.pdf", "user@example.com", MK);
        assert_eq!(a, b);
    }

    #[test]
    fn filename_hash_shape() {
        let h = hash_filename("file.txt", "user@example.com", MK);
        assert_eq!(h.len(), 64);
        assert!(h.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn filename_hash_depends_on_all_inputs() {
        let base = hash_filename("a.txt", "user@example.com", MK);
        assert_ne!(base, hash_filename("b.txt", "user@example.com", MK));
        assert_ne!(base, hash_filename("a.txt", "other@example.com", MK));
        let other_key = "0".repeat(64);
        assert_ne!(base, hash_filename("a.txt", "user@example.com", &other_key));
    }

    #[test]
    fn filename_hash_survives_non_bmp_names() {
        let name = "\u{1F5C4}archive\u{1F512}";
        let a = hash_filename(name, "user@example.com", MK);
        let b = hash_filename(name, "USER@EXAMPLE.COM", MK);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn sha512_file_matches_in_memory_digest() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let content = vec![0xabu8; 3000];
        tmp.write_all(&content).unwrap();

        assert_eq!(sha512_file(tmp.path()).unwrap(), sha512_hex(&content));
    }

    #[test]
    fn sha512_of_empty_input() {
        let h = sha512_hex(&[]);
        assert_eq!(h.len(), 128);
        // Well-known SHA-512 of the empty string.
        assert!(h.starts_with("cf83e1357eefb8bd"));
    }
}
