//! Password-based key derivation for login.
//!
//! The server stores a per-account salt and an `authVersion`; the client
//! derives both the master key (used to open metadata envelopes) and the
//! password actually sent to `/login` from the clear password. The clear
//! password never leaves the process.

use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha512};
use zeroize::Zeroizing;

use super::CryptoError;

/// PBKDF2 iteration count for the login derivation. Fixed by the protocol.
const LOGIN_ITERATIONS: u32 = 200_000;

/// Keys derived from the account password.
pub struct DerivedKeys {
    /// Master key used to decrypt metadata envelopes (64 lowercase hex chars
    /// for auth version 2, 128 for version 1).
    pub master_key: Zeroizing<String>,
    /// Hashed password sent to the server on login.
    pub auth_password: Zeroizing<String>,
}

/// Derive the master key and auth password from the clear password.
///
/// PBKDF2-HMAC-SHA512 over the password with the account salt, 200 000
/// iterations, 64 bytes of output encoded as 128 lowercase hex characters.
///
/// - version 2: the first 64 hex chars become the master key; the remaining
///   64 are hashed once more with SHA-512 to form the auth password
/// - version 1: the full 128 hex chars serve as both
pub fn derive_keys(
    password: &str,
    auth_version: u32,
    salt: &str,
) -> Result<DerivedKeys, CryptoError> {
    let mut derived = Zeroizing::new([0u8; 64]);
    pbkdf2_hmac::<Sha512>(
        password.as_bytes(),
        salt.as_bytes(),
        LOGIN_ITERATIONS,
        &mut *derived,
    );
    let key_hex = Zeroizing::new(hex::encode(*derived));

    match auth_version {
        2 => {
            let master_key = Zeroizing::new(key_hex[..64].to_string());
            let auth_password =
                Zeroizing::new(hex::encode(Sha512::digest(key_hex[64..].as_bytes())));
            Ok(DerivedKeys {
                master_key,
                auth_password,
            })
        }
        1 => Ok(DerivedKeys {
            master_key: Zeroizing::new(key_hex.to_string()),
            auth_password: key_hex,
        }),
        other => Err(CryptoError::UnsupportedAuthVersion(other)),
    }
}

/// One-round PBKDF2-HMAC-SHA512 key stretch.
///
/// The protocol uses this to turn printable key strings (master keys, file
/// keys) into fixed-length binary keys, and to derive the filename HMAC
/// subkey. One iteration: this is a format conversion, not hardening.
pub fn stretch_key(password: &[u8], salt: &[u8], out: &mut [u8]) {
    pbkdf2_hmac::<Sha512>(password, salt, 1, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_lower_hex(s: &str) -> bool {
        s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    #[test]
    fn v2_shapes() {
        let keys = derive_keys("hunter2", 2, &"A".repeat(32)).unwrap();
        assert_eq!(keys.master_key.len(), 64);
        assert_eq!(keys.auth_password.len(), 128);
        assert!(is_lower_hex(&keys.master_key));
        assert!(is_lower_hex(&keys.auth_password));
        // The auth password must not reveal the master key half.
        assert!(!keys.auth_password.contains(&*keys.master_key));
    }

    #[test]
    fn v1_uses_full_hex_for_both() {
        let keys = derive_keys("hunter2", 1, "salty").unwrap();
        assert_eq!(keys.master_key.len(), 128);
        assert_eq!(*keys.master_key, *keys.auth_password);
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_keys("pw", 2, "salt").unwrap();
        let b = derive_keys("pw", 2, "salt").unwrap();
        assert_eq!(*a.master_key, *b.master_key);
        assert_eq!(*a.auth_password, *b.auth_password);
    }

    #[test]
    fn salt_and_password_both_matter() {
        let base = derive_keys("pw", 2, "salt").unwrap();
        let other_salt = derive_keys("pw", 2, "salt2").unwrap();
        let other_pw = derive_keys("pw2", 2, "salt").unwrap();
        assert_ne!(*base.master_key, *other_salt.master_key);
        assert_ne!(*base.master_key, *other_pw.master_key);
    }

    #[test]
    fn rejects_unknown_auth_version() {
        assert!(matches!(
            derive_keys("pw", 3, "salt"),
            Err(CryptoError::UnsupportedAuthVersion(3))
        ));
    }

    #[test]
    fn stretch_key_is_deterministic_and_sized() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        stretch_key(b"key", b"key", &mut a);
        stretch_key(b"key", b"key", &mut b);
        assert_eq!(a, b);
        stretch_key(b"key", b"other", &mut b);
        assert_ne!(a, b);
    }
}
