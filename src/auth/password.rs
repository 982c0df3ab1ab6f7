/// Password Hashing and Verification
///
/// Salted SHA-256 password digests: `digest = SHA256(salt_hex || plaintext)`.
/// Salts come from the operating system CSPRNG and are stored hex-encoded
/// next to the digest.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// Salt length in bytes before hex encoding.
pub const DEFAULT_SALT_LENGTH: usize = 32;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// A stored password digest together with the salt that produced it.
///
/// Immutable once created. Changing a password means creating a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordRecord {
    pub digest: String,
    pub salt: String,
}

/// Hash a password with a fresh salt of the default length
pub fn generate_salted_hash(plaintext: &str) -> PasswordRecord {
    generate_salted_hash_with_length(plaintext, DEFAULT_SALT_LENGTH)
}

/// Hash a password with a fresh `salt_length`-byte salt
pub fn generate_salted_hash_with_length(plaintext: &str, salt_length: usize) -> PasswordRecord {
    let mut salt_bytes = vec![0u8; salt_length];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = hex::encode(salt_bytes);
    let digest = digest(&salt, plaintext);

    PasswordRecord { digest, salt }
}

/// Verify a password against its stored record
///
/// Never fails: malformed records simply do not match.
pub fn verify_password(plaintext: &str, record: &PasswordRecord) -> bool {
    let candidate = digest(&record.salt, plaintext);
    constant_time_eq(candidate.as_bytes(), record.digest.as_bytes())
}

/// Check a password chosen at signup
///
/// Requirements:
/// - Not blank
/// - Minimum 8 characters
/// - Maximum 128 characters
pub fn validate_new_password(password: &str) -> Result<(), ValidationError> {
    if password.trim().is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }

    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        ));
    }

    // DoS prevention: hashing cost grows with input length
    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        ));
    }

    Ok(())
}

fn digest(salt: &str, plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time byte comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let record = generate_salted_hash("correct-pw");

        assert_ne!(record.digest, "correct-pw");
        assert!(verify_password("correct-pw", &record));
    }

    #[test]
    fn test_verify_wrong_password() {
        let record = generate_salted_hash("correct-pw");
        assert!(!verify_password("wrong-pw", &record));
    }

    #[test]
    fn test_known_digest() {
        // SHA256("ab12correct-pw")
        let mut hasher = Sha256::new();
        hasher.update(b"ab12correct-pw");
        let record = PasswordRecord {
            digest: hex::encode(hasher.finalize()),
            salt: "ab12".to_string(),
        };

        assert!(verify_password("correct-pw", &record));
        assert!(!verify_password("correct-pw ", &record));
    }

    #[test]
    fn test_salt_length_and_encoding() {
        let record = generate_salted_hash_with_length("secret", 16);

        assert_eq!(record.salt.len(), 32);
        assert!(record.salt.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(record.digest.len(), 64);
    }

    #[test]
    fn test_same_password_different_salts() {
        let first = generate_salted_hash("same-password");
        let second = generate_salted_hash("same-password");

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.digest, second.digest);
    }

    #[test]
    fn test_malformed_record_does_not_match() {
        let record = PasswordRecord {
            digest: "not-hex-and-short".to_string(),
            salt: "zz".to_string(),
        };
        assert!(!verify_password("anything", &record));

        let empty = PasswordRecord {
            digest: String::new(),
            salt: String::new(),
        };
        assert!(!verify_password("", &empty));
    }

    #[test]
    fn test_many_plaintexts_round_trip() {
        let long = "x".repeat(200);
        for plaintext in ["", "a", "pässwörd", "with spaces in it", long.as_str()] {
            let record = generate_salted_hash(plaintext);
            assert!(verify_password(plaintext, &record), "{:?}", plaintext);
        }
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }

    #[test]
    fn test_too_short_password() {
        assert_eq!(
            validate_new_password("Short1"),
            Err(ValidationError::TooShort("password".to_string(), 8))
        );
    }

    #[test]
    fn test_blank_password() {
        assert!(matches!(
            validate_new_password("   "),
            Err(ValidationError::EmptyField(_))
        ));
    }

    #[test]
    fn test_too_long_password() {
        let long_password = "a".repeat(MAX_PASSWORD_LENGTH + 1);
        assert!(validate_new_password(&long_password).is_err());
    }

    #[test]
    fn test_valid_password() {
        assert!(validate_new_password("correct-pw").is_ok());
    }
}
