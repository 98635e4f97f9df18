//! Password hashing and credential generation
//!
//! Hashes use Argon2id with the argon2 crate defaults and a random salt per
//! hash. Generated passwords and activation tokens come from the OS RNG.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{
        rand_core::{OsRng, RngCore},
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2,
};
use data_encoding::BASE64URL_NOPAD;

/// Characters for generated passwords; excludes look-alikes such as `l`, `1`, `O`, `0`
pub const PASSWORD_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of generated passwords
pub const GENERATED_PASSWORD_LENGTH: usize = 10;

/// Random bytes in an activation token
const ACTIVATION_TOKEN_BYTES: usize = 32;

/// Hash a password as a PHC string (`$argon2id$...`)
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Returns `Ok(false)` on mismatch and an error only when the stored hash
/// cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

/// Generate a random password from [`PASSWORD_ALPHABET`]
pub fn generate_password() -> String {
    generate_from_alphabet(GENERATED_PASSWORD_LENGTH, PASSWORD_ALPHABET)
}

fn generate_from_alphabet(length: usize, alphabet: &[u8]) -> String {
    // Rejection sampling keeps the distribution uniform
    let limit = 256 - (256 % alphabet.len());
    let mut out = String::with_capacity(length);
    let mut buf = [0u8; 32];
    while out.len() < length {
        OsRng.fill_bytes(&mut buf);
        for &b in buf.iter() {
            if (b as usize) < limit {
                out.push(alphabet[b as usize % alphabet.len()] as char);
                if out.len() == length {
                    break;
                }
            }
        }
    }
    out
}

/// Generate a URL-safe activation token (32 random bytes, base64url)
pub fn generate_activation_token() -> String {
    let mut bytes = [0u8; ACTIVATION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    BASE64URL_NOPAD.encode(&bytes)
}

/// A hash no password verifies against, for accounts awaiting credentials
pub fn unusable_password_hash() -> Result<String> {
    let mut bytes = [0u8; 48];
    OsRng.fill_bytes(&mut bytes);
    hash_password(&BASE64URL_NOPAD.encode(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_password_produces_argon2id_hash() {
        let hash = hash_password("test_password_123").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_hash_password_produces_different_hashes() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct_password").unwrap();
        assert!(verify_password("correct_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash_format").is_err());
    }

    #[test]
    fn test_generated_password_shape() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(password.bytes().all(|b| PASSWORD_ALPHABET.contains(&b)));
        for ambiguous in ['l', 'I', '1', 'O', '0', 'o', 'i'] {
            assert!(!password.contains(ambiguous));
        }
    }

    #[test]
    fn test_generated_passwords_differ() {
        assert_ne!(generate_password(), generate_password());
    }

    #[test]
    fn test_activation_token_is_url_safe() {
        let token = generate_activation_token();
        // 32 bytes base64 without padding
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(BASE64URL_NOPAD.decode(token.as_bytes()).unwrap().len(), 32);
    }

    #[test]
    fn test_unusable_hash_rejects_common_input() {
        let hash = unusable_password_hash().unwrap();
        assert!(!verify_password("", &hash).unwrap());
        assert!(!verify_password("password", &hash).unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn generated_strings_use_alphabet(len in 1usize..40) {
            let s = generate_from_alphabet(len, b"ab");
            prop_assert_eq!(s.len(), len);
            prop_assert!(s.chars().all(|c| c == 'a' || c == 'b'));
        }
    }
}
