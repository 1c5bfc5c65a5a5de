//! Password utilities

use argon2::Argon2;
use argon2::password_hash::Error;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;

/// Generate a random secret
pub fn generate() -> String {
    SaltString::generate(&mut OsRng).to_string()
}

/// Hash a given password with a fresh salt
pub fn hash(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hashed_password| hashed_password.to_string())
}

/// Verify a given password against a given hash
///
/// A hash that can not be parsed never matches
pub fn verify(hashed_password: &str, password: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hashed_password) {
        Ok(parsed_hash) => parsed_hash,
        Err(err) => {
            tracing::warn!("Stored password hash is invalid: {err}");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hashed_password = hash("verysecret").unwrap();

        assert_ne!("verysecret", hashed_password);
        assert!(verify(&hashed_password, "verysecret"));
        assert!(!verify(&hashed_password, "wrongpassword"));
    }

    #[test]
    fn test_invalid_hash_never_matches() {
        assert!(!verify("not-a-hash", "verysecret"));
    }

    #[test]
    fn test_generate_is_random() {
        assert_ne!(generate(), generate());
    }
}
