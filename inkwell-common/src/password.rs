use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use std::fmt::{Debug, Formatter};
use thiserror::Error;

pub const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_SALT_LEN: usize = 16;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Stored password hash is not a valid PHC string")]
pub struct InvalidPasswordHashError;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum WeakPasswordError {
    #[error("This password is too short. It must contain at least 8 characters.")]
    TooShort,
    #[error("This password is entirely numeric.")]
    EntirelyNumeric,
    #[error("The password is too similar to the username.")]
    SimilarToUsername,
}

/// An argon2 hash in PHC string format.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn generate(password: &str) -> Result<Self, PasswordHashError> {
        let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(Self(hash.to_string()))
    }

    /// Wraps a hash loaded from storage, checking that it parses.
    pub fn from_stored(phc: String) -> Result<Self, InvalidPasswordHashError> {
        password_hash::PasswordHash::new(&phc).map_err(|_| InvalidPasswordHashError)?;
        Ok(Self(phc))
    }

    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        password_hash::PasswordHash::new(&self.0).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordHash").field(&"[redacted]").finish()
    }
}

/// Every reason `password` is too weak, in a stable order.
#[must_use]
pub fn check_strength(password: &str, username: &str) -> Vec<WeakPasswordError> {
    let mut problems = Vec::new();
    if password.chars().count() < PASSWORD_MIN_LEN {
        problems.push(WeakPasswordError::TooShort);
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push(WeakPasswordError::EntirelyNumeric);
    }
    if !username.is_empty() {
        let password = password.to_lowercase();
        let username = username.to_lowercase();
        if password == username || password.contains(&username) || username.contains(&password)
        {
            problems.push(WeakPasswordError::SimilarToUsername);
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use crate::password::{PasswordHash, WeakPasswordError, check_strength};

    #[test]
    fn hash_and_verify() {
        let hash = PasswordHash::generate("correct horse battery").unwrap();
        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(hash.verify("correct horse battery"));
        assert!(!hash.verify("wrong horse battery"));

        let other = PasswordHash::generate("correct horse battery").unwrap();
        assert_ne!(hash, other, "salts differ between hashes");
    }

    #[test]
    fn stored_hash_must_parse() {
        let hash = PasswordHash::generate("s3cret-pass").unwrap();
        let reloaded = PasswordHash::from_stored(hash.as_str().to_owned()).unwrap();
        assert!(reloaded.verify("s3cret-pass"));
        assert!(PasswordHash::from_stored("plaintext".to_owned()).is_err());
    }

    #[test]
    fn strength_rules() {
        assert!(check_strength("a-decent-passphrase", "reader").is_empty());
        assert_eq!(
            check_strength("1234567", "reader"),
            [WeakPasswordError::TooShort, WeakPasswordError::EntirelyNumeric]
        );
        assert_eq!(
            check_strength("Reader2024", "reader"),
            [WeakPasswordError::SimilarToUsername]
        );
    }

    #[test]
    fn debug_is_redacted() {
        let hash = PasswordHash::generate("hunter22hunter").unwrap();
        assert_eq!(format!("{hash:?}"), "PasswordHash(\"[redacted]\")");
    }
}
