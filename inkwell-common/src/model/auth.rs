//! Login sessions.
//!
//! A login hands out one token string, `{user_id}:{secret}:{salt}`, which the
//! API reads from `Authorization: Bearer` and the site reads from the
//! `session` cookie. Both parts after the user id are unpadded URL-safe
//! base64, so the string can be stored in a cookie as is. The database only
//! keeps the argon2 hash of the secret.

use crate::{
    model::{Id, user::UserMarker},
    util::PositiveDuration,
};
use argon2::{Argon2, Params};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_URL_SAFE_NO_PAD};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::OffsetDateTime;

pub const SESSION_SECRET_LEN: usize = 24;
pub const SESSION_SALT_LEN: usize = 18;
pub const SESSION_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

const SEPARATOR: char = ':';

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Could not hash the session secret: {0}")]
pub struct SessionTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum SessionTokenDecodeError {
    #[error("A session token has the form user_id:secret:salt")]
    NotEnoughParts,
    #[error("The session token names no valid user: {0}")]
    InvalidUserId(ParseIntError),
    #[error("The session token is not valid base64: {0}")]
    Decode(#[from] DecodeError),
    #[error("The session secret has the wrong length")]
    InvalidSecretLength,
    #[error("The session salt has the wrong length")]
    InvalidSaltLength,
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionToken {
    pub user_id: Id<UserMarker>,
    pub secret: [u8; SESSION_SECRET_LEN],
    pub salt: [u8; SESSION_SALT_LEN],
}

/// What `users.auth_tokens` stores in place of the secret.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionTokenHash(pub Box<[u8; SESSION_HASH_LEN]>);

/// One row of `users.auth_tokens`. Logging out deletes it, and changing the
/// password deletes every other row of the user.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Session {
    pub user: Id<UserMarker>,
    pub token_hash: SessionTokenHash,
    pub created_at: OffsetDateTime,
    /// `None` keeps the session until logout.
    pub expires_after: Option<PositiveDuration>,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_after
            .is_some_and(|lifetime| self.created_at + lifetime.get() < now)
    }
}

impl SessionToken {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        Self {
            user_id,
            secret: rand::random(),
            salt: rand::random(),
        }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let secret = Base64Display::new(&self.secret, &BASE64_URL_SAFE_NO_PAD);
        let salt = Base64Display::new(&self.salt, &BASE64_URL_SAFE_NO_PAD);

        format!("{}{SEPARATOR}{secret}{SEPARATOR}{salt}", self.user_id)
    }

    /// The key sessions are looked up by. The same token always hashes the same.
    pub fn hash(&self) -> Result<SessionTokenHash, SessionTokenHashError> {
        let mut hash = Box::new([0; SESSION_HASH_LEN]);
        Argon2::default()
            .hash_password_into(&self.secret, &self.salt, &mut *hash)
            .map_err(SessionTokenHashError)?;

        Ok(SessionTokenHash(hash))
    }
}

impl FromStr for SessionToken {
    type Err = SessionTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user_id, rest) = s.split_once(SEPARATOR).ok_or(Self::Err::NotEnoughParts)?;
        let (secret, salt) = rest.split_once(SEPARATOR).ok_or(Self::Err::NotEnoughParts)?;

        let user_id = user_id
            .parse::<u64>()
            .map_err(Self::Err::InvalidUserId)?
            .into();
        let secret = BASE64_URL_SAFE_NO_PAD
            .decode(secret)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSecretLength)?;
        let salt = BASE64_URL_SAFE_NO_PAD
            .decode(salt)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self {
            user_id,
            secret,
            salt,
        })
    }
}

impl Debug for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl Debug for SessionTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionTokenHash(..)")
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("A stored session hash has the wrong length")]
pub struct InvalidSessionTokenHashError;

impl TryFrom<Vec<u8>> for SessionTokenHash {
    type Error = InvalidSessionTokenHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        let bytes: [u8; SESSION_HASH_LEN] =
            value.try_into().map_err(|_| InvalidSessionTokenHashError)?;
        Ok(Self(Box::new(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{
            Id,
            auth::{Session, SessionToken, SessionTokenDecodeError},
        },
        util::PositiveDuration,
    };
    use time::{Duration, macros::datetime};

    #[test]
    fn token_string_parses_back() {
        let token = SessionToken::generate_random(Id::from(1234));
        let parsed: SessionToken = token.as_token_str().parse().unwrap();
        assert_eq!(parsed, token);
        assert!(token.as_token_str().starts_with("1234:"));
    }

    #[test]
    fn token_string_is_a_plain_cookie_value() {
        let token = SessionToken::generate_random(Id::from(99)).as_token_str();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_'))
        );
    }

    #[test]
    fn debug_hides_the_secret() {
        let token = SessionToken::generate_random(Id::from(5));
        let debug = format!("{token:?}");
        assert!(debug.contains("user_id"));
        assert!(!debug.contains("secret"));
        assert_eq!(format!("{:?}", token.hash().unwrap()), "SessionTokenHash(..)");
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert_eq!(
            "1234".parse::<SessionToken>(),
            Err(SessionTokenDecodeError::NotEnoughParts)
        );
        assert_eq!(
            "1234:AAAA".parse::<SessionToken>(),
            Err(SessionTokenDecodeError::NotEnoughParts)
        );
        assert!(matches!(
            "abc:AAAA:AAAA".parse::<SessionToken>(),
            Err(SessionTokenDecodeError::InvalidUserId(_))
        ));
        assert_eq!(
            "1:AAAA:AAAA".parse::<SessionToken>(),
            Err(SessionTokenDecodeError::InvalidSecretLength)
        );
    }

    #[test]
    fn hash_is_deterministic_per_token() {
        let token = SessionToken::generate_random(Id::from(7));
        assert_eq!(token.hash().unwrap(), token.hash().unwrap());

        let other = SessionToken::generate_random(Id::from(7));
        assert_ne!(token.hash().unwrap(), other.hash().unwrap());
    }

    #[test]
    fn expiry() {
        let created_at = datetime!(2025-06-01 12:00 UTC);
        let session = Session {
            user: Id::from(1),
            token_hash: SessionToken::generate_random(Id::from(1)).hash().unwrap(),
            created_at,
            expires_after: PositiveDuration::new(Duration::hours(1)),
        };
        assert!(!session.is_expired_at(created_at + Duration::minutes(59)));
        assert!(session.is_expired_at(created_at + Duration::minutes(61)));

        let forever = Session {
            expires_after: None,
            ..session
        };
        assert!(!forever.is_expired_at(created_at + Duration::days(3650)));
    }
}
