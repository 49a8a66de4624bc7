use crate::{
    model::{
        Id,
        text::{Bio, PersonName},
    },
    password::PasswordHash,
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::OffsetDateTime;

pub const USERNAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub email: Email,
    pub first_name: PersonName,
    pub last_name: PersonName,
    pub profile_image: Option<String>,
    pub bio: Bio,
    pub email_verified: bool,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
}

impl User {
    /// Family name first, falling back to the username when both are empty.
    #[must_use]
    pub fn full_name(&self) -> String {
        let full_name = format!("{}{}", self.last_name.get(), self.first_name.get());
        if full_name.trim().is_empty() {
            self.username.get().to_owned()
        } else {
            full_name
        }
    }

    #[must_use]
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            profile_image: self.profile_image.clone(),
        }
    }
}

/// The public projection embedded wherever a user is referenced.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct UserSummary {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub profile_image: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub post_count: i64,
    pub comment_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub username: Username,
    pub email: Email,
    pub password_hash: PasswordHash,
}

/// Profile fields a user may change. `None` leaves a field untouched.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct UpdateProfile {
    pub first_name: Option<PersonName>,
    pub last_name: Option<PersonName>,
    pub email: Option<Email>,
    pub profile_image: Option<Option<String>>,
    pub bio: Option<Bio>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidUsernameError {
    #[error("Username may not be empty.")]
    Empty,
    #[error("Username may be at most 150 characters long.")]
    TooLong,
    #[error("Username may only contain letters, digits and @/./+/-/_ characters.")]
    InvalidCharacter(char),
}

impl Username {
    pub fn new(username: impl Into<String>) -> Result<Self, InvalidUsernameError> {
        let username = username.into();
        if username.is_empty() {
            return Err(InvalidUsernameError::Empty);
        }
        if username.chars().count() > USERNAME_MAX_LEN {
            return Err(InvalidUsernameError::TooLong);
        }
        if let Some(invalid) = username
            .chars()
            .find(|&c| !(c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')))
        {
            return Err(InvalidUsernameError::InvalidCharacter(invalid));
        }
        Ok(Self(username))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Username::new(inner.clone())
            .map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"Username"))
    }
}

/// An email address. The domain part is lowercased.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Enter a valid email address.")]
pub struct InvalidEmailError;

impl Email {
    pub fn new(email: &str) -> Result<Self, InvalidEmailError> {
        let email = email.trim();
        if email.len() > EMAIL_MAX_LEN || email.chars().any(char::is_whitespace) {
            return Err(InvalidEmailError);
        }
        let (local, domain) = email.rsplit_once('@').ok_or(InvalidEmailError)?;
        let domain_is_valid = domain
            .split('.')
            .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'))
            && domain.contains('.');
        if local.is_empty() || local.contains('@') || !domain_is_valid {
            return Err(InvalidEmailError);
        }
        Ok(Self(format!("{local}@{}", domain.to_lowercase())))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Email::new(&inner).map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"Email"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{Email, InvalidUsernameError, Username};

    #[test]
    fn username_rules() {
        assert!(Username::new("jgw").is_ok());
        assert!(Username::new("first.last+blog@home-1_x").is_ok());
        assert!(Username::new("한글이름").is_ok());
        assert_eq!(Username::new(""), Err(InvalidUsernameError::Empty));
        assert_eq!(
            Username::new("has space"),
            Err(InvalidUsernameError::InvalidCharacter(' '))
        );
        assert_eq!(
            Username::new("a".repeat(151)),
            Err(InvalidUsernameError::TooLong)
        );
    }

    #[test]
    fn email_rules() {
        assert_eq!(
            Email::new(" Reader@Example.COM ").unwrap().get(),
            "Reader@example.com"
        );
        for invalid in ["", "no-at-sign", "@example.com", "a@b", "a@@b.com", "a b@c.com", "a@-x.com"] {
            assert!(Email::new(invalid).is_err(), "{invalid} should be rejected");
        }
    }
}
