pub mod auth;
pub mod category;
pub mod comment;
pub mod notification;
pub mod page;
pub mod post;
pub mod reaction;
pub mod series;
pub mod tag;
pub mod text;
pub mod user;

use crate::{
    model::{
        auth::InvalidSessionTokenHashError,
        notification::UnknownNotificationKindError,
        reaction::UnknownReactionKindError,
        text::InvalidTextError,
        user::{InvalidEmailError, InvalidUsernameError},
    },
    password::InvalidPasswordHashError,
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::NonPositiveDurationError,
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Username(#[from] InvalidUsernameError),
    #[error(transparent)]
    Email(#[from] InvalidEmailError),
    #[error(transparent)]
    Text(#[from] InvalidTextError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidSessionTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] InvalidPasswordHashError),
    #[error(transparent)]
    ReactionKind(#[from] UnknownReactionKindError),
    #[error(transparent)]
    NotificationKind(#[from] UnknownNotificationKindError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct InkwellEpoch;
impl Epoch for InkwellEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type InkwellSnowflake = Snowflake<InkwellEpoch>;
pub type InkwellSnowflakeGenerator = SnowflakeGenerator<InkwellEpoch>;

/// A typed snowflake. `Marker` keeps ids of different tables apart.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(InkwellSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: InkwellSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> InkwellSnowflake {
        self.0
    }

    /// The id as stored in a `BIGINT` column.
    #[must_use]
    pub fn to_db(self) -> i64 {
        self.0.get().cast_signed()
    }

    #[must_use]
    pub fn from_db(value: i64) -> Self {
        value.cast_unsigned().into()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<InkwellSnowflake> for Id<Marker> {
    fn from(value: InkwellSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(InkwellSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, post::PostMarker};

    #[test]
    fn db_representation_round_trips_high_bit() {
        let id = Id::<PostMarker>::from(u64::MAX - 7);
        assert!(id.to_db() < 0);
        assert_eq!(Id::<PostMarker>::from_db(id.to_db()), id);
    }

    #[test]
    fn serializes_as_plain_number() {
        let id = Id::<PostMarker>::from(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(serde_json::from_str::<Id<PostMarker>>("42").unwrap(), id);
    }
}
