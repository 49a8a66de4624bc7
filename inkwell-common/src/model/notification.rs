use crate::model::{
    Id,
    comment::CommentMarker,
    page::Page,
    post::PostMarker,
    user::{UserMarker, UserSummary},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct NotificationMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Follow,
    Comment,
    Reply,
    PostLike,
    CommentLike,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown notification kind: {0}")]
pub struct UnknownNotificationKindError(String);

impl NotificationKind {
    pub const ALL: [NotificationKind; 5] = [
        NotificationKind::Follow,
        NotificationKind::Comment,
        NotificationKind::Reply,
        NotificationKind::PostLike,
        NotificationKind::CommentLike,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Follow => "follow",
            NotificationKind::Comment => "comment",
            NotificationKind::Reply => "reply",
            NotificationKind::PostLike => "post_like",
            NotificationKind::CommentLike => "comment_like",
        }
    }

    /// Human readable text shown next to the sender's name.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            NotificationKind::Follow => "started following you",
            NotificationKind::Comment => "commented on your post",
            NotificationKind::Reply => "replied to your comment",
            NotificationKind::PostLike => "liked your post",
            NotificationKind::CommentLike => "liked your comment",
        }
    }
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = UnknownNotificationKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownNotificationKindError(s.to_owned()))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Notification {
    pub id: Id<NotificationMarker>,
    pub sender: UserSummary,
    pub kind: NotificationKind,
    pub message: &'static str,
    pub post: Option<Id<PostMarker>>,
    pub post_slug: Option<String>,
    pub comment: Option<Id<CommentMarker>>,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct NotificationList {
    pub unread_count: i64,
    #[serde(flatten)]
    pub page: Page<Notification>,
}

/// A notification waiting to be stored.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewNotification {
    pub recipient: Id<UserMarker>,
    pub sender: Id<UserMarker>,
    pub kind: NotificationKind,
    pub post: Option<Id<PostMarker>>,
    pub comment: Option<Id<CommentMarker>>,
}

impl NewNotification {
    /// `None` when the sender would notify themselves.
    #[must_use]
    pub fn new(
        recipient: Id<UserMarker>,
        sender: Id<UserMarker>,
        kind: NotificationKind,
    ) -> Option<Self> {
        (recipient != sender).then_some(Self {
            recipient,
            sender,
            kind,
            post: None,
            comment: None,
        })
    }

    #[must_use]
    pub fn with_post(self, post: Id<PostMarker>) -> Self {
        Self {
            post: Some(post),
            ..self
        }
    }

    #[must_use]
    pub fn with_comment(self, comment: Id<CommentMarker>) -> Self {
        Self {
            comment: Some(comment),
            ..self
        }
    }
}

/// Result of a follow toggle.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct FollowStatus {
    pub following: bool,
    pub followers_count: i64,
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        notification::{NewNotification, NotificationKind},
    };

    #[test]
    fn kinds_round_trip_through_storage_names() {
        for kind in NotificationKind::ALL {
            assert_eq!(kind.as_str().parse::<NotificationKind>(), Ok(kind));
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::Value::from(kind.as_str())
            );
        }
        assert!("poke".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn never_notifies_self() {
        assert_eq!(
            NewNotification::new(Id::from(1), Id::from(1), NotificationKind::Follow),
            None
        );

        let notification = NewNotification::new(Id::from(1), Id::from(2), NotificationKind::Reply)
            .unwrap()
            .with_post(Id::from(10))
            .with_comment(Id::from(20));
        assert_eq!(notification.post, Some(Id::from(10)));
        assert_eq!(notification.comment, Some(Id::from(20)));
    }
}
