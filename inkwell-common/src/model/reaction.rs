use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// Likes and dislikes share one row per (user, target), so a user is always
/// in at most one of the two sets.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown reaction kind: {0}")]
pub struct UnknownReactionKindError(String);

impl ReactionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }
}

impl Display for ReactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = UnknownReactionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(ReactionKind::Like),
            "dislike" => Ok(ReactionKind::Dislike),
            other => Err(UnknownReactionKindError(other.to_owned())),
        }
    }
}

/// The reaction a user holds after requesting `requested`.
///
/// Requesting the side already held clears it; requesting the other side
/// switches to it.
#[must_use]
pub fn toggle(current: Option<ReactionKind>, requested: ReactionKind) -> Option<ReactionKind> {
    match current {
        Some(held) if held == requested => None,
        _ => Some(requested),
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
pub struct ReactionCounts {
    pub likes_count: i64,
    pub dislikes_count: i64,
}

/// Result of a like or dislike toggle, shaped as
/// `{"liked": bool, "likes_count": n, "dislikes_count": m}` (or `disliked`).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct ReactionToggle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disliked: Option<bool>,
    #[serde(flatten)]
    pub counts: ReactionCounts,
}

impl ReactionToggle {
    #[must_use]
    pub fn new(requested: ReactionKind, state: Option<ReactionKind>, counts: ReactionCounts) -> Self {
        let active = state == Some(requested);
        match requested {
            ReactionKind::Like => Self {
                liked: Some(active),
                disliked: None,
                counts,
            },
            ReactionKind::Dislike => Self {
                liked: None,
                disliked: Some(active),
                counts,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::reaction::{ReactionCounts, ReactionKind, ReactionToggle, toggle};
    use ReactionKind::{Dislike, Like};

    #[test]
    fn toggle_transitions() {
        assert_eq!(toggle(None, Like), Some(Like));
        assert_eq!(toggle(Some(Like), Like), None);
        assert_eq!(toggle(Some(Like), Dislike), Some(Dislike));
        assert_eq!(toggle(Some(Dislike), Like), Some(Like));
        assert_eq!(toggle(Some(Dislike), Dislike), None);
    }

    #[test]
    fn like_then_dislike_leaves_only_dislike() {
        let state = toggle(toggle(None, Like), Dislike);
        assert_eq!(state, Some(Dislike));

        let state = toggle(toggle(None, Dislike), Like);
        assert_eq!(state, Some(Like));
    }

    #[test]
    fn any_sequence_holds_at_most_one_side() {
        let sequence = [Like, Like, Dislike, Like, Dislike, Dislike, Like];
        let mut state = None;
        let (mut likes, mut dislikes) = (0_i32, 0_i32);
        for requested in sequence {
            let next = toggle(state, requested);
            for kind in [Like, Dislike] {
                let counter = if kind == Like { &mut likes } else { &mut dislikes };
                *counter += i32::from(next == Some(kind)) - i32::from(state == Some(kind));
            }
            state = next;
            assert!(likes + dislikes <= 1);
            assert!(likes >= 0 && dislikes >= 0);
        }
        assert_eq!(state, Some(Like));
    }

    #[test]
    fn toggle_response_shape() {
        let counts = ReactionCounts {
            likes_count: 3,
            dislikes_count: 1,
        };
        let json = serde_json::to_value(ReactionToggle::new(Like, Some(Like), counts)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"liked": true, "likes_count": 3, "dislikes_count": 1})
        );

        let json = serde_json::to_value(ReactionToggle::new(Dislike, None, counts)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"disliked": false, "likes_count": 3, "dislikes_count": 1})
        );
    }

    #[test]
    fn kind_parses_from_storage() {
        assert_eq!("like".parse::<ReactionKind>(), Ok(Like));
        assert_eq!("dislike".parse::<ReactionKind>(), Ok(Dislike));
        assert!("meh".parse::<ReactionKind>().is_err());
    }
}
