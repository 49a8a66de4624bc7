use crate::model::{
    Id,
    post::PostMarker,
    reaction::ReactionCounts,
    text::CommentContent,
    user::{UserMarker, UserSummary},
};
use serde::Serialize;
use std::collections::HashMap;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post: Id<PostMarker>,
    pub author: UserSummary,
    pub parent: Option<Id<CommentMarker>>,
    pub content: String,
    pub is_active: bool,
    #[serde(flatten)]
    pub reactions: ReactionCounts,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Comment {
    /// Keeps the comment's place in a thread without exposing what it said.
    #[must_use]
    pub fn into_tombstone(self) -> Self {
        Self {
            content: String::new(),
            is_active: false,
            reactions: ReactionCounts::default(),
            ..self
        }
    }
}

/// A top-level comment and its visible replies, oldest first.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

/// Groups the comments of one post into threads.
///
/// Inactive replies are dropped. An inactive root survives as a tombstone only
/// while it still has an active reply. Threads and replies are ordered by
/// creation time.
#[must_use]
pub fn build_threads(comments: Vec<Comment>) -> Vec<CommentThread> {
    let mut roots = Vec::new();
    let mut replies: HashMap<Id<CommentMarker>, Vec<Comment>> = HashMap::new();

    for comment in comments {
        match comment.parent {
            None => roots.push(comment),
            Some(parent) if comment.is_active => replies.entry(parent).or_default().push(comment),
            Some(_) => {}
        }
    }

    roots.sort_by_key(|comment| (comment.created_at, comment.id));
    roots
        .into_iter()
        .filter_map(|root| {
            let mut replies = replies.remove(&root.id).unwrap_or_default();
            replies.sort_by_key(|reply| (reply.created_at, reply.id));

            let comment = if root.is_active {
                root
            } else if replies.is_empty() {
                return None;
            } else {
                root.into_tombstone()
            };

            Some(CommentThread { comment, replies })
        })
        .collect()
}

/// Where a new comment attaches after replies to replies are lifted to the
/// thread root.
#[must_use]
pub fn resolve_parent(parent: &Comment) -> Id<CommentMarker> {
    parent.parent.unwrap_or(parent.id)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateComment {
    pub post: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub parent: Option<Id<CommentMarker>>,
    pub content: CommentContent,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CommentFilter {
    pub post: Option<Id<PostMarker>>,
    pub author: Option<String>,
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        comment::{Comment, build_threads, resolve_parent},
        reaction::ReactionCounts,
        user::{UserSummary, Username},
    };
    use time::{Duration, macros::datetime};

    fn comment(id: u64, parent: Option<u64>, is_active: bool) -> Comment {
        let created_at = datetime!(2025-05-01 10:00 UTC) + Duration::minutes(id.cast_signed());
        Comment {
            id: Id::from(id),
            post: Id::from(1),
            author: UserSummary {
                id: Id::from(100),
                username: Username::new("writer").unwrap(),
                profile_image: None,
            },
            parent: parent.map(Id::from),
            content: format!("comment {id}"),
            is_active,
            reactions: ReactionCounts {
                likes_count: 2,
                dislikes_count: 0,
            },
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn groups_replies_under_roots_in_order() {
        let threads = build_threads(vec![
            comment(4, Some(1), true),
            comment(3, None, true),
            comment(2, Some(1), true),
            comment(1, None, true),
        ]);

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, Id::from(1));
        let reply_ids: Vec<_> = threads[0].replies.iter().map(|reply| reply.id).collect();
        assert_eq!(reply_ids, [Id::from(2), Id::from(4)]);
        assert!(threads[1].replies.is_empty());
    }

    #[test]
    fn soft_deleted_root_with_active_replies_is_a_tombstone() {
        let threads = build_threads(vec![
            comment(1, None, false),
            comment(2, Some(1), true),
            comment(3, Some(1), false),
        ]);

        assert_eq!(threads.len(), 1);
        let root = &threads[0].comment;
        assert!(!root.is_active);
        assert!(root.content.is_empty());
        assert_eq!(root.reactions, ReactionCounts::default());
        assert_eq!(threads[0].replies.len(), 1);
        assert_eq!(threads[0].replies[0].id, Id::from(2));
    }

    #[test]
    fn soft_deleted_root_without_replies_is_omitted() {
        let threads = build_threads(vec![
            comment(1, None, false),
            comment(2, Some(1), false),
            comment(3, None, true),
        ]);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment.id, Id::from(3));
    }

    #[test]
    fn replies_to_replies_attach_to_the_root() {
        assert_eq!(resolve_parent(&comment(1, None, true)), Id::from(1));
        assert_eq!(resolve_parent(&comment(5, Some(1), true)), Id::from(1));
    }
}
