use crate::{
    model::{
        Id,
        category::{CategoryMarker, CategorySummary},
        comment::CommentThread,
        reaction::ReactionCounts,
        series::{SeriesMarker, SeriesSummary},
        tag::{NewTag, TagSummary},
        text::{InvalidTextError, PostTitle},
        user::{UserMarker, UserSummary},
    },
    util::excerpt,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const EXCERPT_LEN: usize = 200;
pub const RELATED_POSTS_LIMIT: i64 = 3;
pub const UNTITLED_DRAFT: &str = "Untitled draft";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: PostTitle,
    pub slug: String,
    pub content: String,
    pub author: UserSummary,
    pub category: Option<CategorySummary>,
    pub series: Option<SeriesSummary>,
    pub series_order: Option<i32>,
    pub tags: Vec<TagSummary>,
    pub thumbnail: Option<String>,
    pub published: bool,
    pub is_draft: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub draft_saved_at: Option<OffsetDateTime>,
    pub views: i64,
    #[serde(flatten)]
    pub reactions: ReactionCounts,
    pub comment_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Post {
    /// Published and not a draft.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.published && !self.is_draft
    }

    /// Unpublished posts are only visible to their author.
    #[must_use]
    pub fn is_visible_to(&self, viewer: Option<Id<UserMarker>>) -> bool {
        self.is_public() || viewer == Some(self.author.id)
    }

    #[must_use]
    pub fn is_authored_by(&self, user: Id<UserMarker>) -> bool {
        self.author.id == user
    }

    #[must_use]
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id,
            title: self.title.get().to_owned(),
            slug: self.slug.clone(),
            excerpt: excerpt(&self.content, EXCERPT_LEN),
            author: self.author.clone(),
            category: self.category.clone(),
            tags: self.tags.clone(),
            thumbnail: self.thumbnail.clone(),
            published: self.published,
            views: self.views,
            reactions: self.reactions,
            comment_count: self.comment_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// The shape used in listings.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PostSummary {
    pub id: Id<PostMarker>,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub author: UserSummary,
    pub category: Option<CategorySummary>,
    pub tags: Vec<TagSummary>,
    pub thumbnail: Option<String>,
    pub published: bool,
    pub views: i64,
    #[serde(flatten)]
    pub reactions: ReactionCounts,
    pub comment_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<CommentThread>,
    pub related_posts: Vec<PostSummary>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub title: PostTitle,
    pub content: String,
    pub author: Id<UserMarker>,
    pub category: Option<Id<CategoryMarker>>,
    pub series: Option<Id<SeriesMarker>>,
    pub series_order: Option<i32>,
    pub tags: Vec<NewTag>,
    pub thumbnail: Option<String>,
    pub published: bool,
    pub is_draft: bool,
}

/// Partial post update. `None` leaves a field untouched, the inner `None` of
/// a nested option clears it.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct UpdatePost {
    pub title: Option<PostTitle>,
    pub content: Option<String>,
    pub category: Option<Option<Id<CategoryMarker>>>,
    pub series: Option<Option<Id<SeriesMarker>>>,
    pub series_order: Option<Option<i32>>,
    pub tags: Option<Vec<NewTag>>,
    pub thumbnail: Option<Option<String>>,
    pub published: Option<bool>,
}

impl UpdatePost {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    #[default]
    Recent,
    Likes,
    Views,
    Title,
    /// Reading order within a series.
    Series,
}

/// Which posts a listing draws from before filters apply.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub enum PostScope {
    /// Public posts, plus everything the viewer wrote.
    Listing { viewer: Option<Id<UserMarker>> },
    /// Public posts only.
    #[default]
    Public,
    /// The author's drafts, most recently saved first.
    Drafts { author: Id<UserMarker> },
    /// Posts the user bookmarked, most recently bookmarked first.
    Bookmarks { user: Id<UserMarker> },
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostFilter {
    pub scope: PostScope,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub author: Option<String>,
    pub series: Option<String>,
    pub search: Option<String>,
    pub created_after: Option<OffsetDateTime>,
    pub created_before: Option<OffsetDateTime>,
    pub sort: PostSort,
}

impl PostFilter {
    #[must_use]
    pub fn new(scope: PostScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }
}

/// An autosave request. Without an id a new draft is created.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct DraftSave {
    pub id: Option<Id<PostMarker>>,
    pub author: Id<UserMarker>,
    pub title: PostTitle,
    pub content: String,
    pub category: Option<Id<CategoryMarker>>,
}

/// Autosaved drafts may have no title yet.
pub fn draft_title(title: &str) -> Result<PostTitle, InvalidTextError> {
    if title.trim().is_empty() {
        PostTitle::new(UNTITLED_DRAFT)
    } else {
        PostTitle::new(title)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct DraftSaved {
    pub id: Id<PostMarker>,
    pub slug: String,
    #[serde(with = "time::serde::rfc3339")]
    pub draft_saved_at: OffsetDateTime,
    pub created: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct SiteStats {
    pub post_count: i64,
    pub user_count: i64,
    pub comment_count: i64,
    pub category_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct BookmarkStatus {
    pub saved: bool,
    pub message: &'static str,
}

impl BookmarkStatus {
    #[must_use]
    pub fn new(saved: bool) -> Self {
        let message = if saved {
            "Post saved to bookmarks."
        } else {
            "Post removed from bookmarks."
        };
        Self { saved, message }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        post::{Post, PostSort, UNTITLED_DRAFT, UpdatePost, draft_title},
        reaction::ReactionCounts,
        text::PostTitle,
        user::{UserSummary, Username},
    };
    use time::macros::datetime;

    fn post(published: bool, is_draft: bool) -> Post {
        let created_at = datetime!(2025-04-01 08:00 UTC);
        Post {
            id: Id::from(10),
            title: PostTitle::new("Hello").unwrap(),
            slug: "hello".to_owned(),
            content: "word ".repeat(100),
            author: UserSummary {
                id: Id::from(1),
                username: Username::new("author").unwrap(),
                profile_image: None,
            },
            category: None,
            series: None,
            series_order: None,
            tags: Vec::new(),
            thumbnail: None,
            published,
            is_draft,
            draft_saved_at: None,
            views: 0,
            reactions: ReactionCounts::default(),
            comment_count: 0,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn visibility() {
        let public = post(true, false);
        assert!(public.is_visible_to(None));

        let draft = post(true, true);
        assert!(!draft.is_public());
        assert!(!draft.is_visible_to(None));
        assert!(!draft.is_visible_to(Some(Id::from(2))));
        assert!(draft.is_visible_to(Some(Id::from(1))));

        assert!(!post(false, false).is_visible_to(None));
    }

    #[test]
    fn summary_truncates_content() {
        let summary = post(true, false).summary();
        assert!(summary.excerpt.chars().count() <= super::EXCERPT_LEN + 1);
        assert!(summary.excerpt.ends_with('…'));
    }

    #[test]
    fn blank_draft_titles_get_a_placeholder() {
        assert_eq!(draft_title("  ").unwrap().get(), UNTITLED_DRAFT);
        assert_eq!(draft_title(" Notes ").unwrap().get(), "Notes");
        assert!(draft_title(&"x".repeat(201)).is_err());
    }

    #[test]
    fn sort_parses_lowercase() {
        let sort: PostSort = serde_json::from_str("\"likes\"").unwrap();
        assert_eq!(sort, PostSort::Likes);
        assert_eq!(PostSort::default(), PostSort::Recent);
        assert!(serde_json::from_str::<PostSort>("\"random\"").is_err());
    }

    #[test]
    fn empty_update() {
        assert!(UpdatePost::default().is_empty());
        let update = UpdatePost {
            published: Some(true),
            ..UpdatePost::default()
        };
        assert!(!update.is_empty());
    }
}
