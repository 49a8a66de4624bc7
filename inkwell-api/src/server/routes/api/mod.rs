//! The JSON API under `/api`.

use crate::server::{Result, ServerError, ServerRouter};
use axum::Router;
use inkwell_common::model::{
    Id,
    page::PageRequest,
    post::{PostFilter, PostScope, PostSort},
    user::UserMarker,
};
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

pub(crate) mod auth;
pub(crate) mod comments;
mod notifications;
pub(crate) mod posts;
pub(crate) mod taxonomy;
pub(crate) mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(taxonomy::routes())
        .merge(notifications::routes())
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub(crate) struct PageQuery {
    #[serde(default)]
    pub page: PageRequest,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub(crate) struct MessageResponse {
    pub message: &'static str,
}

/// Query parameters shared by every post listing.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub(crate) struct PostListQuery {
    #[serde(default)]
    pub page: PageRequest,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub author: Option<String>,
    pub series: Option<String>,
    pub search: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_after: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_before: Option<OffsetDateTime>,
    #[serde(default)]
    pub sort: PostSort,
}

impl PostListQuery {
    /// Empty form fields count as absent.
    pub fn into_filter(self, scope: PostScope) -> (PostFilter, PageRequest) {
        let filter = PostFilter {
            scope,
            category: non_empty(self.category),
            tag: non_empty(self.tag),
            author: non_empty(self.author),
            series: non_empty(self.series),
            search: non_empty(self.search),
            created_after: self.created_after,
            created_before: self.created_before,
            sort: self.sort,
        };
        (filter, self.page)
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Tells an explicit `null` (`Some(None)`) apart from a missing field (`None`).
/// Use together with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn require_owner(
    owner: Id<UserMarker>,
    user: Id<UserMarker>,
    message: &'static str,
) -> Result<()> {
    if owner == user {
        Ok(())
    } else {
        Err(ServerError::Forbidden(message))
    }
}

#[cfg(test)]
mod tests {
    use crate::server::routes::api::{PostListQuery, double_option};
    use inkwell_common::model::post::{PostScope, PostSort};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        thumbnail: Option<Option<String>>,
    }

    #[test]
    fn double_option_distinguishes_null_from_missing() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.thumbnail, None);
        let null: Patch = serde_json::from_str(r#"{"thumbnail": null}"#).unwrap();
        assert_eq!(null.thumbnail, Some(None));
        let set: Patch = serde_json::from_str(r#"{"thumbnail": "a.png"}"#).unwrap();
        assert_eq!(set.thumbnail, Some(Some("a.png".to_owned())));
    }

    #[test]
    fn blank_filters_are_dropped() {
        let query = PostListQuery {
            category: Some(String::new()),
            search: Some("  ".to_owned()),
            tag: Some("rust".to_owned()),
            sort: PostSort::Views,
            ..PostListQuery::default()
        };
        let (filter, page) = query.into_filter(PostScope::Public);
        assert_eq!(filter.category, None);
        assert_eq!(filter.search, None);
        assert_eq!(filter.tag.as_deref(), Some("rust"));
        assert_eq!(filter.sort, PostSort::Views);
        assert_eq!(page.number(), 1);
    }
}
