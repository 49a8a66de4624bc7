use crate::model::{
    Id,
    text::SeriesTitle,
    user::{UserMarker, UserSummary},
};
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct SeriesMarker;

/// An ordered run of posts by a single author.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Series {
    pub id: Id<SeriesMarker>,
    pub title: SeriesTitle,
    pub slug: String,
    pub description: String,
    pub author: UserSummary,
    pub post_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct SeriesSummary {
    pub id: Id<SeriesMarker>,
    pub title: String,
    pub slug: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateSeries {
    pub title: SeriesTitle,
    pub description: String,
    pub author: Id<UserMarker>,
}
