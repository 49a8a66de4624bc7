use crate::model::{Id, text::CategoryName};
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CategoryMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Category {
    pub id: Id<CategoryMarker>,
    pub name: CategoryName,
    pub slug: String,
    pub description: String,
    /// Published posts only.
    pub post_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct CategorySummary {
    pub id: Id<CategoryMarker>,
    pub name: String,
    pub slug: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateCategory {
    pub name: CategoryName,
    pub slug: String,
    pub description: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct UpdateCategory {
    pub name: Option<CategoryName>,
    pub description: Option<String>,
}
