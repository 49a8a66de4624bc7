use inkwell_common::{
    model::{
        Id, ModelValidationError,
        auth::Session,
        category::{Category, CategorySummary},
        comment::Comment,
        notification::{Notification, NotificationKind},
        post::Post,
        reaction::ReactionCounts,
        series::{Series, SeriesSummary},
        tag::{Tag, TagSummary},
        text::{Bio, CategoryName, PersonName, PostTitle, SeriesTitle, TagName},
        user::{Email, User, UserProfile, UserSummary, Username},
    },
    password::PasswordHash,
    util::PositiveDuration,
};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: Option<String>,
    pub bio: String,
    pub email_verified: bool,
    pub is_active: bool,
    pub date_joined: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    #[sqlx(flatten)]
    pub user: UserRecord,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserProfileRecord {
    #[sqlx(flatten)]
    pub user: UserRecord,
    pub post_count: i64,
    pub comment_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}

/// The `(id, username, profile_image)` triple used in embedded user summaries.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserSummaryRecord {
    pub user_snowflake: i64,
    pub username: String,
    pub profile_image: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub author_snowflake: i64,
    pub author_username: String,
    pub author_profile_image: Option<String>,
    pub category_snowflake: Option<i64>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub series_snowflake: Option<i64>,
    pub series_title: Option<String>,
    pub series_slug: Option<String>,
    pub series_order: Option<i32>,
    pub thumbnail: Option<String>,
    pub published: bool,
    pub is_draft: bool,
    pub draft_saved_at: Option<OffsetDateTime>,
    pub views: i64,
    pub likes_count: i64,
    pub dislikes_count: i64,
    pub comment_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostTagRecord {
    pub post_snowflake: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub author_snowflake: i64,
    pub author_username: String,
    pub author_profile_image: Option<String>,
    pub parent_snowflake: Option<i64>,
    pub content: String,
    pub is_active: bool,
    pub likes_count: i64,
    pub dislikes_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CategoryRecord {
    pub category_snowflake: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub post_count: i64,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct TagRecord {
    pub tag_snowflake: i64,
    pub name: String,
    pub slug: String,
    pub post_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct SeriesRecord {
    pub series_snowflake: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub author_snowflake: i64,
    pub author_username: String,
    pub author_profile_image: Option<String>,
    pub post_count: i64,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct NotificationRecord {
    pub notification_snowflake: i64,
    pub sender_snowflake: i64,
    pub sender_username: String,
    pub sender_profile_image: Option<String>,
    pub kind: String,
    pub post_snowflake: Option<i64>,
    pub post_slug: Option<String>,
    pub comment_snowflake: Option<i64>,
    pub is_read: bool,
    pub created_at: OffsetDateTime,
}

fn user_summary(
    id: i64,
    username: String,
    profile_image: Option<String>,
) -> Result<UserSummary, ModelValidationError> {
    Ok(UserSummary {
        id: Id::from_db(id),
        username: Username::new(username)?,
        profile_image,
    })
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_snowflake),
            username: Username::new(value.username)?,
            email: Email::new(&value.email)?,
            first_name: PersonName::new(value.first_name)?,
            last_name: PersonName::new(value.last_name)?,
            profile_image: value.profile_image,
            bio: Bio::new(value.bio)?,
            email_verified: value.email_verified,
            is_active: value.is_active,
            date_joined: value.date_joined,
        })
    }
}

impl TryFrom<CredentialsRecord> for (User, PasswordHash) {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        let password_hash = PasswordHash::from_stored(value.password_hash)?;
        Ok((value.user.try_into()?, password_hash))
    }
}

impl TryFrom<UserProfileRecord> for UserProfile {
    type Error = ModelValidationError;

    fn try_from(value: UserProfileRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user.try_into()?,
            post_count: value.post_count,
            comment_count: value.comment_count,
            followers_count: value.followers_count,
            following_count: value.following_count,
        })
    }
}

impl TryFrom<UserSummaryRecord> for UserSummary {
    type Error = ModelValidationError;

    fn try_from(value: UserSummaryRecord) -> Result<Self, Self::Error> {
        user_summary(value.user_snowflake, value.username, value.profile_image)
    }
}

impl TryFrom<AuthenticationRecord> for Session {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_snowflake),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at,
            expires_after: value
                .expires_after_seconds
                .map(|seconds| PositiveDuration::try_from(Duration::seconds(seconds)))
                .transpose()?,
        })
    }
}

impl PostRecord {
    /// Tags live in their own table and are fetched separately.
    pub fn into_post(self, tags: Vec<TagSummary>) -> Result<Post, ModelValidationError> {
        let category = match (self.category_snowflake, self.category_name, self.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(CategorySummary {
                id: Id::from_db(id),
                name,
                slug,
            }),
            _ => None,
        };
        let series = match (self.series_snowflake, self.series_title, self.series_slug) {
            (Some(id), Some(title), Some(slug)) => Some(SeriesSummary {
                id: Id::from_db(id),
                title,
                slug,
            }),
            _ => None,
        };

        Ok(Post {
            id: Id::from_db(self.post_snowflake),
            title: PostTitle::new(self.title)?,
            slug: self.slug,
            content: self.content,
            author: user_summary(
                self.author_snowflake,
                self.author_username,
                self.author_profile_image,
            )?,
            category,
            series,
            series_order: self.series_order,
            tags,
            thumbnail: self.thumbnail,
            published: self.published,
            is_draft: self.is_draft,
            draft_saved_at: self.draft_saved_at,
            views: self.views,
            reactions: ReactionCounts {
                likes_count: self.likes_count,
                dislikes_count: self.dislikes_count,
            },
            comment_count: self.comment_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl From<PostTagRecord> for TagSummary {
    fn from(value: PostTagRecord) -> Self {
        Self {
            name: value.name,
            slug: value.slug,
        }
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.comment_snowflake),
            post: Id::from_db(value.post_snowflake),
            author: user_summary(
                value.author_snowflake,
                value.author_username,
                value.author_profile_image,
            )?,
            parent: value.parent_snowflake.map(Id::from_db),
            content: value.content,
            is_active: value.is_active,
            reactions: ReactionCounts {
                likes_count: value.likes_count,
                dislikes_count: value.dislikes_count,
            },
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl TryFrom<CategoryRecord> for Category {
    type Error = ModelValidationError;

    fn try_from(value: CategoryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.category_snowflake),
            name: CategoryName::new(value.name)?,
            slug: value.slug,
            description: value.description,
            post_count: value.post_count,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<TagRecord> for Tag {
    type Error = ModelValidationError;

    fn try_from(value: TagRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.tag_snowflake),
            name: TagName::new(value.name)?,
            slug: value.slug,
            post_count: value.post_count,
        })
    }
}

impl TryFrom<SeriesRecord> for Series {
    type Error = ModelValidationError;

    fn try_from(value: SeriesRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.series_snowflake),
            title: SeriesTitle::new(value.title)?,
            slug: value.slug,
            description: value.description,
            author: user_summary(
                value.author_snowflake,
                value.author_username,
                value.author_profile_image,
            )?,
            post_count: value.post_count,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<NotificationRecord> for Notification {
    type Error = ModelValidationError;

    fn try_from(value: NotificationRecord) -> Result<Self, Self::Error> {
        let kind: NotificationKind = value.kind.parse()?;
        Ok(Self {
            id: Id::from_db(value.notification_snowflake),
            sender: user_summary(
                value.sender_snowflake,
                value.sender_username,
                value.sender_profile_image,
            )?,
            kind,
            message: kind.message(),
            post: value.post_snowflake.map(Id::from_db),
            post_slug: value.post_slug,
            comment: value.comment_snowflake.map(Id::from_db),
            is_read: value.is_read,
            created_at: value.created_at,
        })
    }
}
