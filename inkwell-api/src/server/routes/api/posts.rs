use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    extract::{Created, Json, Query},
    routes::api::{PageQuery, PostListQuery, double_option, require_owner},
};
use axum::{Router, extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::{
    form::FieldErrors,
    model::{
        Id,
        category::CategoryMarker,
        comment::build_threads,
        page::Page,
        post::{
            BookmarkStatus, CreatePost, DraftSave, DraftSaved, Post, PostDetail, PostFilter,
            PostMarker, PostScope, PostSummary, UpdatePost, draft_title,
        },
        reaction::{ReactionKind, ReactionToggle},
        series::SeriesMarker,
        tag::parse_tag_names,
        text::PostTitle,
        user::UserMarker,
    },
};
use inkwell_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(list_drafts)
        .typed_post(autosave)
        .typed_get(list_bookmarks)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
        .typed_post(increase_view)
        .typed_post(like_post)
        .typed_post(dislike_post)
        .typed_post(bookmark_post)
}

/// The post behind `slug`, as far as `viewer` may see it.
pub(crate) async fn visible_post(
    db: &DbClient,
    slug: &str,
    viewer: Option<Id<UserMarker>>,
) -> Result<Post> {
    db.fetch_post_by_slug(slug)
        .await?
        .filter(|post| post.is_visible_to(viewer))
        .ok_or_else(|| ServerError::PostNotFound(slug.to_owned()))
}

/// Counts a read and assembles everything a detail page shows.
pub(crate) async fn read_post(db: &DbClient, mut post: Post) -> Result<PostDetail> {
    if let Some(views) = db.increase_views(post.id).await? {
        post.views = views;
    }
    let comments = build_threads(db.post_comments(post.id).await?);
    let related_posts = db
        .related_posts(&post)
        .await?
        .iter()
        .map(Post::summary)
        .collect();

    Ok(PostDetail {
        post,
        comments,
        related_posts,
    })
}

/// A series may only be joined by its author's posts.
async fn check_series(
    db: &DbClient,
    errors: &mut FieldErrors,
    series: Option<Id<SeriesMarker>>,
    author: Id<UserMarker>,
) -> Result<()> {
    let Some(series_id) = series else {
        return Ok(());
    };
    match db.fetch_series(series_id).await? {
        None => errors.add("series_id", "Unknown series."),
        Some(series) if series.author.id != author => {
            errors.add("series_id", "You can only add posts to your own series.");
        }
        Some(_) => {}
    }
    Ok(())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts", rejection(ServerError))]
struct PostsPath();

async fn list_posts(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<Page<PostSummary>>> {
    let (filter, page) = query.into_filter(PostScope::Listing {
        viewer: viewer.as_ref().map(AuthenticatedUser::user_id),
    });
    let posts = db.list_posts(&filter, page).await?;

    Ok(Json(posts.map(|post| post.summary())))
}

const fn published_default() -> bool {
    true
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub(crate) struct NewPost {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub category_id: Option<Id<CategoryMarker>>,
    pub series_id: Option<Id<SeriesMarker>>,
    pub series_order: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub thumbnail: Option<String>,
    #[serde(default = "published_default")]
    pub published: bool,
}

/// Validates `new_post` and stores it under a fresh slug.
pub(crate) async fn publish_post(
    db: &DbClient,
    author: Id<UserMarker>,
    new_post: NewPost,
) -> Result<Post> {
    let mut errors = FieldErrors::new();
    let title = errors.check("title", PostTitle::new(new_post.title));
    if new_post.content.trim().is_empty() {
        errors.add("content", "Content may not be blank.");
    }
    let tags = errors.check("tags", parse_tag_names(&new_post.tags));
    check_series(db, &mut errors, new_post.series_id, author).await?;

    let (Some(title), Some(tags)) = (title, tags) else {
        return Err(ServerError::Validation(errors));
    };
    if !errors.is_empty() {
        return Err(ServerError::Validation(errors));
    }

    let post = db
        .create_post(&CreatePost {
            title,
            content: new_post.content,
            author,
            category: new_post.category_id,
            series: new_post.series_id,
            series_order: new_post.series_order,
            tags,
            thumbnail: new_post.thumbnail.filter(|thumbnail| !thumbnail.trim().is_empty()),
            published: new_post.published,
            is_draft: false,
        })
        .await?;

    info!(post = %post.id, slug = post.slug, %author, "Created post");
    Ok(post)
}

async fn create_post(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(new_post): Json<NewPost>,
) -> Result<Created<Post>> {
    Ok(Created(publish_post(&db, user.user_id(), new_post).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/drafts", rejection(ServerError))]
struct DraftsPath();

async fn list_drafts(
    DraftsPath(): DraftsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<Page<PostSummary>>> {
    let filter = PostFilter::new(PostScope::Drafts {
        author: user.user_id(),
    });
    let drafts = db.list_posts(&filter, page).await?;

    Ok(Json(drafts.map(|post| post.summary())))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Autosave {
    id: Option<Id<PostMarker>>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    category_id: Option<Id<CategoryMarker>>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/autosave", rejection(ServerError))]
struct AutosavePath();

async fn autosave(
    AutosavePath(): AutosavePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(autosave): Json<Autosave>,
) -> Result<(StatusCode, Json<DraftSaved>)> {
    if let Some(id) = autosave.id {
        let post = db
            .fetch_post(id)
            .await?
            .ok_or(ServerError::PostByIdNotFound(id))?;
        require_owner(post.author.id, user.user_id(), "You can only save your own drafts.")?;
    }

    let title = draft_title(&autosave.title).map_err(|err| ServerError::field("title", err))?;
    let saved = db
        .save_draft(&DraftSave {
            id: autosave.id,
            author: user.user_id(),
            title,
            content: autosave.content,
            category: autosave.category_id,
        })
        .await?;
    let saved = match (saved, autosave.id) {
        (Some(saved), _) => saved,
        (None, Some(id)) => return Err(ServerError::PostByIdNotFound(id)),
        (None, None) => return Err(ServerError::Forbidden("The draft could not be saved.")),
    };

    let status = if saved.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    info!(post = %saved.id, created = saved.created, "Autosaved draft");
    Ok((status, Json(saved)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/bookmarks", rejection(ServerError))]
struct BookmarksPath();

async fn list_bookmarks(
    BookmarksPath(): BookmarksPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<Page<PostSummary>>> {
    let filter = PostFilter::new(PostScope::Bookmarks {
        user: user.user_id(),
    });
    let bookmarks = db.list_posts(&filter, page).await?;

    Ok(Json(bookmarks.map(|post| post.summary())))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{slug}", rejection(ServerError))]
struct PostPath {
    slug: String,
}

async fn get_post(
    PostPath { slug }: PostPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<Json<PostDetail>> {
    let viewer = viewer.as_ref().map(AuthenticatedUser::user_id);
    let post = visible_post(&db, &slug, viewer).await?;

    Ok(Json(read_post(&db, post).await?))
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub(crate) struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<Id<CategoryMarker>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub series_id: Option<Option<Id<SeriesMarker>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub series_order: Option<Option<i32>>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub thumbnail: Option<Option<String>>,
    pub published: Option<bool>,
}

/// Applies `changes` to a post `user` wrote. The slug never changes.
pub(crate) async fn edit_post(
    db: &DbClient,
    post: Post,
    user: Id<UserMarker>,
    changes: PostChanges,
) -> Result<Post> {
    require_owner(post.author.id, user, "You can only edit your own posts.")?;

    let mut errors = FieldErrors::new();
    let title = errors
        .check("title", changes.title.map(PostTitle::new).transpose())
        .flatten();
    if changes
        .content
        .as_ref()
        .is_some_and(|content| content.trim().is_empty())
    {
        errors.add("content", "Content may not be blank.");
    }
    let tags = errors
        .check(
            "tags",
            changes.tags.as_deref().map(parse_tag_names).transpose(),
        )
        .flatten();
    check_series(db, &mut errors, changes.series_id.flatten(), user).await?;
    if !errors.is_empty() {
        return Err(ServerError::Validation(errors));
    }

    let update = UpdatePost {
        title,
        content: changes.content,
        category: changes.category_id,
        series: changes.series_id,
        series_order: changes.series_order,
        tags,
        thumbnail: changes
            .thumbnail
            .map(|thumbnail| thumbnail.filter(|thumbnail| !thumbnail.trim().is_empty())),
        published: changes.published,
    };
    if update.is_empty() {
        return Ok(post);
    }

    let updated = db
        .update_post(post.id, &update)
        .await?
        .ok_or(ServerError::PostNotFound(post.slug))?;

    info!(post = %updated.id, "Updated post");
    Ok(updated)
}

async fn update_post(
    PostPath { slug }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(changes): Json<PostChanges>,
) -> Result<Json<Post>> {
    let post = visible_post(&db, &slug, Some(user.user_id())).await?;

    Ok(Json(edit_post(&db, post, user.user_id(), changes).await?))
}

pub(crate) async fn remove_post(db: &DbClient, post: &Post, user: Id<UserMarker>) -> Result<()> {
    require_owner(post.author.id, user, "You can only delete your own posts.")?;
    if !db.delete_post(post.id).await? {
        return Err(ServerError::PostNotFound(post.slug.clone()));
    }

    info!(post = %post.id, "Deleted post");
    Ok(())
}

async fn delete_post(
    PostPath { slug }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    let post = visible_post(&db, &slug, Some(user.user_id())).await?;
    remove_post(&db, &post, user.user_id()).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{slug}/increase_view", rejection(ServerError))]
struct IncreaseViewPath {
    slug: String,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct Views {
    views: i64,
}

async fn increase_view(
    IncreaseViewPath { slug }: IncreaseViewPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<Json<Views>> {
    let viewer = viewer.as_ref().map(AuthenticatedUser::user_id);
    let post = visible_post(&db, &slug, viewer).await?;
    let views = db
        .increase_views(post.id)
        .await?
        .ok_or(ServerError::PostNotFound(slug))?;

    Ok(Json(Views { views }))
}

pub(crate) async fn react_to_post(
    db: &DbClient,
    slug: &str,
    user: Id<UserMarker>,
    kind: ReactionKind,
) -> Result<ReactionToggle> {
    let post = visible_post(db, slug, Some(user)).await?;
    let toggle = db.toggle_post_reaction(&post, user, kind).await?;

    info!(post = %post.id, %user, %kind, "Toggled post reaction");
    Ok(toggle)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{slug}/like", rejection(ServerError))]
struct LikePostPath {
    slug: String,
}

async fn like_post(
    LikePostPath { slug }: LikePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<ReactionToggle>> {
    Ok(Json(react_to_post(&db, &slug, user.user_id(), ReactionKind::Like).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{slug}/dislike", rejection(ServerError))]
struct DislikePostPath {
    slug: String,
}

async fn dislike_post(
    DislikePostPath { slug }: DislikePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<ReactionToggle>> {
    Ok(Json(react_to_post(&db, &slug, user.user_id(), ReactionKind::Dislike).await?))
}

pub(crate) async fn toggle_bookmark(
    db: &DbClient,
    slug: &str,
    user: Id<UserMarker>,
) -> Result<BookmarkStatus> {
    let post = visible_post(db, slug, Some(user)).await?;
    let saved = db.toggle_bookmark(user, post.id).await?;

    info!(post = %post.id, %user, saved, "Toggled bookmark");
    Ok(BookmarkStatus::new(saved))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{slug}/bookmark", rejection(ServerError))]
struct BookmarkPath {
    slug: String,
}

async fn bookmark_post(
    BookmarkPath { slug }: BookmarkPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<BookmarkStatus>> {
    Ok(Json(toggle_bookmark(&db, &slug, user.user_id()).await?))
}
