use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    extract::{Created, Json, Query},
    routes::api::{non_empty, posts::visible_post, require_owner},
};
use axum::{Router, extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::model::{
    Id,
    comment::{
        Comment, CommentFilter, CommentMarker, CommentThread, CreateComment, build_threads,
        resolve_parent,
    },
    page::{Page, PageRequest},
    post::{Post, PostMarker},
    reaction::{ReactionKind, ReactionToggle},
    text::CommentContent,
    user::UserMarker,
};
use inkwell_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(get_post_comments)
        .typed_post(create_post_comment)
        .typed_get(list_comments)
        .typed_get(get_comment)
        .typed_put(update_comment)
        .typed_delete(delete_comment)
        .typed_post(like_comment)
        .typed_post(dislike_comment)
}

/// Adds a comment to `post`, attaching replies to replies to their thread root.
pub(crate) async fn add_comment(
    db: &DbClient,
    post: &Post,
    author: Id<UserMarker>,
    content: &str,
    parent: Option<Id<CommentMarker>>,
) -> Result<Comment> {
    let content = CommentContent::new(content).map_err(|err| ServerError::field("content", err))?;

    let (parent, parent_author) = match parent {
        None => (None, None),
        Some(parent_id) => {
            let parent = db
                .fetch_comment(parent_id)
                .await?
                .filter(|parent| parent.post == post.id && parent.is_active)
                .ok_or_else(|| {
                    ServerError::field("parent", "The parent comment must be an active comment on the same post.")
                })?;
            (Some(resolve_parent(&parent)), Some(parent.author.id))
        }
    };

    let comment = db
        .create_comment(
            &CreateComment {
                post: post.id,
                author,
                parent,
                content,
            },
            post.author.id,
            parent_author,
        )
        .await?;

    info!(comment = %comment.id, post = %post.id, %author, "Created comment");
    Ok(comment)
}

/// An active comment the caller wrote.
pub(crate) async fn owned_comment(
    db: &DbClient,
    id: Id<CommentMarker>,
    user: Id<UserMarker>,
    action: &'static str,
) -> Result<Comment> {
    let comment = db
        .fetch_comment(id)
        .await?
        .filter(|comment| comment.is_active)
        .ok_or(ServerError::CommentNotFound(id))?;
    require_owner(comment.author.id, user, action)?;
    Ok(comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{slug}/comments", rejection(ServerError))]
struct PostCommentsPath {
    slug: String,
}

async fn get_post_comments(
    PostCommentsPath { slug }: PostCommentsPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<Json<Vec<CommentThread>>> {
    let viewer = viewer.as_ref().map(AuthenticatedUser::user_id);
    let post = visible_post(&db, &slug, viewer).await?;
    let threads = build_threads(db.post_comments(post.id).await?);

    Ok(Json(threads))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct NewComment {
    #[serde(default)]
    content: String,
    parent: Option<Id<CommentMarker>>,
}

async fn create_post_comment(
    PostCommentsPath { slug }: PostCommentsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(new_comment): Json<NewComment>,
) -> Result<Created<Comment>> {
    let post = visible_post(&db, &slug, Some(user.user_id())).await?;
    let comment = add_comment(
        &db,
        &post,
        user.user_id(),
        &new_comment.content,
        new_comment.parent,
    )
    .await?;

    Ok(Created(comment))
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct CommentListQuery {
    post: Option<Id<PostMarker>>,
    author: Option<String>,
    #[serde(default)]
    page: PageRequest,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/comments", rejection(ServerError))]
struct CommentsPath();

async fn list_comments(
    CommentsPath(): CommentsPath,
    State(db): State<Arc<DbClient>>,
    Query(query): Query<CommentListQuery>,
) -> Result<Json<Page<Comment>>> {
    let filter = CommentFilter {
        post: query.post,
        author: non_empty(query.author),
    };
    let comments = db.list_comments(&filter, query.page).await?;

    Ok(Json(comments))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/comments/{id}", rejection(ServerError))]
struct CommentPath {
    id: Id<CommentMarker>,
}

async fn get_comment(
    CommentPath { id }: CommentPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Comment>> {
    let comment = db
        .fetch_comment(id)
        .await?
        .filter(|comment| comment.is_active)
        .ok_or(ServerError::CommentNotFound(id))?;

    Ok(Json(comment))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct CommentChanges {
    #[serde(default)]
    content: String,
}

async fn update_comment(
    CommentPath { id }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(changes): Json<CommentChanges>,
) -> Result<Json<Comment>> {
    owned_comment(&db, id, user.user_id(), "You can only edit your own comments.").await?;
    let content =
        CommentContent::new(changes.content).map_err(|err| ServerError::field("content", err))?;

    let comment = db
        .update_comment(id, &content)
        .await?
        .ok_or(ServerError::CommentNotFound(id))?;

    Ok(Json(comment))
}

async fn delete_comment(
    CommentPath { id }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    owned_comment(&db, id, user.user_id(), "You can only delete your own comments.").await?;
    db.soft_delete_comment(id).await?;

    info!(comment = %id, "Deleted comment");
    Ok(StatusCode::NO_CONTENT)
}

/// Toggles `kind` on an active comment. Returns the comment with the toggle.
pub(crate) async fn react_to_comment(
    db: &DbClient,
    id: Id<CommentMarker>,
    user: Id<UserMarker>,
    kind: ReactionKind,
) -> Result<(Comment, ReactionToggle)> {
    let comment = db
        .fetch_comment(id)
        .await?
        .filter(|comment| comment.is_active)
        .ok_or(ServerError::CommentNotFound(id))?;
    let toggle = db.toggle_comment_reaction(&comment, user, kind).await?;

    info!(comment = %id, %user, %kind, "Toggled comment reaction");
    Ok((comment, toggle))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/comments/{id}/like", rejection(ServerError))]
struct LikeCommentPath {
    id: Id<CommentMarker>,
}

async fn like_comment(
    LikeCommentPath { id }: LikeCommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<ReactionToggle>> {
    let (_, toggle) = react_to_comment(&db, id, user.user_id(), ReactionKind::Like).await?;

    Ok(Json(toggle))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/comments/{id}/dislike", rejection(ServerError))]
struct DislikeCommentPath {
    id: Id<CommentMarker>,
}

async fn dislike_comment(
    DislikeCommentPath { id }: DislikeCommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<ReactionToggle>> {
    let (_, toggle) = react_to_comment(&db, id, user.user_id(), ReactionKind::Dislike).await?;

    Ok(Json(toggle))
}
