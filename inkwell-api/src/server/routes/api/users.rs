use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    extract::{Json, Query},
    routes::api::{PageQuery, double_option, require_owner},
};
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::{
    form::{FieldErrors, NON_FIELD_ERRORS},
    model::{
        Id,
        notification::FollowStatus,
        page::Page,
        post::{PostFilter, PostScope, PostSummary},
        text::{Bio, PersonName},
        user::{Email, UpdateProfile, User, UserMarker, UserProfile, UserSummary},
    },
};
use inkwell_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(list_users)
        .typed_get(get_user)
        .typed_put(update_user)
        .typed_get(get_user_posts)
        .typed_post(follow_user)
        .typed_get(get_followers)
        .typed_get(get_following)
}

pub(crate) async fn user_by_username(db: &DbClient, username: &str) -> Result<User> {
    db.fetch_user_by_username(username)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ServerError::UserNotFound(username.to_owned()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/users", rejection(ServerError))]
struct ListUsersPath();

async fn list_users(
    ListUsersPath(): ListUsersPath,
    State(db): State<Arc<DbClient>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<Page<User>>> {
    let users = db.list_users(page).await?;

    Ok(Json(users))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/users/{username}", rejection(ServerError))]
struct UserPath {
    username: String,
}

async fn get_user(
    UserPath { username }: UserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<UserProfile>> {
    let profile = db
        .fetch_profile(&username)
        .await?
        .ok_or(ServerError::UserNotFound(username))?;

    Ok(Json(profile))
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub(crate) struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub profile_image: Option<Option<String>>,
    pub bio: Option<String>,
}

/// Validates and applies `update` to the profile of `target`, which must be `user`.
pub(crate) async fn edit_profile(
    db: &DbClient,
    target: &User,
    user: Id<UserMarker>,
    update: ProfileUpdate,
) -> Result<User> {
    require_owner(target.id, user, "You can only edit your own profile.")?;

    let mut errors = FieldErrors::new();
    let first_name = errors
        .check("first_name", update.first_name.map(PersonName::new).transpose())
        .flatten();
    let last_name = errors
        .check("last_name", update.last_name.map(PersonName::new).transpose())
        .flatten();
    let email = errors
        .check("email", update.email.as_deref().map(str::trim).map(Email::new).transpose())
        .flatten();
    let bio = errors
        .check("bio", update.bio.map(Bio::new).transpose())
        .flatten();
    if let Some(email) = &email
        && db.email_exists(email.get(), Some(target.id)).await?
    {
        errors.add("email", "A user with that email already exists.");
    }
    if !errors.is_empty() {
        return Err(ServerError::Validation(errors));
    }

    let profile_image = update
        .profile_image
        .map(|image| image.filter(|image| !image.trim().is_empty()));
    let updated = db
        .update_profile(
            target.id,
            &UpdateProfile {
                first_name,
                last_name,
                email,
                profile_image,
                bio,
            },
        )
        .await?
        .ok_or_else(|| ServerError::UserNotFound(target.username.get().to_owned()))?;

    info!(user = %updated.id, "Updated profile");
    Ok(updated)
}

async fn update_user(
    UserPath { username }: UserPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    let target = user_by_username(&db, &username).await?;

    Ok(Json(edit_profile(&db, &target, user.user_id(), update).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/users/{username}/posts", rejection(ServerError))]
struct UserPostsPath {
    username: String,
}

async fn get_user_posts(
    UserPostsPath { username }: UserPostsPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<Page<PostSummary>>> {
    let author = user_by_username(&db, &username).await?;
    let filter = PostFilter {
        author: Some(author.username.into_inner()),
        ..PostFilter::new(PostScope::Listing {
            viewer: viewer.as_ref().map(AuthenticatedUser::user_id),
        })
    };

    let posts = db.list_posts(&filter, page).await?;

    Ok(Json(posts.map(|post| post.summary())))
}

pub(crate) async fn toggle_follow(
    db: &DbClient,
    follower: Id<UserMarker>,
    target: &User,
) -> Result<FollowStatus> {
    if target.id == follower {
        return Err(ServerError::field(NON_FIELD_ERRORS, "You cannot follow yourself."));
    }

    let status = db.toggle_follow(follower, target.id).await?;

    info!(%follower, following = %target.id, now_following = status.following, "Toggled follow");
    Ok(status)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/users/{username}/follow", rejection(ServerError))]
struct FollowPath {
    username: String,
}

async fn follow_user(
    FollowPath { username }: FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<FollowStatus>> {
    let target = user_by_username(&db, &username).await?;

    Ok(Json(toggle_follow(&db, user.user_id(), &target).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/users/{username}/followers", rejection(ServerError))]
struct FollowersPath {
    username: String,
}

async fn get_followers(
    FollowersPath { username }: FollowersPath,
    State(db): State<Arc<DbClient>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<Page<UserSummary>>> {
    let user = user_by_username(&db, &username).await?;
    let followers = db.list_followers(user.id, page).await?;

    Ok(Json(followers))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/users/{username}/following", rejection(ServerError))]
struct FollowingPath {
    username: String,
}

async fn get_following(
    FollowingPath { username }: FollowingPath,
    State(db): State<Arc<DbClient>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<Page<UserSummary>>> {
    let user = user_by_username(&db, &username).await?;
    let following = db.list_following(user.id, page).await?;

    Ok(Json(following))
}
