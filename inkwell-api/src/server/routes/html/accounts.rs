use crate::server::{
    ServerError, ServerRouter, Settings,
    auth::{Viewer, issue_session},
    extract::{Form, Query},
    routes::{
        api::{
            PageQuery,
            auth::{Credentials, Registration, authenticate, register_user},
            users::{ProfileUpdate, edit_profile, toggle_follow, user_by_username},
        },
        html::{
            Flash, HtmlResult, clear_session, login_required, redirect_with_flash, render,
            session_cookie,
        },
    },
};
use axum::{Router, extract::State, response::Response};
use axum_extra::{
    extract::CookieJar,
    routing::{RouterExt, TypedPath},
};
use inkwell_common::{
    form::FieldErrors,
    model::{
        Id,
        notification::NotificationMarker,
        page::Page,
        post::{PostFilter, PostScope},
        user::{User, UserSummary},
    },
};
use inkwell_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tera::{Context, Tera};
use tracing::info;

pub const PROFILE_LATEST_POSTS: i64 = 10;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(register_page)
        .typed_post(register)
        .typed_get(login_page)
        .typed_post(login)
        .typed_post(logout)
        .typed_get(profile)
        .typed_get(edit_profile_page)
        .typed_post(update_profile)
        .typed_post(follow)
        .typed_get(followers)
        .typed_get(following)
        .typed_get(notifications)
        .typed_post(read_all_notifications)
        .typed_post(read_notification)
        .typed_post(delete_notification)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/register", rejection(ServerError))]
struct RegisterPath();

async fn register_page(
    RegisterPath(): RegisterPath,
    State(templates): State<Arc<Tera>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    render(&templates, jar, viewer.user(), "register.html", Context::new())
}

async fn register(
    RegisterPath(): RegisterPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    jar: CookieJar,
    Form(registration): Form<Registration>,
) -> HtmlResult<Response> {
    let user = match register_user(&db, &registration).await {
        Ok(user) => user,
        Err(err @ ServerError::Validation(_)) => {
            return Ok(redirect_with_flash(
                jar,
                &settings,
                "/accounts/register",
                &Flash::from_error(&err),
            ));
        }
        Err(err) => return Err(err.into()),
    };
    let token = issue_session(&db, &settings, user.id).await?;

    let jar = jar.add(session_cookie(token.as_token_str(), &settings));
    let flash = Flash::success(format!("Welcome, {}! Your account was created.", user.username.get()));
    Ok(redirect_with_flash(jar, &settings, "/", &flash))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/login", rejection(ServerError))]
struct LoginPath();

async fn login_page(
    LoginPath(): LoginPath,
    State(templates): State<Arc<Tera>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    render(&templates, jar, viewer.user(), "login.html", Context::new())
}

async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    jar: CookieJar,
    Form(credentials): Form<Credentials>,
) -> HtmlResult<Response> {
    let user = match authenticate(&db, &credentials).await {
        Ok(user) => user,
        Err(err @ ServerError::Validation(_)) => {
            return Ok(redirect_with_flash(
                jar,
                &settings,
                "/accounts/login",
                &Flash::from_error(&err),
            ));
        }
        Err(err) => return Err(err.into()),
    };
    let token = issue_session(&db, &settings, user.id).await?;

    info!(user = %user.id, "Logged in through the site");
    let jar = jar.add(session_cookie(token.as_token_str(), &settings));
    let flash = Flash::success(format!("Welcome back, {}!", user.username.get()));
    Ok(redirect_with_flash(jar, &settings, "/", &flash))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    if let Some(session) = &viewer.0 {
        db.delete_session(&session.token_hash).await?;
        info!(user = %session.user.id, "Logged out through the site");
    }

    let flash = Flash::success("You have been logged out.");
    Ok(redirect_with_flash(clear_session(jar), &settings, "/", &flash))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/profile/{username}", rejection(ServerError))]
struct ProfilePath {
    username: String,
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let profile = db
        .fetch_profile(&username)
        .await?
        .ok_or(ServerError::UserNotFound(username))?;
    let filter = PostFilter {
        author: Some(profile.user.username.get().to_owned()),
        ..PostFilter::new(PostScope::Public)
    };
    let posts = db.latest_posts(&filter, PROFILE_LATEST_POSTS).await?;
    let is_following = match viewer.user_id() {
        Some(viewer) if viewer != profile.user.id => db.is_following(viewer, profile.user.id).await?,
        _ => false,
    };

    let mut context = Context::new();
    context.insert("full_name", &profile.user.full_name());
    context.insert("profile", &profile);
    context.insert(
        "posts",
        &posts.iter().map(|post| post.summary()).collect::<Vec<_>>(),
    );
    context.insert("is_following", &is_following);
    render(&templates, jar, viewer.user(), "profile.html", context)
}

/// The profile editor's fields. Every field is submitted, so every field is replaced.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
pub(crate) struct ProfileForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub profile_image: String,
    #[serde(default)]
    pub bio: String,
}

impl ProfileForm {
    fn from_user(user: &User) -> Self {
        Self {
            first_name: user.first_name.get().to_owned(),
            last_name: user.last_name.get().to_owned(),
            email: user.email.get().to_owned(),
            profile_image: user.profile_image.clone().unwrap_or_default(),
            bio: user.bio.get().to_owned(),
        }
    }

    fn to_update(&self) -> ProfileUpdate {
        ProfileUpdate {
            first_name: Some(self.first_name.clone()),
            last_name: Some(self.last_name.clone()),
            email: Some(self.email.clone()),
            profile_image: Some(Some(self.profile_image.clone())),
            bio: Some(self.bio.clone()),
        }
    }
}

fn profile_edit_page(
    templates: &Tera,
    jar: CookieJar,
    viewer: &Viewer,
    username: &str,
    form: &ProfileForm,
    errors: Option<&FieldErrors>,
) -> HtmlResult<Response> {
    let mut context = Context::new();
    context.insert("username", username);
    context.insert("form", form);
    context.insert("errors", &errors.map(FieldErrors::lines).unwrap_or_default());
    render(templates, jar, viewer.user(), "profile_edit.html", context)
}

/// The profile behind `username`, or a redirect for anyone but its owner.
async fn owned_profile(
    db: &DbClient,
    settings: &Settings,
    viewer: &Viewer,
    jar: CookieJar,
    username: &str,
) -> HtmlResult<Result<(User, CookieJar), Response>> {
    let Some(user) = viewer.user_id() else {
        return Ok(Err(login_required(jar, settings)));
    };
    let target = user_by_username(db, username).await?;
    if target.id != user {
        let flash = Flash::error("You can only edit your own profile.");
        let location = format!("/accounts/profile/{}", target.username.get());
        return Ok(Err(redirect_with_flash(jar, settings, &location, &flash)));
    }
    Ok(Ok((target, jar)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/profile/{username}/edit", rejection(ServerError))]
struct EditProfilePath {
    username: String,
}

async fn edit_profile_page(
    EditProfilePath { username }: EditProfilePath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let (target, jar) = match owned_profile(&db, &settings, &viewer, jar, &username).await? {
        Ok(found) => found,
        Err(redirect) => return Ok(redirect),
    };

    let form = ProfileForm::from_user(&target);
    profile_edit_page(&templates, jar, &viewer, target.username.get(), &form, None)
}

async fn update_profile(
    EditProfilePath { username }: EditProfilePath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<ProfileForm>,
) -> HtmlResult<Response> {
    let (target, jar) = match owned_profile(&db, &settings, &viewer, jar, &username).await? {
        Ok(found) => found,
        Err(redirect) => return Ok(redirect),
    };

    match edit_profile(&db, &target, target.id, form.to_update()).await {
        Ok(updated) => {
            let flash = Flash::success("Your profile was updated.");
            let location = format!("/accounts/profile/{}", updated.username.get());
            Ok(redirect_with_flash(jar, &settings, &location, &flash))
        }
        Err(ServerError::Validation(errors)) => {
            profile_edit_page(&templates, jar, &viewer, target.username.get(), &form, Some(&errors))
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/profile/{username}/follow", rejection(ServerError))]
struct FollowPath {
    username: String,
}

async fn follow(
    FollowPath { username }: FollowPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let Some(user) = viewer.user_id() else {
        return Ok(login_required(jar, &settings));
    };
    let target = user_by_username(&db, &username).await?;
    let location = format!("/accounts/profile/{}", target.username.get());

    let flash = match toggle_follow(&db, user, &target).await {
        Ok(status) if status.following => {
            Flash::success(format!("You are now following {}.", target.username.get()))
        }
        Ok(_) => Flash::success(format!("You unfollowed {}.", target.username.get())),
        Err(err @ ServerError::Validation(_)) => Flash::from_error(&err),
        Err(err) => return Err(err.into()),
    };
    Ok(redirect_with_flash(jar, &settings, &location, &flash))
}

fn render_user_list(
    templates: &Tera,
    jar: CookieJar,
    viewer: &Viewer,
    heading: String,
    target: &User,
    users: &Page<UserSummary>,
) -> HtmlResult<Response> {
    let mut context = Context::new();
    context.insert("heading", &heading);
    context.insert("username", target.username.get());
    context.insert("users", users);
    render(templates, jar, viewer.user(), "user_list.html", context)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/profile/{username}/followers", rejection(ServerError))]
struct FollowersPath {
    username: String,
}

async fn followers(
    FollowersPath { username }: FollowersPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    viewer: Viewer,
    jar: CookieJar,
    Query(PageQuery { page }): Query<PageQuery>,
) -> HtmlResult<Response> {
    let target = user_by_username(&db, &username).await?;
    let users = db.list_followers(target.id, page).await?;

    let heading = format!("Followers of {}", target.username.get());
    render_user_list(&templates, jar, &viewer, heading, &target, &users)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/profile/{username}/following", rejection(ServerError))]
struct FollowingPath {
    username: String,
}

async fn following(
    FollowingPath { username }: FollowingPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    viewer: Viewer,
    jar: CookieJar,
    Query(PageQuery { page }): Query<PageQuery>,
) -> HtmlResult<Response> {
    let target = user_by_username(&db, &username).await?;
    let users = db.list_following(target.id, page).await?;

    let heading = format!("{} follows", target.username.get());
    render_user_list(&templates, jar, &viewer, heading, &target, &users)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/notifications", rejection(ServerError))]
struct NotificationsPath();

async fn notifications(
    NotificationsPath(): NotificationsPath,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<Tera>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
    Query(PageQuery { page }): Query<PageQuery>,
) -> HtmlResult<Response> {
    let Some(user) = viewer.user_id() else {
        return Ok(login_required(jar, &settings));
    };
    let notifications = db.list_notifications(user, page).await?;

    let mut context = Context::new();
    context.insert("notifications", &notifications);
    render(&templates, jar, viewer.user(), "notifications.html", context)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/notifications/read-all", rejection(ServerError))]
struct ReadAllPath();

async fn read_all_notifications(
    ReadAllPath(): ReadAllPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let Some(user) = viewer.user_id() else {
        return Ok(login_required(jar, &settings));
    };
    db.mark_all_notifications_read(user).await?;

    let flash = Flash::success("All notifications marked as read.");
    Ok(redirect_with_flash(jar, &settings, "/accounts/notifications", &flash))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/notifications/{id}/read", rejection(ServerError))]
struct ReadNotificationPath {
    id: Id<NotificationMarker>,
}

async fn read_notification(
    ReadNotificationPath { id }: ReadNotificationPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let Some(user) = viewer.user_id() else {
        return Ok(login_required(jar, &settings));
    };

    let flash = if db.mark_notification_read(user, id).await? {
        Flash::success("Notification marked as read.")
    } else {
        Flash::error("Notification not found.")
    };
    Ok(redirect_with_flash(jar, &settings, "/accounts/notifications", &flash))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/notifications/{id}/delete", rejection(ServerError))]
struct DeleteNotificationPath {
    id: Id<NotificationMarker>,
}

async fn delete_notification(
    DeleteNotificationPath { id }: DeleteNotificationPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    viewer: Viewer,
    jar: CookieJar,
) -> HtmlResult<Response> {
    let Some(user) = viewer.user_id() else {
        return Ok(login_required(jar, &settings));
    };

    let flash = if db.delete_notification(user, id).await? {
        Flash::success("Notification deleted.")
    } else {
        Flash::error("Notification not found.")
    };
    Ok(redirect_with_flash(jar, &settings, "/accounts/notifications", &flash))
}

#[cfg(test)]
mod tests {
    use crate::server::routes::html::accounts::ProfileForm;

    #[test]
    fn blank_profile_image_is_still_submitted() {
        let form = ProfileForm {
            first_name: "Ada".to_owned(),
            email: "ada@example.com".to_owned(),
            ..ProfileForm::default()
        };
        let update = form.to_update();
        assert_eq!(update.first_name.as_deref(), Some("Ada"));
        assert_eq!(update.last_name.as_deref(), Some(""));
        assert_eq!(update.profile_image, Some(Some(String::new())));
        assert_eq!(update.bio.as_deref(), Some(""));
    }
}
