use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    auth::{AuthenticatedUser, issue_session},
    extract::{Created, Json},
    routes::api::MessageResponse,
};
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::{
    form::{FieldErrors, NON_FIELD_ERRORS},
    model::user::{CreateUser, Email, User, Username},
    password::{PasswordHash, check_strength},
};
use inkwell_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_post(register)
        .typed_post(login)
        .typed_post(logout)
        .typed_post(change_password)
        .typed_get(me)
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub(crate) struct Registration {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub(crate) struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub(crate) struct PasswordChange {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_password2: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct AuthResponse {
    user: User,
    token: String,
    message: &'static str,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct PasswordChanged {
    message: &'static str,
    revoked_sessions: u64,
}

/// Weaknesses go to `field`, a mismatch to `{field}2`.
fn check_new_password(
    errors: &mut FieldErrors,
    field: &str,
    password: &str,
    confirmation: &str,
    username: &str,
) {
    for weakness in check_strength(password, username) {
        errors.add(field, weakness);
    }
    if password != confirmation {
        errors.add(&format!("{field}2"), "The two password fields didn't match.");
    }
}

/// Validates a registration and creates the account.
///
/// Format errors are reported before the database is consulted about
/// uniqueness.
pub(crate) async fn register_user(db: &DbClient, registration: &Registration) -> Result<User> {
    let mut errors = FieldErrors::new();
    let username = errors.check("username", Username::new(registration.username.trim()));
    let email = errors.check("email", Email::new(registration.email.trim()));
    check_new_password(
        &mut errors,
        "password",
        &registration.password,
        &registration.password2,
        registration.username.trim(),
    );

    let (Some(username), Some(email)) = (username, email) else {
        return Err(ServerError::Validation(errors));
    };
    if !errors.is_empty() {
        return Err(ServerError::Validation(errors));
    }

    if db.username_exists(username.get()).await? {
        errors.add("username", "A user with that username already exists.");
    }
    if db.email_exists(email.get(), None).await? {
        errors.add("email", "A user with that email already exists.");
    }
    if !errors.is_empty() {
        return Err(ServerError::Validation(errors));
    }

    let password_hash = PasswordHash::generate(&registration.password)?;
    let user = db
        .create_user(&CreateUser {
            username,
            email,
            password_hash,
        })
        .await?;

    info!(user = %user.id, username = user.username.get(), "Registered user");
    Ok(user)
}

/// Checks a username and password pair. Unknown users and wrong passwords
/// get the same answer.
pub(crate) async fn authenticate(db: &DbClient, credentials: &Credentials) -> Result<User> {
    if credentials.username.trim().is_empty() || credentials.password.is_empty() {
        return Err(ServerError::field(
            NON_FIELD_ERRORS,
            "Please enter both a username and a password.",
        ));
    }

    let invalid = || ServerError::field(NON_FIELD_ERRORS, "Unable to log in with provided credentials.");

    let (user, password_hash) = db
        .fetch_credentials(credentials.username.trim())
        .await?
        .ok_or_else(invalid)?;
    if !password_hash.verify(&credentials.password) {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(ServerError::field(NON_FIELD_ERRORS, "This account is inactive."));
    }

    Ok(user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/auth/register", rejection(ServerError))]
struct RegisterPath();

async fn register(
    RegisterPath(): RegisterPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    Json(registration): Json<Registration>,
) -> Result<Created<AuthResponse>> {
    let user = register_user(&db, &registration).await?;
    let token = issue_session(&db, &settings, user.id).await?;

    Ok(Created(AuthResponse {
        user,
        token: token.as_token_str(),
        message: "Registration successful.",
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/auth/login", rejection(ServerError))]
struct LoginPath();

async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<Arc<Settings>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthResponse>> {
    let user = authenticate(&db, &credentials).await?;
    let token = issue_session(&db, &settings, user.id).await?;

    info!(user = %user.id, "Logged in");
    Ok(Json(AuthResponse {
        user,
        token: token.as_token_str(),
        message: "Login successful.",
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/auth/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>> {
    db.delete_session(user.token_hash()).await?;

    info!(user = %user.user_id(), "Logged out");
    Ok(Json(MessageResponse {
        message: "Logout successful.",
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/auth/password-change", rejection(ServerError))]
struct PasswordChangePath();

async fn change_password(
    PasswordChangePath(): PasswordChangePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(change): Json<PasswordChange>,
) -> Result<Json<PasswordChanged>> {
    let account = db
        .fetch_user(user.user_id())
        .await?
        .ok_or(ServerError::InvalidToken)?;
    let current_hash = db
        .fetch_password_hash(user.user_id())
        .await?
        .ok_or(ServerError::InvalidToken)?;

    let mut errors = FieldErrors::new();
    if !current_hash.verify(&change.old_password) {
        errors.add("old_password", "Your old password was entered incorrectly.");
    }
    check_new_password(
        &mut errors,
        "new_password",
        &change.new_password,
        &change.new_password2,
        account.username.get(),
    );
    if !errors.is_empty() {
        return Err(ServerError::Validation(errors));
    }

    let new_hash = PasswordHash::generate(&change.new_password)?;
    let revoked_sessions = db
        .change_password(user.user_id(), &new_hash, Some(user.token_hash()))
        .await?;

    info!(user = %user.user_id(), revoked_sessions, "Password changed");
    Ok(Json(PasswordChanged {
        message: "Password changed successfully.",
        revoked_sessions,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/auth/me", rejection(ServerError))]
struct MePath();

async fn me(
    MePath(): MePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<User>> {
    let user = db
        .fetch_user(user.user_id())
        .await?
        .ok_or(ServerError::InvalidToken)?;

    Ok(Json(user))
}
