use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use extract::Json;
use inkwell_common::{
    form::{FieldErrors, NON_FIELD_ERRORS},
    model::{
        Id,
        auth::{SessionTokenDecodeError, SessionTokenHashError},
        comment::CommentMarker,
        notification::NotificationMarker,
        page::PageOutOfRangeError,
        post::PostMarker,
    },
    password::PasswordHashError,
    util::PositiveDuration,
};
use inkwell_db::client::{DbClient, DbError};
use serde::Serialize;
use std::sync::Arc;
use tera::Tera;
use thiserror::Error;
use tracing::error;

mod auth;
mod extract;
mod routes;
pub mod templates;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub templates: Arc<Tera>,
    pub settings: Arc<Settings>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Settings {
    pub token_lifetime: PositiveDuration,
    /// Marks the session and flash cookies `Secure`.
    pub secure_cookies: bool,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Incoming form rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] SessionTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] SessionTokenHashError),
    #[error("Hashing the password failed: {0}")]
    PasswordHash(#[from] PasswordHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("Post {0} was not found.")]
    PostNotFound(String),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Comment with id {0} was not found.")]
    CommentNotFound(Id<CommentMarker>),
    #[error("User {0} was not found.")]
    UserNotFound(String),
    #[error("Category {0} was not found.")]
    CategoryNotFound(String),
    #[error("Tag {0} was not found.")]
    TagNotFound(String),
    #[error("Series {0} was not found.")]
    SeriesNotFound(String),
    #[error("Notification with id {0} was not found.")]
    NotificationNotFound(Id<NotificationMarker>),
    #[error(transparent)]
    InvalidPage(PageOutOfRangeError),
    #[error(transparent)]
    Database(DbError),
    #[error("Rendering a template failed: {0}")]
    Template(#[from] tera::Error),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostNotFound(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::CommentNotFound(_)
            | ServerError::UserNotFound(_)
            | ServerError::CategoryNotFound(_)
            | ServerError::TagNotFound(_)
            | ServerError::SeriesNotFound(_)
            | ServerError::NotificationNotFound(_)
            | ServerError::InvalidPage(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken | ServerError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::FormRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_)
            | ServerError::Database(_)
            | ServerError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to clients. Internal failures are not described.
    pub fn public_message(&self) -> String {
        match self {
            ServerError::Validation(_) => "Invalid input.".to_owned(),
            _ if self.status().is_server_error() => "Internal server error.".to_owned(),
            _ => self.to_string(),
        }
    }

    pub fn field(field: &str, message: impl std::fmt::Display) -> Self {
        ServerError::Validation(FieldErrors::single(field, message))
    }
}

/// Maps a violated constraint to the form field a client should correct.
fn constraint_field(constraint: &str) -> (&'static str, &'static str) {
    match constraint {
        "users_username_key" => ("username", "A user with that username already exists."),
        "users_email_key" => ("email", "A user with that email already exists."),
        "categories_name_key" | "categories_slug_key" => {
            ("name", "A category with that name already exists.")
        }
        "comments_parent_same_post_fkey" => {
            ("parent", "The parent comment must belong to the same post.")
        }
        "posts_category_snowflake_fkey" => ("category_id", "Unknown category."),
        "posts_series_snowflake_fkey" => ("series_id", "Unknown series."),
        _ => (NON_FIELD_ERRORS, "The request conflicts with existing data."),
    }
}

impl From<DbError> for ServerError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::UniqueViolation(constraint) | DbError::ForeignKeyViolation(constraint) => {
                let (field, message) = constraint_field(&constraint);
                ServerError::field(field, message)
            }
            DbError::PageOutOfRange(error) => ServerError::InvalidPage(error),
            error => ServerError::Database(error),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message: self.public_message(),
            errors: match self {
                ServerError::Validation(errors) => Some(errors),
                _ => None,
            },
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests;
