use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    extract::{Json, Query},
    routes::api::{MessageResponse, PageQuery},
};
use axum::{Router, extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::model::{
    Id,
    notification::{NotificationList, NotificationMarker},
};
use inkwell_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(list_notifications)
        .typed_get(unread_count)
        .typed_post(mark_all_read)
        .typed_post(mark_read)
        .typed_delete(delete_notification)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/notifications", rejection(ServerError))]
struct NotificationsPath();

async fn list_notifications(
    NotificationsPath(): NotificationsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<NotificationList>> {
    Ok(Json(db.list_notifications(user.user_id(), page).await?))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct UnreadCount {
    unread_count: i64,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/notifications/unread_count", rejection(ServerError))]
struct UnreadCountPath();

async fn unread_count(
    UnreadCountPath(): UnreadCountPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<UnreadCount>> {
    let unread_count = db.unread_notification_count(user.user_id()).await?;

    Ok(Json(UnreadCount { unread_count }))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct MarkedRead {
    message: &'static str,
    updated: u64,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/notifications/read-all", rejection(ServerError))]
struct ReadAllPath();

async fn mark_all_read(
    ReadAllPath(): ReadAllPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<MarkedRead>> {
    let updated = db.mark_all_notifications_read(user.user_id()).await?;

    debug!(user = %user.user_id(), updated, "Marked all notifications read");
    Ok(Json(MarkedRead {
        message: "All notifications marked as read.",
        updated,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/notifications/{id}/read", rejection(ServerError))]
struct ReadPath {
    id: Id<NotificationMarker>,
}

async fn mark_read(
    ReadPath { id }: ReadPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>> {
    if !db.mark_notification_read(user.user_id(), id).await? {
        return Err(ServerError::NotificationNotFound(id));
    }

    Ok(Json(MessageResponse {
        message: "Notification marked as read.",
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/notifications/{id}", rejection(ServerError))]
struct NotificationPath {
    id: Id<NotificationMarker>,
}

async fn delete_notification(
    NotificationPath { id }: NotificationPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    if !db.delete_notification(user.user_id(), id).await? {
        return Err(ServerError::NotificationNotFound(id));
    }

    Ok(StatusCode::NO_CONTENT)
}
