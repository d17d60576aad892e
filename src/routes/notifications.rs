use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde_json::{json, Value};

use crate::auth::Viewer;
use crate::db::repository::NotificationFilter;
use crate::library::RequestContext;
use crate::models::NotificationType;
use crate::routes::{item, single, Paging};
use crate::{AppError, AppState, Result};

/// Notifications are private to their receiver; every route needs a login.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread_count", get(unread_count))
        .route("/notifications/read", post(mark_all_read))
        .route(
            "/notifications/:notification_id",
            get(get_notification).delete(delete_notification),
        )
        .route("/notifications/:notification_id/read", post(mark_read))
}

/// GET /api/notifications?type=question_answered&unread=1
async fn list_notifications(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    let paging = Paging::from_request(&ctx)?;

    let notification_type = match ctx.query("type") {
        Some(value) => Some(
            NotificationType::parse(value)
                .ok_or_else(|| AppError::ValidationError(format!("Unknown notification type: {}", value)))?
                .as_str()
                .to_string(),
        ),
        None => None,
    };
    let filter = NotificationFilter {
        notification_type,
        unread_only: matches!(ctx.query("unread"), Some("1") | Some("true")),
    };

    let page = state
        .notification_service
        .list(claims.user_id, &filter, paging.per_page, paging.offset())
        .await?;
    let items = state.transformers.notifications(page.items).await?;
    Ok(paging.envelope(items, page.total))
}

async fn unread_count(State(state): State<AppState>, Extension(viewer): Extension<Viewer>) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    let count = state.notification_service.unread_count(claims.user_id).await?;
    Ok(item(json!({ "unread_count": count })))
}

async fn get_notification(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(notification_id): Path<i64>,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    let notification = state.notification_service.get(claims.user_id, notification_id).await?;
    let items = state.transformers.notifications(vec![notification]).await?;
    Ok(item(single(items)?))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(notification_id): Path<i64>,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    let notification = state
        .notification_service
        .mark_read(claims.user_id, notification_id)
        .await?;
    let items = state.transformers.notifications(vec![notification]).await?;
    Ok(item(single(items)?))
}

async fn mark_all_read(State(state): State<AppState>, Extension(viewer): Extension<Viewer>) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    state.notification_service.mark_all_read(claims.user_id).await?;
    Ok(Json(json!({ "message": "All notifications marked as read" })))
}

async fn delete_notification(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(notification_id): Path<i64>,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    state
        .notification_service
        .delete(claims.user_id, notification_id)
        .await?;
    Ok(Json(json!({ "message": "Notification deleted successfully" })))
}
