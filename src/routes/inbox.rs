use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde_json::Value;

use crate::auth::Viewer;
use crate::library::RequestContext;
use crate::models::inbox::SendMessageRequest;
use crate::routes::{author, item, single, Paging};
use crate::{AppState, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/inbox", get(list_received).post(send_message))
        .route("/inbox/users/:user_id", get(list_conversation))
        .route("/inbox/:inbox_id/read", post(mark_read))
}

async fn send_message(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Value>> {
    let claims = author(&state, &viewer).await?;
    let message = state.inbox_service.send(&claims, request, ctx.time()).await?;
    let items = state.transformers.inbox(vec![message]).await?;
    Ok(item(single(items)?))
}

async fn list_received(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    let paging = Paging::from_request(&ctx)?;

    let page = state
        .inbox_service
        .list_received(claims, paging.per_page, paging.offset())
        .await?;
    let items = state.transformers.inbox(page.items).await?;
    Ok(paging.envelope(items, page.total))
}

/// Messages exchanged between the viewer and `user_id`, newest first.
async fn list_conversation(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    let paging = Paging::from_request(&ctx)?;

    let page = state
        .inbox_service
        .list_conversation(claims, user_id, paging.per_page, paging.offset())
        .await?;
    let items = state.transformers.inbox(page.items).await?;
    Ok(paging.envelope(items, page.total))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(inbox_id): Path<i64>,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    let message = state.inbox_service.mark_read(claims, inbox_id, ctx.time()).await?;
    let items = state.transformers.inbox(vec![message]).await?;
    Ok(item(single(items)?))
}
