use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde_json::{json, Value};

use crate::auth::Viewer;
use crate::library::RequestContext;
use crate::models::topic::{CreateTopicRequest, UpdateTopicRequest};
use crate::routes::{item, single, Paging};
use crate::services::topic_service::TOPIC_ORDERS;
use crate::{AppState, Result};

/// Topics are read by everyone and managed by administrators.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/topics", get(list_topics).post(create_topic))
        .route(
            "/topics/:topic_id",
            get(get_topic).patch(update_topic).delete(delete_topic),
        )
}

async fn list_topics(State(state): State<AppState>, ctx: RequestContext) -> Result<Json<Value>> {
    let paging = Paging::from_request(&ctx)?;
    let page = state.topic_service.list(paging.query(&ctx, TOPIC_ORDERS)?).await?;
    let items = state.transformers.topics(page.items, &ctx.includes()).await?;
    Ok(paging.envelope(items, page.total))
}

async fn get_topic(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(topic_id): Path<i64>,
) -> Result<Json<Value>> {
    let topic = state.topic_service.get(topic_id).await?;
    let items = state.transformers.topics(vec![topic], &ctx.includes()).await?;
    Ok(item(single(items)?))
}

async fn create_topic(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Json(request): Json<CreateTopicRequest>,
) -> Result<Json<Value>> {
    let admin = viewer.require_admin()?;
    state.user_service.ensure_user(admin).await?;
    let topic = state.topic_service.create(admin, request, ctx.time()).await?;
    Ok(item(topic))
}

async fn update_topic(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(topic_id): Path<i64>,
    Json(request): Json<UpdateTopicRequest>,
) -> Result<Json<Value>> {
    viewer.require_admin()?;
    let topic = state.topic_service.update(topic_id, request, ctx.time()).await?;
    Ok(item(topic))
}

async fn delete_topic(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(topic_id): Path<i64>,
) -> Result<Json<Value>> {
    let admin = viewer.require_admin()?;
    state.topic_service.delete(admin, topic_id).await?;
    Ok(Json(json!({ "message": "Topic deleted successfully" })))
}
