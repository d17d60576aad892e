use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde_json::{json, Value};

use crate::auth::Viewer;
use crate::library::RequestContext;
use crate::models::comment::{CreateCommentRequest, UpdateCommentRequest};
use crate::models::Commentable;
use crate::routes::{author, created, int_filters, item, single, Paging};
use crate::services::comment_service::COMMENT_ORDERS;
use crate::{AppState, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/comments", get(list_comments))
        .route(
            "/comments/:comment_id",
            get(get_comment).patch(update_comment).delete(delete_comment),
        )
        .merge(commentable_routes("/questions/:question_id/comments", Commentable::Question))
        .merge(commentable_routes("/articles/:article_id/comments", Commentable::Article))
        .merge(commentable_routes("/answers/:answer_id/comments", Commentable::Answer))
}

/// List and create comments under one commentable resource.
fn commentable_routes(path: &str, target: fn(i64) -> Commentable) -> Router<AppState> {
    Router::new().route(
        path,
        get(
            move |State(state): State<AppState>,
                  Extension(viewer): Extension<Viewer>,
                  ctx: RequestContext,
                  Path(id): Path<i64>| async move { list_for(state, viewer, ctx, target(id)).await },
        )
        .post(
            move |State(state): State<AppState>,
                  Extension(viewer): Extension<Viewer>,
                  ctx: RequestContext,
                  Path(id): Path<i64>,
                  Json(request): Json<CreateCommentRequest>| async move {
                create_comment(state, viewer, ctx, target(id), request).await
            },
        ),
    )
}

/// GET /api/comments?user_id=
async fn list_comments(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
) -> Result<Json<Value>> {
    let paging = Paging::from_request(&ctx)?;
    let query = int_filters(&ctx, paging.query(&ctx, COMMENT_ORDERS)?, &["user_id"])?;

    let page = state.comment_service.list(query).await?;
    let items = state
        .transformers
        .comments(page.items, &ctx.includes(), viewer.user_id())
        .await?;
    Ok(paging.envelope(items, page.total))
}

async fn list_for(state: AppState, viewer: Viewer, ctx: RequestContext, commentable: Commentable) -> Result<Json<Value>> {
    let paging = Paging::from_request(&ctx)?;
    let query = paging.query(&ctx, COMMENT_ORDERS)?;

    let page = state.comment_service.list_for(commentable, query).await?;
    let items = state
        .transformers
        .comments(page.items, &ctx.includes(), viewer.user_id())
        .await?;
    Ok(paging.envelope(items, page.total))
}

async fn create_comment(
    state: AppState,
    viewer: Viewer,
    ctx: RequestContext,
    commentable: Commentable,
    request: CreateCommentRequest,
) -> Result<Json<Value>> {
    let claims = author(&state, &viewer).await?;
    let result = state
        .comment_service
        .create(&claims, commentable, request, ctx.time())
        .await?;

    let items = state
        .transformers
        .comments(vec![result.item.clone()], &ctx.includes(), viewer.user_id())
        .await?;
    Ok(created(result, single(items)?))
}

async fn get_comment(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(comment_id): Path<i64>,
) -> Result<Json<Value>> {
    let comment = state.comment_service.get(comment_id).await?;
    let items = state
        .transformers
        .comments(vec![comment], &ctx.includes(), viewer.user_id())
        .await?;
    Ok(item(single(items)?))
}

async fn update_comment(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(comment_id): Path<i64>,
    Json(request): Json<UpdateCommentRequest>,
) -> Result<Json<Value>> {
    let claims = author(&state, &viewer).await?;
    let comment = state
        .comment_service
        .update(&claims, comment_id, request, ctx.time())
        .await?;

    let items = state
        .transformers
        .comments(vec![comment], &ctx.includes(), viewer.user_id())
        .await?;
    Ok(item(single(items)?))
}

async fn delete_comment(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(comment_id): Path<i64>,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    state.comment_service.delete(claims, comment_id).await?;
    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}
