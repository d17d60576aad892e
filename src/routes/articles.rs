use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde_json::{json, Value};

use crate::auth::Viewer;
use crate::library::RequestContext;
use crate::models::article::{CreateArticleRequest, UpdateArticleRequest};
use crate::routes::{author, created, int_filters, item, single, Paging};
use crate::services::article_service::ARTICLE_ORDERS;
use crate::{AppState, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/articles", get(list_articles).post(create_article))
        .route(
            "/articles/:article_id",
            get(get_article).patch(update_article).delete(delete_article),
        )
}

async fn list_articles(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
) -> Result<Json<Value>> {
    let paging = Paging::from_request(&ctx)?;
    let query = int_filters(&ctx, paging.query(&ctx, ARTICLE_ORDERS)?, &["user_id"])?;

    let page = state.article_service.list(query).await?;
    let items = state
        .transformers
        .articles(page.items, &ctx.includes(), viewer.user_id())
        .await?;
    Ok(paging.envelope(items, page.total))
}

async fn get_article(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(article_id): Path<i64>,
) -> Result<Json<Value>> {
    let article = state.article_service.get(article_id).await?;
    let items = state
        .transformers
        .articles(vec![article], &ctx.includes(), viewer.user_id())
        .await?;
    Ok(item(single(items)?))
}

async fn create_article(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Json(request): Json<CreateArticleRequest>,
) -> Result<Json<Value>> {
    let claims = author(&state, &viewer).await?;
    let result = state.article_service.create(&claims, request, ctx.time()).await?;

    let items = state
        .transformers
        .articles(vec![result.item.clone()], &ctx.includes(), viewer.user_id())
        .await?;
    Ok(created(result, single(items)?))
}

async fn update_article(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(article_id): Path<i64>,
    Json(request): Json<UpdateArticleRequest>,
) -> Result<Json<Value>> {
    let claims = author(&state, &viewer).await?;
    let article = state
        .article_service
        .update(&claims, article_id, request, ctx.time())
        .await?;

    let items = state
        .transformers
        .articles(vec![article], &ctx.includes(), viewer.user_id())
        .await?;
    Ok(item(single(items)?))
}

async fn delete_article(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(article_id): Path<i64>,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    state.article_service.delete(claims, article_id).await?;
    Ok(Json(json!({ "message": "Article deleted successfully" })))
}
