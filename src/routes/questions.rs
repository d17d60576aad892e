use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde_json::Value;

use crate::auth::Viewer;
use crate::library::RequestContext;
use crate::models::question::{CreateQuestionRequest, UpdateQuestionRequest};
use crate::routes::{author, created, int_filters, item, single, Paging};
use crate::services::question_service::QUESTION_ORDERS;
use crate::{AppState, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/questions", get(list_questions).post(create_question))
        .route(
            "/questions/:question_id",
            get(get_question).patch(update_question).delete(delete_question),
        )
}

/// GET /api/questions?user_id=&order=&include=
async fn list_questions(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
) -> Result<Json<Value>> {
    let paging = Paging::from_request(&ctx)?;
    let query = int_filters(&ctx, paging.query(&ctx, QUESTION_ORDERS)?, &["user_id"])?;

    let page = state.question_service.list(query).await?;
    let items = state
        .transformers
        .questions(page.items, &ctx.includes(), viewer.user_id())
        .await?;
    Ok(paging.envelope(items, page.total))
}

async fn get_question(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(question_id): Path<i64>,
) -> Result<Json<Value>> {
    let question = state.question_service.get(question_id).await?;
    let items = state
        .transformers
        .questions(vec![question], &ctx.includes(), viewer.user_id())
        .await?;
    Ok(item(single(items)?))
}

async fn create_question(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Json(request): Json<CreateQuestionRequest>,
) -> Result<Json<Value>> {
    let claims = author(&state, &viewer).await?;
    let result = state.question_service.create(&claims, request, ctx.time()).await?;

    let items = state
        .transformers
        .questions(vec![result.item.clone()], &ctx.includes(), viewer.user_id())
        .await?;
    Ok(created(result, single(items)?))
}

async fn update_question(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(question_id): Path<i64>,
    Json(request): Json<UpdateQuestionRequest>,
) -> Result<Json<Value>> {
    let claims = author(&state, &viewer).await?;
    let question = state
        .question_service
        .update(&claims, question_id, request, ctx.time())
        .await?;

    let items = state
        .transformers
        .questions(vec![question], &ctx.includes(), viewer.user_id())
        .await?;
    Ok(item(single(items)?))
}

async fn delete_question(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(question_id): Path<i64>,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    state.question_service.delete(claims, question_id).await?;
    Ok(Json(serde_json::json!({ "message": "Question deleted successfully" })))
}
