use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde_json::{json, Value};

use crate::auth::Viewer;
use crate::library::RequestContext;
use crate::models::answer::{CreateAnswerRequest, UpdateAnswerRequest};
use crate::routes::{author, created, int_filters, item, single, Paging};
use crate::services::answer_service::ANSWER_ORDERS;
use crate::{AppState, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/answers", get(list_answers))
        .route(
            "/answers/:answer_id",
            get(get_answer).patch(update_answer).delete(delete_answer),
        )
        .route(
            "/questions/:question_id/answers",
            get(list_question_answers).post(create_answer),
        )
}

/// GET /api/answers?user_id=&question_id=
async fn list_answers(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
) -> Result<Json<Value>> {
    let paging = Paging::from_request(&ctx)?;
    let query = int_filters(&ctx, paging.query(&ctx, ANSWER_ORDERS)?, &["user_id", "question_id"])?;

    let page = state.answer_service.list(query).await?;
    let items = state
        .transformers
        .answers(page.items, &ctx.includes(), viewer.user_id())
        .await?;
    Ok(paging.envelope(items, page.total))
}

async fn list_question_answers(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(question_id): Path<i64>,
) -> Result<Json<Value>> {
    let paging = Paging::from_request(&ctx)?;
    let query = paging.query(&ctx, ANSWER_ORDERS)?;

    let page = state.answer_service.list_for_question(question_id, query).await?;
    let items = state
        .transformers
        .answers(page.items, &ctx.includes(), viewer.user_id())
        .await?;
    Ok(paging.envelope(items, page.total))
}

async fn get_answer(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(answer_id): Path<i64>,
) -> Result<Json<Value>> {
    let answer = state.answer_service.get(answer_id).await?;
    let items = state
        .transformers
        .answers(vec![answer], &ctx.includes(), viewer.user_id())
        .await?;
    Ok(item(single(items)?))
}

async fn create_answer(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(question_id): Path<i64>,
    Json(request): Json<CreateAnswerRequest>,
) -> Result<Json<Value>> {
    let claims = author(&state, &viewer).await?;
    let result = state
        .answer_service
        .create(&claims, question_id, request, ctx.time())
        .await?;

    let items = state
        .transformers
        .answers(vec![result.item.clone()], &ctx.includes(), viewer.user_id())
        .await?;
    Ok(created(result, single(items)?))
}

async fn update_answer(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(answer_id): Path<i64>,
    Json(request): Json<UpdateAnswerRequest>,
) -> Result<Json<Value>> {
    let claims = author(&state, &viewer).await?;
    let answer = state
        .answer_service
        .update(&claims, answer_id, request, ctx.time())
        .await?;

    let items = state
        .transformers
        .answers(vec![answer], &ctx.includes(), viewer.user_id())
        .await?;
    Ok(item(single(items)?))
}

async fn delete_answer(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(answer_id): Path<i64>,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    state.answer_service.delete(claims, answer_id).await?;
    Ok(Json(json!({ "message": "Answer deleted successfully" })))
}
