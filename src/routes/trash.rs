// Trash, restore and batch removal for the soft-deletable resources.
// All of these are administrator operations.
use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::Viewer;
use crate::db::repository::TrashScope;
use crate::library::request::DEFAULT_SPLIT_MAX;
use crate::library::RequestContext;
use crate::models::{Answer, Article, Comment, Question, SoftDelete, Topic};
use crate::routes::{item, query_ids, single, Paging};
use crate::services::answer_service::ANSWER_ORDERS;
use crate::services::article_service::ARTICLE_ORDERS;
use crate::services::comment_service::COMMENT_ORDERS;
use crate::services::question_service::QUESTION_ORDERS;
use crate::services::topic_service::TOPIC_ORDERS;
use crate::services::{
    list_page, AnswerService, ArticleService, CommentService, Deletable, QuestionService, TopicService,
};
use crate::{AppError, AppState, Result};

/// A resource exposed through the trash endpoints.
#[async_trait]
pub trait TrashResource: Send + Sync + 'static {
    type Record: SoftDelete;
    type Service: Deletable<Record = Self::Record> + 'static;

    /// Plural path segment, e.g. `questions`.
    const PATH: &'static str;
    const ID_PARAM: &'static str;
    const ORDERS: &'static [&'static str];

    fn service(state: &AppState) -> Arc<Self::Service>;

    async fn present(
        state: &AppState,
        items: Vec<Self::Record>,
        ctx: &RequestContext,
        viewer: Option<i64>,
    ) -> Result<Vec<Value>>;
}

#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<i64>,
}

impl IdsRequest {
    fn validated(self) -> Result<Vec<i64>> {
        if self.ids.is_empty() {
            return Err(AppError::ValidationError("ids must not be empty".to_string()));
        }
        if self.ids.len() > DEFAULT_SPLIT_MAX {
            return Err(AppError::ValidationError(format!(
                "At most {} ids can be processed at once",
                DEFAULT_SPLIT_MAX
            )));
        }
        Ok(self.ids)
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(resource_routes::<Questions>())
        .merge(resource_routes::<Articles>())
        .merge(resource_routes::<Answers>())
        .merge(resource_routes::<Comments>())
        .merge(resource_routes::<Topics>())
}

fn resource_routes<R: TrashResource>() -> Router<AppState> {
    Router::new()
        .route(&format!("/{}/:{}/trash", R::PATH, R::ID_PARAM), post(trash_one::<R>))
        .route(&format!("/{}/:{}/untrash", R::PATH, R::ID_PARAM), post(untrash_one::<R>))
        .route(
            &format!("/trash/{}", R::PATH),
            get(list_trashed::<R>)
                .post(trash_many::<R>)
                .delete(delete_many::<R>),
        )
        .route(&format!("/trash/{}/untrash", R::PATH), post(untrash_many::<R>))
}

/// GET /api/trash/{resource}
async fn list_trashed<R: TrashResource>(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
) -> Result<Json<Value>> {
    viewer.require_admin()?;
    let paging = Paging::from_request(&ctx)?;
    let query = paging.query(&ctx, R::ORDERS)?.scope(TrashScope::OnlyTrashed);

    let service = R::service(&state);
    let page = list_page(service.records(), &query).await?;
    let items = R::present(&state, page.items, &ctx, viewer.user_id()).await?;
    Ok(paging.envelope(items, page.total))
}

async fn trash_one<R: TrashResource>(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let admin = viewer.require_admin()?;
    let trashed = R::service(&state).trash(id, admin.user_id).await?;
    let items = R::present(&state, vec![trashed], &ctx, viewer.user_id()).await?;
    Ok(item(single(items)?))
}

async fn untrash_one<R: TrashResource>(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    viewer.require_admin()?;
    let restored = R::service(&state).untrash(id).await?;
    let items = R::present(&state, vec![restored], &ctx, viewer.user_id()).await?;
    Ok(item(single(items)?))
}

/// POST /api/trash/{resource} with `{"ids": [..]}`
async fn trash_many<R: TrashResource>(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Json(request): Json<IdsRequest>,
) -> Result<Json<Value>> {
    let admin = viewer.require_admin()?;
    let ids = request.validated()?;
    let trashed = R::service(&state).trash_multiple(&ids, admin.user_id).await?;
    Ok(item(R::present(&state, trashed, &ctx, viewer.user_id()).await?))
}

/// POST /api/trash/{resource}/untrash with `{"ids": [..]}`
async fn untrash_many<R: TrashResource>(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Json(request): Json<IdsRequest>,
) -> Result<Json<Value>> {
    viewer.require_admin()?;
    let ids = request.validated()?;
    let restored = R::service(&state).untrash_multiple(&ids).await?;
    Ok(item(R::present(&state, restored, &ctx, viewer.user_id()).await?))
}

/// DELETE /api/trash/{resource}?ids=1,2,3 removes rows permanently.
async fn delete_many<R: TrashResource>(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
) -> Result<Json<Value>> {
    let admin = viewer.require_admin()?;
    let ids = query_ids(&ctx)?;
    R::service(&state).delete_multiple(&ids, admin.user_id).await?;
    Ok(Json(json!({ "message": format!("Deleted {} {}", ids.len(), R::PATH) })))
}

fn to_values<T: serde::Serialize>(items: Vec<T>) -> Result<Vec<Value>> {
    items
        .into_iter()
        .map(|item| serde_json::to_value(item).map_err(|e| AppError::InternalError(e.to_string())))
        .collect()
}

pub struct Questions;
pub struct Articles;
pub struct Answers;
pub struct Comments;
pub struct Topics;

#[async_trait]
impl TrashResource for Questions {
    type Record = Question;
    type Service = QuestionService;
    const PATH: &'static str = "questions";
    const ID_PARAM: &'static str = "question_id";
    const ORDERS: &'static [&'static str] = QUESTION_ORDERS;

    fn service(state: &AppState) -> Arc<QuestionService> {
        state.question_service.clone()
    }

    async fn present(state: &AppState, items: Vec<Question>, ctx: &RequestContext, viewer: Option<i64>) -> Result<Vec<Value>> {
        to_values(state.transformers.questions(items, &ctx.includes(), viewer).await?)
    }
}

#[async_trait]
impl TrashResource for Articles {
    type Record = Article;
    type Service = ArticleService;
    const PATH: &'static str = "articles";
    const ID_PARAM: &'static str = "article_id";
    const ORDERS: &'static [&'static str] = ARTICLE_ORDERS;

    fn service(state: &AppState) -> Arc<ArticleService> {
        state.article_service.clone()
    }

    async fn present(state: &AppState, items: Vec<Article>, ctx: &RequestContext, viewer: Option<i64>) -> Result<Vec<Value>> {
        to_values(state.transformers.articles(items, &ctx.includes(), viewer).await?)
    }
}

#[async_trait]
impl TrashResource for Answers {
    type Record = Answer;
    type Service = AnswerService;
    const PATH: &'static str = "answers";
    const ID_PARAM: &'static str = "answer_id";
    const ORDERS: &'static [&'static str] = ANSWER_ORDERS;

    fn service(state: &AppState) -> Arc<AnswerService> {
        state.answer_service.clone()
    }

    async fn present(state: &AppState, items: Vec<Answer>, ctx: &RequestContext, viewer: Option<i64>) -> Result<Vec<Value>> {
        to_values(state.transformers.answers(items, &ctx.includes(), viewer).await?)
    }
}

#[async_trait]
impl TrashResource for Comments {
    type Record = Comment;
    type Service = CommentService;
    const PATH: &'static str = "comments";
    const ID_PARAM: &'static str = "comment_id";
    const ORDERS: &'static [&'static str] = COMMENT_ORDERS;

    fn service(state: &AppState) -> Arc<CommentService> {
        state.comment_service.clone()
    }

    async fn present(state: &AppState, items: Vec<Comment>, ctx: &RequestContext, viewer: Option<i64>) -> Result<Vec<Value>> {
        to_values(state.transformers.comments(items, &ctx.includes(), viewer).await?)
    }
}

#[async_trait]
impl TrashResource for Topics {
    type Record = Topic;
    type Service = TopicService;
    const PATH: &'static str = "topics";
    const ID_PARAM: &'static str = "topic_id";
    const ORDERS: &'static [&'static str] = TOPIC_ORDERS;

    fn service(state: &AppState) -> Arc<TopicService> {
        state.topic_service.clone()
    }

    async fn present(state: &AppState, items: Vec<Topic>, ctx: &RequestContext, _viewer: Option<i64>) -> Result<Vec<Value>> {
        to_values(state.transformers.topics(items, &ctx.includes()).await?)
    }
}
