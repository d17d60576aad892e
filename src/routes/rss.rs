use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::db::repository::{ListQuery, OrderBy};
use crate::library::feed::{self, excerpt, Feed, FeedEntry, ANSWER_TITLE_CHARS};
use crate::library::RequestContext;
use crate::models::{Answer, Article, ColumnValue, Question};
use crate::services::distinct;
use crate::{AppState, Result};

const FEED_SIZE: u32 = 20;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/questions", get(latest_questions))
        .route("/articles", get(latest_articles))
        .route("/answers", get(latest_answers))
        .route("/questions/:question_id/answers", get(question_answers))
        .route("/users/:user_id/questions", get(user_questions))
        .route("/users/:user_id/articles", get(user_articles))
}

fn newest() -> ListQuery {
    ListQuery::new(OrderBy::desc("create_time")).page(FEED_SIZE, 0)
}

fn respond(state: &AppState, channel: Feed, entries: Vec<FeedEntry>, ctx: &RequestContext) -> Response {
    let xml = feed::render(&state.config.site, channel, entries, ctx.time());
    ([(header::CONTENT_TYPE, feed::CONTENT_TYPE)], xml).into_response()
}

fn channel(state: &AppState, title: String, page_path: &str, feed_path: &str) -> Feed {
    let site = &state.config.site;
    Feed {
        description: format!("{} - {}", title, site.name),
        title,
        link: format!("{}{}", site.url, page_path),
        self_url: format!("{}/rss{}", site.url, feed_path),
    }
}

/// Usernames for the given authors; unknown authors map to nothing.
async fn usernames(state: &AppState, user_ids: impl IntoIterator<Item = i64>) -> Result<std::collections::HashMap<i64, String>> {
    let users = state
        .user_service
        .get_in_relationship(&distinct(user_ids))
        .await?;
    Ok(users.into_iter().map(|(id, user)| (id, user.username)).collect())
}

async fn question_entries(state: &AppState, questions: Vec<Question>) -> Result<Vec<FeedEntry>> {
    let names = usernames(state, questions.iter().map(|q| q.user_id)).await?;
    let site_url = &state.config.site.url;

    Ok(questions
        .into_iter()
        .map(|q| FeedEntry {
            link: format!("{}/questions/{}", site_url, q.question_id),
            author: names.get(&q.user_id).cloned().unwrap_or_default(),
            title: q.title,
            content_html: q.content_rendered,
            create_time: q.create_time,
        })
        .collect())
}

async fn article_entries(state: &AppState, articles: Vec<Article>) -> Result<Vec<FeedEntry>> {
    let names = usernames(state, articles.iter().map(|a| a.user_id)).await?;
    let site_url = &state.config.site.url;

    Ok(articles
        .into_iter()
        .map(|a| FeedEntry {
            link: format!("{}/articles/{}", site_url, a.article_id),
            author: names.get(&a.user_id).cloned().unwrap_or_default(),
            title: a.title,
            content_html: a.content_rendered,
            create_time: a.create_time,
        })
        .collect())
}

async fn answer_entries(state: &AppState, answers: Vec<Answer>) -> Result<Vec<FeedEntry>> {
    let names = usernames(state, answers.iter().map(|a| a.user_id)).await?;
    let site_url = &state.config.site.url;

    Ok(answers
        .into_iter()
        .map(|a| FeedEntry {
            title: excerpt(&a.content_rendered, ANSWER_TITLE_CHARS),
            link: format!("{}/questions/{}/answers/{}", site_url, a.question_id, a.answer_id),
            author: names.get(&a.user_id).cloned().unwrap_or_default(),
            content_html: a.content_rendered,
            create_time: a.create_time,
        })
        .collect())
}

async fn latest_questions(State(state): State<AppState>, ctx: RequestContext) -> Result<Response> {
    let page = state.question_service.list(newest()).await?;
    let entries = question_entries(&state, page.items).await?;
    let channel = channel(&state, "Latest questions".to_string(), "/questions", "/questions");
    Ok(respond(&state, channel, entries, &ctx))
}

async fn latest_articles(State(state): State<AppState>, ctx: RequestContext) -> Result<Response> {
    let page = state.article_service.list(newest()).await?;
    let entries = article_entries(&state, page.items).await?;
    let channel = channel(&state, "Latest articles".to_string(), "/articles", "/articles");
    Ok(respond(&state, channel, entries, &ctx))
}

async fn latest_answers(State(state): State<AppState>, ctx: RequestContext) -> Result<Response> {
    let page = state.answer_service.list(newest()).await?;
    let entries = answer_entries(&state, page.items).await?;
    let channel = channel(&state, "Latest answers".to_string(), "/questions", "/answers");
    Ok(respond(&state, channel, entries, &ctx))
}

async fn question_answers(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(question_id): Path<i64>,
) -> Result<Response> {
    let question = state.question_service.get(question_id).await?;
    let page = state
        .answer_service
        .list_for_question(question_id, newest())
        .await?;
    let entries = answer_entries(&state, page.items).await?;

    let path = format!("/questions/{}", question_id);
    let channel = channel(
        &state,
        format!("Answers to: {}", question.title),
        &path,
        &format!("{}/answers", path),
    );
    Ok(respond(&state, channel, entries, &ctx))
}

async fn user_questions(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(user_id): Path<i64>,
) -> Result<Response> {
    let user = state.user_service.get_user(user_id).await?;
    let page = state
        .question_service
        .list(newest().filter("user_id", ColumnValue::Int(user_id)))
        .await?;
    let entries = question_entries(&state, page.items).await?;

    let channel = channel(
        &state,
        format!("Questions by {}", user.username),
        &format!("/users/{}/questions", user_id),
        &format!("/users/{}/questions", user_id),
    );
    Ok(respond(&state, channel, entries, &ctx))
}

async fn user_articles(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(user_id): Path<i64>,
) -> Result<Response> {
    let user = state.user_service.get_user(user_id).await?;
    let page = state
        .article_service
        .list(newest().filter("user_id", ColumnValue::Int(user_id)))
        .await?;
    let entries = article_entries(&state, page.items).await?;

    let channel = channel(
        &state,
        format!("Articles by {}", user.username),
        &format!("/users/{}/articles", user_id),
        &format!("/users/{}/articles", user_id),
    );
    Ok(respond(&state, channel, entries, &ctx))
}
