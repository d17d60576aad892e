use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::library::captcha::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::routes::{answers, articles, comments, images, inbox, item, notifications, questions, topics, trash, votes};
use crate::{AppState, Result};

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(api_health))
        .route("/captcha", get(generate_captcha))
        .merge(questions::routes())
        .merge(articles::routes())
        .merge(answers::routes())
        .merge(comments::routes())
        .merge(topics::routes())
        .merge(votes::routes())
        .merge(trash::routes())
        .merge(images::routes(state.config.storage.max_upload_bytes))
        .merge(notifications::routes())
        .merge(inbox::routes())
}

async fn api_health(State(state): State<AppState>) -> Json<Value> {
    let database = match state.db.health_check().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            e.to_string()
        }
    };

    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "backend": if state.db.postgres.is_some() { "postgres" } else { "memory" },
    }))
}

/// GET /api/captcha issues a fresh challenge.
async fn generate_captcha(State(state): State<AppState>) -> Result<Json<Value>> {
    let challenge = state.captcha.generate(DEFAULT_WIDTH, DEFAULT_HEIGHT).await?;
    Ok(item(challenge))
}
