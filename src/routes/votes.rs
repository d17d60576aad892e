use axum::{
    extract::{Path, State},
    response::Json,
    routing::post,
    Extension, Router,
};
use serde_json::{json, Value};

use crate::auth::Viewer;
use crate::models::vote::CastVoteRequest;
use crate::models::ResourceKind;
use crate::routes::{author, item};
use crate::{AppState, Result};

/// Vote-related API routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(vote_routes("/questions/:question_id/votes", ResourceKind::Question))
        .merge(vote_routes("/answers/:answer_id/votes", ResourceKind::Answer))
        .merge(vote_routes("/articles/:article_id/votes", ResourceKind::Article))
        .merge(vote_routes("/comments/:comment_id/votes", ResourceKind::Comment))
}

fn vote_routes(path: &str, kind: ResourceKind) -> Router<AppState> {
    Router::new().route(
        path,
        post(
            move |State(state): State<AppState>,
                  Extension(viewer): Extension<Viewer>,
                  Path(id): Path<i64>,
                  Json(request): Json<CastVoteRequest>| async move {
                cast_vote(state, viewer, kind, id, request).await
            },
        )
        .delete(
            move |State(state): State<AppState>, Extension(viewer): Extension<Viewer>, Path(id): Path<i64>| async move {
                remove_vote(state, viewer, kind, id).await
            },
        ),
    )
}

/// Cast or change the viewer's vote; voting twice keeps one row.
async fn cast_vote(
    state: AppState,
    viewer: Viewer,
    kind: ResourceKind,
    votable_id: i64,
    request: CastVoteRequest,
) -> Result<Json<Value>> {
    let claims = author(&state, &viewer).await?;
    let vote = state
        .vote_service
        .cast_vote(claims.user_id, kind, votable_id, request.vote_type)
        .await?;
    Ok(item(vote))
}

async fn remove_vote(state: AppState, viewer: Viewer, kind: ResourceKind, votable_id: i64) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    state.vote_service.remove_vote(claims.user_id, kind, votable_id).await?;
    Ok(Json(json!({ "message": "Vote removed" })))
}
