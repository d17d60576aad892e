// Resolves the bearer token (if any) into a `Viewer` request extension
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::auth::Viewer;
use crate::{AppError, AppState};

pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let viewer = match request.headers().get(header::AUTHORIZATION) {
        None => Viewer::anonymous(),
        Some(value) => {
            let auth_str = value
                .to_str()
                .map_err(|_| AppError::AuthError("Invalid authorization header format".to_string()))?;
            let token = auth_str
                .strip_prefix("Bearer ")
                .ok_or_else(|| AppError::AuthError("Authorization header must start with 'Bearer '".to_string()))?;

            Viewer(Some(app_state.auth_service.verify_token(token)?))
        }
    };

    request.extensions_mut().insert(viewer);
    Ok(next.run(request).await)
}
