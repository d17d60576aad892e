use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

use crate::library::captcha::CaptchaChallenge;

// Application-wide error type
#[derive(Debug)]
pub enum AppError {
    DatabaseError(String),
    ValidationError(String),
    /// Field-level validation failure. `need_captcha` tells the client whether
    /// the next attempt at the same action must carry a captcha.
    FieldValidation {
        errors: BTreeMap<String, String>,
        need_captcha: bool,
        captcha: Option<CaptchaChallenge>,
    },
    AuthError(String),
    Forbidden(String),
    NotFound(String),
    InternalError(String),
}

impl AppError {
    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), message.to_string());
        AppError::FieldValidation { errors, need_captcha: false, captcha: None }
    }

    pub fn need_captcha(&self) -> bool {
        matches!(self, AppError::FieldValidation { need_captcha: true, .. })
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::FieldValidation { errors, .. } => {
                let fields: Vec<String> = errors
                    .iter()
                    .map(|(field, msg)| format!("{}: {}", field, msg))
                    .collect();
                write!(f, "Field validation failed: {}", fields.join(", "))
            }
            AppError::AuthError(msg) => write!(f, "Authentication error: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::DatabaseError(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::FieldValidation { errors, need_captcha, captcha } => {
                let status = StatusCode::BAD_REQUEST;
                let mut body = json!({
                    "error": "Field validation failed",
                    "status": status.as_u16(),
                    "errors": errors,
                    "need_captcha": need_captcha,
                });
                if let Some(challenge) = captcha {
                    body["captcha"] = json!(challenge);
                }
                return (status, Json(body)).into_response();
            }
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

// Convenient Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;
