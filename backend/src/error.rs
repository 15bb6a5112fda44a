use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use validator::ValidationErrors;

// Define a custom error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    #[error("Database error")]
    DatabaseError(sqlx::Error),

    #[error("Authentication error")]
    JwtError(jsonwebtoken::errors::Error),

    #[error("Authentication error")]
    PasswordError(bcrypt::BcryptError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    Conflict(String),

    #[error("No active account found with the given credentials")]
    Unauthorized,

    #[error("Authentication credentials were not provided.")]
    MissingCredentials,

    #[error("Token is invalid or expired")]
    InvalidToken,

    #[error("Not found.")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(ValidationErrors),
}

/// Flattens validator output into `{"field": ["message", ...]}`.
pub fn field_messages(errors: &ValidationErrors) -> Map<String, Value> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages: Vec<String> = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => e.code.to_string(),
                })
                .collect();
            (field.to_string(), json!(messages))
        })
        .collect()
}

fn unauthorized(detail: Value) -> Response {
    let mut response = (StatusCode::UNAUTHORIZED, Json(detail)).into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer realm=\"api\""),
    );
    response
}

// Implement IntoResponse to convert AppError into an HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::JwtError(e) => {
                tracing::warn!("JWT error: {}", e);
                return unauthorized(json!({
                    "detail": "Token is invalid or expired",
                    "code": "token_not_valid",
                }));
            }
            AppError::PasswordError(e) => {
                tracing::warn!("Password error: {}", e);
                return unauthorized(json!({
                    "detail": "No active account found with the given credentials",
                }));
            }
            AppError::InvalidToken => {
                return unauthorized(json!({
                    "detail": "Token is invalid or expired",
                    "code": "token_not_valid",
                }));
            }
            err @ (AppError::Unauthorized | AppError::MissingCredentials) => {
                return unauthorized(json!({ "detail": err.to_string() }));
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::UnsupportedMediaType(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found.".to_string()),
            AppError::ValidationError(errors) => {
                // Field-keyed body, one list of messages per offending field.
                return (
                    StatusCode::BAD_REQUEST,
                    Json(Value::Object(field_messages(&errors))),
                )
                    .into_response();
            }
        };

        let body = Json(json!({ "detail": detail }));
        (status, body).into_response()
    }
}

/// True when the database rejected a write because a referenced row is missing.
pub fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}

/// True when the database rejected a write because of a UNIQUE constraint.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

// Add From implementations for easy '?' conversion in handlers
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::DatabaseError(e)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::ValidationError(errors)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AppError::JwtError(e)
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::PasswordError(e)
    }
}
