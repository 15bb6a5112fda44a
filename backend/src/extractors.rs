use crate::error::AppError;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use common::utils::{add_error, json_kind};
use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::ValidationErrors;

/// Primary key taken from the `{id}` path segment.
///
/// Anything that is not an integer cannot name a stored row, so it is
/// reported as a missing record instead of a routing error.
#[derive(Clone, Copy, Debug)]
pub struct RecordId(pub i64);

impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound)?;

        raw.parse().map(RecordId).map_err(|_| AppError::NotFound)
    }
}

/// `Json` whose rejections come back as `AppError` JSON bodies rather than
/// axum's plain-text ones.
///
/// The body must be a JSON object. Field-level type problems are left to the
/// payload's [`Field`](common::utils::Field) members, so only malformed JSON
/// or a non-object body is rejected here.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value = match Json::<Value>::from_request(req, state).await {
            Ok(Json(value)) => value,
            Err(JsonRejection::MissingJsonContentType(rejection)) => {
                return Err(AppError::UnsupportedMediaType(rejection.body_text()))
            }
            Err(rejection) => {
                return Err(AppError::BadRequest(format!(
                    "JSON parse error - {}",
                    rejection.body_text()
                )))
            }
        };

        if !value.is_object() {
            let mut errors = ValidationErrors::new();
            add_error(
                &mut errors,
                "non_field_errors",
                "invalid",
                format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    json_kind(&value)
                ),
            );
            return Err(errors.into());
        }

        serde_json::from_value(value)
            .map(ApiJson)
            .map_err(|e| AppError::BadRequest(format!("JSON parse error - {e}")))
    }
}
