//! Generic CRUD over one entity table.
//!
//! Each entity implements [`Resource`] against an explicit pool; the handlers
//! below are instantiated once per entity by [`routes`], which mounts
//!
//! - `GET/POST /{collection}/`
//! - `GET/PUT/PATCH/DELETE /{collection}/{id}/`

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use common::{FieldRules, WriteMode};
use serde::{de::DeserializeOwned, Serialize};

use crate::db::DbPool;
use crate::error::AppError;
use crate::extractors::{ApiJson, RecordId};
use crate::web_server::AppState;

#[async_trait]
pub trait Resource: Serialize + Send + Sync + Sized + 'static {
    /// Body accepted by create and update.
    type Payload: DeserializeOwned + FieldRules + Send + Sync + 'static;

    /// URL segment, e.g. `usuarios`.
    const COLLECTION: &'static str;

    async fn list(pool: &DbPool) -> Result<Vec<Self>, AppError>;

    async fn fetch(pool: &DbPool, id: i64) -> Result<Option<Self>, AppError>;

    /// Stores a payload that already passed [`FieldRules::clean`] in full mode.
    async fn insert(pool: &DbPool, payload: Self::Payload) -> Result<Self, AppError>;

    /// Overwrites the fields present in `payload`; absent fields keep their values.
    async fn update(pool: &DbPool, id: i64, payload: Self::Payload) -> Result<Self, AppError>;

    /// Returns `false` when no row had that id.
    async fn delete(pool: &DbPool, id: i64) -> Result<bool, AppError>;
}

pub fn routes<R: Resource>() -> Router<AppState> {
    let collection = format!("/{}/", R::COLLECTION);
    let item = format!("/{}/{{id}}/", R::COLLECTION);

    Router::new()
        .route(&collection, get(list::<R>).post(create::<R>))
        .route(
            &item,
            get(retrieve::<R>)
                .put(replace::<R>)
                .patch(modify::<R>)
                .delete(destroy::<R>),
        )
}

async fn list<R: Resource>(State(state): State<AppState>) -> Result<Json<Vec<R>>, AppError> {
    tracing::info!("Listing {}", R::COLLECTION);
    let records = R::list(&state.db_pool).await?;
    Ok(Json(records))
}

async fn retrieve<R: Resource>(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<R>, AppError> {
    tracing::info!("Fetching {} {}", R::COLLECTION, id);
    R::fetch(&state.db_pool, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn create<R: Resource>(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<R::Payload>,
) -> Result<(StatusCode, Json<R>), AppError> {
    payload.clean(WriteMode::Full)?;
    let record = R::insert(&state.db_pool, payload).await?;
    tracing::info!("Created record in {}", R::COLLECTION);
    Ok((StatusCode::CREATED, Json(record)))
}

async fn replace<R: Resource>(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    ApiJson(payload): ApiJson<R::Payload>,
) -> Result<Json<R>, AppError> {
    apply_update(&state.db_pool, id, payload, WriteMode::Full).await
}

async fn modify<R: Resource>(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    ApiJson(payload): ApiJson<R::Payload>,
) -> Result<Json<R>, AppError> {
    apply_update(&state.db_pool, id, payload, WriteMode::Partial).await
}

async fn apply_update<R: Resource>(
    pool: &DbPool,
    id: i64,
    payload: R::Payload,
    mode: WriteMode,
) -> Result<Json<R>, AppError> {
    tracing::info!("Updating {} {} ({:?})", R::COLLECTION, id, mode);
    // A missing record wins over a bad body.
    if R::fetch(pool, id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    payload.clean(mode)?;
    let record = R::update(pool, id, payload).await?;
    Ok(Json(record))
}

async fn destroy<R: Resource>(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<StatusCode, AppError> {
    tracing::info!("Deleting {} {}", R::COLLECTION, id);
    if R::delete(&state.db_pool, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
