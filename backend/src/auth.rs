use axum::{extract::State, http::StatusCode, Json};
use bcrypt::{hash, verify};
use common::{AccessToken, Account, Credentials, FieldRules, RefreshRequest, Registration, TokenPair, WriteMode};
use serde::{Deserialize, Serialize};

use base64::engine::{general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;

use axum::{extract::Request, middleware::Next, response::Response};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::config::AuthConfig;
use crate::db::DbPool;
use crate::error::{is_unique_violation, AppError};
use crate::extractors::ApiJson;
use crate::web_server::AppState;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const ACCESS_TOKEN_TYPE: &str = "access";

// --- User & Claims ---

#[derive(sqlx::FromRow, Debug)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: String,
    pub user_id: i64,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRecord {
    user_id: i64,
    expires_at: DateTime<Utc>,
    is_active: bool,
}

// --- Token helpers ---

fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Signs a short-lived access token for `user_id`.
pub fn issue_access_token(user_id: i64, config: &AuthConfig) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        token_type: ACCESS_TOKEN_TYPE.to_string(),
        user_id,
        exp: (now + Duration::minutes(config.access_token_expires_minutes)).timestamp() as usize,
        iat: now.timestamp() as usize,
        jti: Uuid::new_v4().simple().to_string(),
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?)
}

/// Creates an access token and a new refresh token for a user.
/// Only the SHA-256 of the refresh token is stored, one row per user, so a
/// fresh login invalidates the previous refresh token.
async fn issue_tokens(user_id: i64, db_pool: &DbPool, config: &AuthConfig) -> Result<TokenPair, AppError> {
    let access = issue_access_token(user_id, config)?;

    let mut refresh_token_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut refresh_token_bytes);
    let refresh = general_purpose::URL_SAFE_NO_PAD.encode(refresh_token_bytes);

    let refresh_hash = hash_refresh_token(&refresh);
    let expires_at = Utc::now() + Duration::days(config.refresh_token_expires_days);

    sqlx::query(
        "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)
         ON CONFLICT(user_id) DO UPDATE SET token_hash = excluded.token_hash, expires_at = excluded.expires_at",
    )
    .bind(user_id)
    .bind(&refresh_hash)
    .bind(expires_at)
    .execute(db_pool)
    .await?;

    Ok(TokenPair { access, refresh })
}

// --- API Handlers ---

/// ## Register an account
/// Hashes the password and stores the user; the account can then obtain tokens.
#[utoipa::path(
    post,
    path = "/api/register/",
    request_body = Registration,
    responses(
        (status = 201, description = "Account created", body = Account),
        (status = 400, description = "Invalid data provided"),
        (status = 409, description = "Username already taken"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<Registration>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    payload.clean(WriteMode::Full)?;
    let (Some(username), Some(password)) = (payload.username.into_value(), payload.password.into_value()) else {
        return Err(AppError::BadRequest("username and password are required".into()));
    };

    tracing::info!("Registering user: {}", username);
    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(&username)
        .fetch_optional(&state.db_pool)
        .await?;

    if existing.is_some() {
        return Err(username_taken());
    }

    let password_hash = hash(&password, state.app_config.auth.bcrypt_cost).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        AppError::InternalServerError("Password hashing error".to_string())
    })?;

    let account = insert_user(&state.db_pool, &username, &password_hash).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

fn username_taken() -> AppError {
    AppError::Conflict("A user with that username already exists.".to_string())
}

/// Stores an active account. A concurrent registration of the same name
/// loses on the UNIQUE constraint and is reported as a conflict.
async fn insert_user(db_pool: &DbPool, username: &str, password_hash: &str) -> Result<Account, AppError> {
    sqlx::query_as(
        "INSERT INTO users (username, password_hash, is_active, date_joined)
         VALUES ($1, $2, $3, $4)
         RETURNING id, username",
    )
    .bind(username)
    .bind(password_hash)
    .bind(true)
    .bind(Utc::now())
    .fetch_one(db_pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            username_taken()
        } else {
            e.into()
        }
    })
}

/// ## Obtain a token pair
/// Verifies username and password and returns an access/refresh pair.
#[utoipa::path(
    post,
    path = "/api/token/",
    request_body = Credentials,
    responses(
        (status = 200, description = "Credentials accepted", body = TokenPair),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "No active account found with the given credentials"),
    )
)]
pub async fn obtain_token(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<Credentials>,
) -> Result<Json<TokenPair>, AppError> {
    payload.clean(WriteMode::Full)?;
    let (Some(username), Some(password)) = (payload.username.into_value(), payload.password.into_value()) else {
        return Err(AppError::BadRequest("username and password are required".into()));
    };

    tracing::info!("Issuing tokens for user: {}", username);
    let user: User = sqlx::query_as(
        "SELECT id, username, password_hash, is_active FROM users WHERE username = $1",
    )
    .bind(&username)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    if !user.is_active || !verify(&password, &user.password_hash)? {
        tracing::warn!("Rejected credentials for user: {}", user.username);
        return Err(AppError::Unauthorized);
    }

    let tokens = issue_tokens(user.id, &state.db_pool, &state.app_config.auth).await?;

    Ok(Json(tokens))
}

/// ## Refresh the access token
/// Exchanges a live refresh token for a new access token.
#[utoipa::path(
    post,
    path = "/api/token/refresh/",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = AccessToken),
        (status = 401, description = "Token is invalid or expired"),
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<Json<AccessToken>, AppError> {
    payload.clean(WriteMode::Full)?;
    let incoming_hash = hash_refresh_token(payload.refresh.value().map(String::as_str).unwrap_or_default());

    let record: RefreshTokenRecord = sqlx::query_as(
        "SELECT t.user_id, t.expires_at, u.is_active
         FROM refresh_tokens t
         JOIN users u ON u.id = t.user_id
         WHERE t.token_hash = $1",
    )
    .bind(&incoming_hash)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or(AppError::InvalidToken)?;

    if record.expires_at < Utc::now() {
        // Expired tokens are never valid again.
        if let Err(e) = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(&incoming_hash)
            .execute(&state.db_pool)
            .await
        {
            tracing::warn!("Failed to remove expired refresh token: {}", e);
        }
        return Err(AppError::InvalidToken);
    }

    if !record.is_active {
        return Err(AppError::InvalidToken);
    }

    let access = issue_access_token(record.user_id, &state.app_config.auth)?;

    Ok(Json(AccessToken { access }))
}

// --- Middleware for JWT Authentication ---

pub async fn auth_middleware(
    State(state): State<AppState>,
    auth_header: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = auth_header
        .ok_or(AppError::MissingCredentials)?
        .token()
        .to_owned();

    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.app_config.auth.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::InvalidToken)?;

    if token_data.claims.token_type != ACCESS_TOKEN_TYPE {
        return Err(AppError::InvalidToken);
    }

    // Tokens outlive account changes; re-check the account on every request.
    let active: Option<(bool,)> = sqlx::query_as("SELECT is_active FROM users WHERE id = $1")
        .bind(token_data.claims.user_id)
        .fetch_optional(&state.db_pool)
        .await?;

    match active {
        Some((true,)) => {
            tracing::debug!("Authenticated request for user {}", token_data.claims.user_id);
            Ok(next.run(request).await)
        }
        _ => Err(AppError::InvalidToken),
    }
}
