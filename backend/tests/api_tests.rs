#![cfg(feature = "db-sqlite")]

use chrono::{Duration, Utc};
use common::{Credentials, TokenPair};
use jsonwebtoken::{encode, EncodingKey, Header};
use mototaxi_api::auth::Claims;
use once_cell::sync::Lazy;
use reqwest::StatusCode;
use serde_json::{json, Value};

mod helpers;
use crate::helpers::{TEST_JWT_SECRET, TEST_PASSWORD, TEST_USERNAME};

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();
});

#[tokio::test]
async fn test_register_and_obtain_token_pair() {
    Lazy::force(&TRACING);
    let (addr, client, _db_pool) = helpers::spawn_app().await;

    let response = client
        .post(format!("http://{addr}/api/register/"))
        .json(&json!({ "username": "ana", "password": "senha-segura" }))
        .send()
        .await
        .expect("Failed to execute register request.");
    assert_eq!(response.status(), StatusCode::CREATED);
    let account: Value = response.json().await.unwrap();
    assert_eq!(account["username"], json!("ana"));
    assert!(account.get("password").is_none());
    assert!(account.get("password_hash").is_none());

    // Same username again
    let response = client
        .post(format!("http://{addr}/api/register/"))
        .json(&json!({ "username": "ana", "password": "outra-senha" }))
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.status(),
        StatusCode::CONFLICT,
        "Should fail with conflict when registering existing user"
    );

    let response = client
        .post(format!("http://{addr}/api/token/"))
        .json(&Credentials::new("ana", "senha-segura"))
        .send()
        .await
        .expect("Failed to execute token request.");
    assert_eq!(response.status(), StatusCode::OK);
    let tokens: TokenPair = response.json().await.unwrap();
    assert!(!tokens.access.is_empty());
    assert!(!tokens.refresh.is_empty());
}

#[tokio::test]
async fn test_register_validation() {
    Lazy::force(&TRACING);
    let (addr, client, _db_pool) = helpers::spawn_app().await;

    let response = client
        .post(format!("http://{addr}/api/register/"))
        .json(&json!({ "username": "ana", "password": "short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "password": ["Ensure this field has at least 8 characters."] })
    );
}

#[tokio::test]
async fn test_obtain_token_failures() {
    Lazy::force(&TRACING);
    let (addr, client, _db_pool) = helpers::spawn_app().await;
    helpers::login(&addr, &client).await;
    let url = format!("http://{addr}/api/token/");

    // Wrong password
    let response = client
        .post(&url)
        .json(&Credentials::new(TEST_USERNAME, "wrongpassword"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "detail": "No active account found with the given credentials" })
    );

    // Unknown user
    let response = client
        .post(&url)
        .json(&Credentials::new("ninguem", TEST_PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Missing password
    let response = client
        .post(&url)
        .json(&json!({ "username": TEST_USERNAME }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "password": ["This field is required."] }));
}

#[tokio::test]
async fn test_inactive_account_cannot_obtain_tokens() {
    Lazy::force(&TRACING);
    let (addr, client, db_pool) = helpers::spawn_app().await;
    helpers::login(&addr, &client).await;

    sqlx::query("UPDATE users SET is_active = $1 WHERE username = $2")
        .bind(false)
        .bind(TEST_USERNAME)
        .execute(&db_pool)
        .await
        .unwrap();

    let response = client
        .post(format!("http://{addr}/api/token/"))
        .json(&Credentials::new(TEST_USERNAME, TEST_PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_refresh() {
    Lazy::force(&TRACING);
    let (addr, client, _db_pool) = helpers::spawn_app().await;
    let tokens = helpers::login(&addr, &client).await;
    let refresh_url = format!("http://{addr}/api/token/refresh/");

    let response = client
        .post(&refresh_url)
        .json(&json!({ "refresh": tokens.refresh }))
        .send()
        .await
        .expect("Failed to execute refresh request.");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let access = body["access"].as_str().expect("access token in body");
    assert!(!access.is_empty());
    assert_ne!(access, tokens.access, "Each access token carries its own jti");
    assert!(body.get("refresh").is_none());

    // The refresh token stays valid until it expires
    let response = client
        .post(&refresh_url)
        .json(&json!({ "refresh": tokens.refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Unknown token
    let response = client
        .post(&refresh_url)
        .json(&json!({ "refresh": "invalid-token-string" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], json!("token_not_valid"));

    // Missing field
    let response = client
        .post(&refresh_url)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_new_login_replaces_refresh_token() {
    Lazy::force(&TRACING);
    let (addr, client, _db_pool) = helpers::spawn_app().await;
    let first = helpers::login(&addr, &client).await;

    let response = client
        .post(format!("http://{addr}/api/token/"))
        .json(&Credentials::new(TEST_USERNAME, TEST_PASSWORD))
        .send()
        .await
        .unwrap();
    let second: TokenPair = response.json().await.unwrap();
    assert_ne!(first.refresh, second.refresh);

    let refresh_url = format!("http://{addr}/api/token/refresh/");
    let response = client
        .post(&refresh_url)
        .json(&json!({ "refresh": first.refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(&refresh_url)
        .json(&json!({ "refresh": second.refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_refresh_token_is_rejected_and_removed() {
    Lazy::force(&TRACING);
    let (addr, client, db_pool) = helpers::spawn_app().await;
    let tokens = helpers::login(&addr, &client).await;

    sqlx::query("UPDATE refresh_tokens SET expires_at = $1")
        .bind(Utc::now() - Duration::hours(1))
        .execute(&db_pool)
        .await
        .unwrap();

    let response = client
        .post(format!("http://{addr}/api/token/refresh/"))
        .json(&json!({ "refresh": tokens.refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens")
        .fetch_one(&db_pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_entity_routes_are_open_by_default() {
    Lazy::force(&TRACING);
    let (addr, client, _db_pool) = helpers::spawn_app().await;

    let response = client
        .get(format!("http://{addr}/api/motoristas/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_auth() {
    Lazy::force(&TRACING);
    let (addr, client, _db_pool) = helpers::spawn_app_with_auth(true).await;

    let routes = vec![
        (reqwest::Method::GET, format!("http://{addr}/api/usuarios/")),
        (reqwest::Method::POST, format!("http://{addr}/api/usuarios/")),
        (reqwest::Method::GET, format!("http://{addr}/api/motoristas/1/")),
        (reqwest::Method::PUT, format!("http://{addr}/api/motoristas/1/")),
        (reqwest::Method::PATCH, format!("http://{addr}/api/corridas/1/")),
        (reqwest::Method::DELETE, format!("http://{addr}/api/corridas/1/")),
    ];

    for (method, url) in routes {
        let response = client.request(method.clone(), &url).send().await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{method} {url} should be protected and return 401 without auth"
        );
        assert!(response.headers().contains_key("www-authenticate"));
    }

    // Token endpoints stay reachable
    let tokens = helpers::login(&addr, &client).await;

    let response = client
        .get(format!("http://{addr}/api/usuarios/"))
        .bearer_auth(&tokens.access)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(format!("http://{addr}/api/usuarios/"))
        .bearer_auth(&tokens.access)
        .json(&json!({ "nome": "Carla", "telefone": "11999990000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_invalid_and_expired_tokens() {
    Lazy::force(&TRACING);
    let (addr, client, _db_pool) = helpers::spawn_app_with_auth(true).await;
    let protected_url = format!("http://{addr}/api/corridas/");

    // Malformed token
    let response = client
        .get(&protected_url)
        .bearer_auth("this-is-not-a-valid-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], json!("token_not_valid"));

    // Valid signature, but expired
    helpers::login(&addr, &client).await;
    let now = Utc::now();
    let expired = Claims {
        token_type: "access".to_string(),
        user_id: 1,
        exp: (now - Duration::seconds(30)).timestamp() as usize,
        iat: (now - Duration::minutes(10)).timestamp() as usize,
        jti: "expired".to_string(),
    };
    let secret = EncodingKey::from_secret(TEST_JWT_SECRET.as_ref());
    let expired_token = encode(&Header::default(), &expired, &secret).unwrap();

    let response = client
        .get(&protected_url)
        .bearer_auth(expired_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "Should reject an expired JWT");

    // Valid, but for an account that does not exist
    let ghost = Claims {
        token_type: "access".to_string(),
        user_id: 999,
        exp: (now + Duration::minutes(5)).timestamp() as usize,
        iat: now.timestamp() as usize,
        jti: "ghost".to_string(),
    };
    let ghost_token = encode(&Header::default(), &ghost, &secret).unwrap();
    let response = client
        .get(&protected_url)
        .bearer_auth(ghost_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Signed with another secret
    let forged = Claims {
        token_type: "access".to_string(),
        user_id: 1,
        exp: (now + Duration::minutes(5)).timestamp() as usize,
        iat: now.timestamp() as usize,
        jti: "forged".to_string(),
    };
    let forged_token = encode(
        &Header::default(),
        &forged,
        &EncodingKey::from_secret(b"another-secret"),
    )
    .unwrap();
    let response = client
        .get(&protected_url)
        .bearer_auth(forged_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
