// backend/tests/helpers.rs
#![allow(dead_code)]

use common::{Credentials, Registration, TokenPair};
use mototaxi_api::{
    config::{AppConfig, AuthConfig, DatabaseConfig, WebConfig},
    db,
    web_server::AppState,
};
use reqwest::StatusCode;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use tokio::net::TcpListener;

pub const TEST_JWT_SECRET: &str = "test-secret";
pub const TEST_USERNAME: &str = "operador";
pub const TEST_PASSWORD: &str = "password123";

pub fn test_config(port: u16, require_auth: bool) -> AppConfig {
    AppConfig {
        web: WebConfig {
            addr: "127.0.0.1".to_string(),
            port,
            cors_origin: "http://localhost:5173".to_string(),
            static_dir: None,
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        auth: AuthConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            access_token_expires_minutes: 5,
            refresh_token_expires_days: 1,
            // bcrypt's minimum cost keeps the suite fast
            bcrypt_cost: 4,
            require_auth,
        },
    }
}

/// In-memory database with migrations applied. A single connection that is
/// never recycled, since every new SQLite memory connection is a new database.
pub async fn test_pool() -> SqlitePool {
    let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_options)
        .await
        .expect("Failed to create in-memory database pool.");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run migrations on test database.");

    db_pool
}

/// Spawn a test server and return the address, a reqwest client and the pool.
pub async fn spawn_app() -> (SocketAddr, reqwest::Client, SqlitePool) {
    spawn_app_with_auth(false).await
}

pub async fn spawn_app_with_auth(require_auth: bool) -> (SocketAddr, reqwest::Client, SqlitePool) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let db_pool = test_pool().await;
    let app_state = AppState {
        db_pool: db_pool.clone(),
        app_config: test_config(addr.port(), require_auth),
    };

    let app = mototaxi_api::web_server::create_router(app_state);

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    (addr, client, db_pool)
}

/// Registers the default test account and logs it in, returning both tokens.
pub async fn login(addr: &SocketAddr, client: &reqwest::Client) -> TokenPair {
    let registration = Registration {
        username: TEST_USERNAME.to_string().into(),
        password: TEST_PASSWORD.to_string().into(),
    };
    let res = client
        .post(format!("http://{addr}/api/register/"))
        .json(&registration)
        .send()
        .await
        .expect("Failed to register user");
    assert_eq!(res.status(), StatusCode::CREATED, "Registration failed");

    let response = client
        .post(format!("http://{addr}/api/token/"))
        .json(&Credentials::new(TEST_USERNAME, TEST_PASSWORD))
        .send()
        .await
        .expect("Failed to obtain token");
    assert_eq!(response.status(), StatusCode::OK, "Token request did not return 200 OK");

    response.json().await.expect("Failed to parse token pair")
}
