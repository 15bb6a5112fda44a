use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use common::{Corrida, Motorista, Usuario};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::auth;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::resource;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub app_config: AppConfig,
}

#[derive(OpenApi)]
#[openapi(
    paths(auth::register, auth::obtain_token, auth::refresh_token),
    components(schemas(
        common::Usuario,
        common::Motorista,
        common::Corrida,
        common::UsuarioPayload,
        common::MotoristaPayload,
        common::CorridaPayload,
        common::Credentials,
        common::Registration,
        common::Account,
        common::TokenPair,
        common::RefreshRequest,
        common::AccessToken,
    ))
)]
pub struct ApiDoc;

pub async fn run_server(app_state: AppState) -> anyhow::Result<()> {
    let addr = format!(
        "{}:{}",
        app_state.app_config.web.addr, app_state.app_config.web.port
    );
    let app = create_router(app_state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Serving API at http://{}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Entity CRUD routes, one generic handler set per entity.
fn resource_routes() -> Router<AppState> {
    Router::new()
        .merge(resource::routes::<Usuario>())
        .merge(resource::routes::<Motorista>())
        .merge(resource::routes::<Corrida>())
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    match origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
            layer
        }
    }
}

pub fn create_router(app_state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register/", post(auth::register))
        .route("/token/", post(auth::obtain_token))
        .route("/token/refresh/", post(auth::refresh_token))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }));

    let mut entity_routes = resource_routes();
    if app_state.app_config.auth.require_auth {
        entity_routes = entity_routes.route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::auth_middleware,
        ));
    }

    let cors = cors_layer(&app_state.app_config.web.cors_origin);
    let static_dir = app_state.app_config.web.static_dir.clone();

    let mut app = Router::new()
        .nest("/api", auth_routes.merge(entity_routes))
        .with_state(app_state); // Provide state to all nested routes

    if let Some(dir) = static_dir {
        tracing::info!("Serving static files from {}", dir);
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
