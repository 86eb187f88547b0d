use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::auth;
use crate::auth::JwtKeys;
use crate::config::Config;
use crate::db;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jwt: JwtKeys,
    pub cookie_key: Key,
    /// Mark session cookies `Secure`; on in production only.
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(db: SqlitePool, jwt: JwtKeys, cookie_key: Key, secure_cookies: bool) -> Self {
        Self {
            db,
            jwt,
            cookie_key,
            secure_cookies,
        }
    }

    pub fn from_config(db: SqlitePool, config: &Config) -> Self {
        Self::new(
            db,
            JwtKeys::new(config.jwt_secret.as_bytes(), config.jwt_lifetime),
            Key::derive_from(config.cookie_secret.as_bytes()),
            config.is_production(),
        )
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to open database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// API routes without transport layers. Integration tests drive this.
pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/user", get(auth::current_user));

    let api = Router::new()
        .nest("/v1/auth", auth_routes)
        .fallback(route_not_found);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api)
        .with_state(state)
}

/// The full application: API, optional client bundle, CORS and tracing.
pub fn app(state: AppState, config: &Config) -> Router {
    let mut app = router(state);

    if let Some(dir) = &config.static_dir {
        // Client-side routes resolve to the bundle's entry point.
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).fallback(index));
    }

    app.layer(cors_layer(config.client_origin.clone(), config.is_production()))
        .layer(TraceLayer::new_for_http())
}

/// Credentialed CORS. Without a configured origin, development mirrors the
/// caller's origin so a dev client on another port still gets the cookie;
/// production grants nothing cross-origin.
fn cors_layer(origin: Option<HeaderValue>, production: bool) -> CorsLayer {
    let allow_origin = match origin {
        Some(origin) => AllowOrigin::list([origin]),
        None if production => return CorsLayer::new(),
        None => AllowOrigin::mirror_request(),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route does not exist".to_owned())
}

pub async fn start_server(config: Config) -> Result<(), ServerError> {
    let pool = db::connect(&config.database_url).await?;
    let state = AppState::from_config(pool, &config);
    let app = app(state, &config);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, production = config.is_production(), "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM. A signal that cannot be
/// installed never resolves, so the other one still shuts the server down.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
