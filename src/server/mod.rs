//! HTTP server: router, shared state and the serve loop.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ParseConfig;
use crate::keys::KeyStore;
use crate::metrics::ParseTracker;
use crate::pipeline;

/// PDFs routinely run to tens of megabytes; anything larger than this is
/// almost certainly not a document upload.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

struct StateInner {
    keys: KeyStore,
    defaults: ParseConfig,
    tracker: ParseTracker,
    http: reqwest::Client,
    library_available: bool,
    max_upload_bytes: usize,
}

impl AppState {
    /// Build state from resolved keys and server-wide parse defaults.
    ///
    /// Probes pdfium availability once at startup; the health endpoint
    /// reports the result.
    pub fn new(keys: KeyStore, defaults: ParseConfig) -> Self {
        let library_available = pipeline::pdfium_available();
        if !library_available {
            tracing::warn!("pdfium library not found; parsing requests will fail until it is installed");
        }
        Self {
            inner: Arc::new(StateInner {
                keys,
                defaults,
                tracker: ParseTracker::new(),
                http: reqwest::Client::new(),
                library_available,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            }),
        }
    }

    pub fn keys(&self) -> &KeyStore {
        &self.inner.keys
    }

    pub fn defaults(&self) -> &ParseConfig {
        &self.inner.defaults
    }

    pub fn tracker(&self) -> &ParseTracker {
        &self.inner.tracker
    }

    pub fn http(&self) -> reqwest::Client {
        self.inner.http.clone()
    }

    pub fn library_available(&self) -> bool {
        self.inner.library_available
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.inner.max_upload_bytes
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.max_upload_bytes();

    Router::new()
        .route("/", get(handlers::index))
        .route("/health-check/", get(handlers::health_check))
        .route("/api/info", get(handlers::api_info))
        .route("/metrics/", get(handlers::metrics))
        .route("/parse/", post(handlers::parse_basic))
        .route("/parse-smart/", post(handlers::parse_smart))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until SIGINT/SIGTERM.
pub async fn run(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);

    info!("pdf-parser-pro listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            tracing::error!("failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("received SIGTERM, starting graceful shutdown");
        },
    }
}
