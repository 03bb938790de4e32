//! # HTTP API
//!
//! axum router exposing the machine registry and machine-state log under
//! `/api/v1`, the WebSocket event feed under `/ws`, and the static front
//! end for every other path.
//!
//! Every successful mutation is broadcast to WebSocket observers as an
//! [`Emission`].

mod handlers;
mod ws;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use mesito_core::{Emission, Error, RedbStore, Rejection, StoreError};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Number of emissions buffered for slow observers.
pub const EVENT_CAPACITY: usize = 256;

// =============================================================================
// STATE
// =============================================================================

/// Shared state of the request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RedbStore>,
    pub events: broadcast::Sender<Emission>,
}

impl AppState {
    /// Wrap the store and open the event channel.
    pub fn new(store: RedbStore) -> Self {
        Self::with_capacity(store, EVENT_CAPACITY)
    }

    /// Like [`AppState::new`], buffering `capacity` emissions per observer.
    pub fn with_capacity(store: RedbStore, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            store: Arc::new(store),
            events,
        }
    }

    /// Broadcast an emission to every connected observer.
    pub fn emit(&self, emission: Emission) {
        let event = emission.name();
        match self.events.send(emission) {
            Ok(observers) => tracing::debug!(event, observers, "Emitted"),
            Err(_) => tracing::trace!(event, "No observers"),
        }
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Options of the router that come from the command line.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Allow cross-origin requests from any origin.
    pub cors_allowed_all_origins: bool,
    /// Directory served for every path outside the API.
    pub static_dir: PathBuf,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            cors_allowed_all_origins: false,
            static_dir: PathBuf::from("static"),
        }
    }
}

/// Build the application router.
pub fn create_router(state: AppState, options: &RouterOptions) -> Router {
    let api_v1 = Router::new()
        .route("/machine", post(handlers::post_machine))
        .route(
            "/machine/{id}",
            patch(handlers::patch_machine).delete(handlers::delete_machine),
        )
        .route("/put_machine", post(handlers::put_machine))
        .route("/machines", get(handlers::machines).post(handlers::machines))
        .route("/put_machine_state", post(handlers::put_machine_state));

    let cors = options
        .cors_allowed_all_origins
        .then(CorsLayer::permissive);

    Router::new()
        .nest("/api/v1", api_v1)
        .route("/ws", get(ws::handler))
        .fallback_service(ServeDir::new(&options.static_dir))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .option_layer(cors),
        )
}

/// Serve the router until SIGINT or SIGTERM.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received signal: SIGINT"),
        () = terminate => tracing::info!("Received signal: SIGTERM"),
    }
    tracing::info!("Signalling the server to shut down...");
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by the handlers.
///
/// Rejections are answered with 400 and their `{"what", "why"}` body;
/// storage failures with 500.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        Self(Error::Rejected(rejection))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(Error::Store(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::Rejected(rejection) => {
                tracing::info!(%rejection, "Request rejected");
                (StatusCode::BAD_REQUEST, Json(rejection)).into_response()
            }
            Error::Store(err) => {
                tracing::error!(error = %err, "Storage failure");
                let body = json!({"what": "InternalError", "why": err.to_string()});
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
