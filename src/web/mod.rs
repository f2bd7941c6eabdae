//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::error::BatteryError;
use crate::telemetry::TelemetryEngine;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub engine: Arc<TelemetryEngine>,
}

/// HTTP API for the battery manager.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, engine: Arc<TelemetryEngine>) -> Self {
        Self {
            state: AppState { config, engine },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            // Devices
            .route(
                "/api/devices",
                get(handlers::handle_list_devices).post(handlers::handle_create_device),
            )
            .route(
                "/api/devices/{id}",
                get(handlers::handle_get_device).delete(handlers::handle_delete_device),
            )
            .route("/api/devices/{id}/offline", post(handlers::handle_mark_offline))
            .route(
                "/api/devices/{id}/readings",
                get(handlers::handle_list_readings).post(handlers::handle_ingest),
            )
            // Alerts
            .route("/api/alerts", get(handlers::handle_get_alerts))
            .route("/api/alerts/{id}/resolve", post(handlers::handle_resolve_alert))
            // Fleet
            .route("/api/status", get(handlers::handle_status))
            .route("/api/export", get(handlers::handle_export))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(64 * 1024))
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

impl IntoResponse for BatteryError {
    fn into_response(self) -> Response {
        let status = match &self {
            BatteryError::NotFound { .. } => StatusCode::NOT_FOUND,
            BatteryError::Conflict(_) => StatusCode::CONFLICT,
            BatteryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            BatteryError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status.is_server_error() {
            tracing::error!("API error: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
