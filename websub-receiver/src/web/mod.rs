//! Web server module for the WebSub subscriber endpoint.
//!
//! This module provides a thin web server that:
//! - Answers hub verification handshakes
//! - Streams pushed notifications straight into the object store
//! - Verifies delivery signatures when a secret is configured
//!
//! The XML payload is never parsed here.

pub mod handlers;
pub mod hub;
pub mod signature;

use axum::{
    routing::{any, get},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::normalize_path;
use crate::telemetry::RequestSpan;

pub use handlers::{health, webhook, AppState, HealthResponse, WebhookHandler};
pub use hub::{channel_id_from_topic, HandshakeError, VerificationRequest};
pub use signature::{is_signature_verification_enabled, verify_hub_signature};

/// Build the router serving the webhook and health endpoints.
pub fn router(state: AppState) -> Router {
    let webhook_path = normalize_path(&state.config.webhook_path).unwrap_or_else(|| {
        warn!(path = %state.config.webhook_path, "invalid_webhook_path");
        "/".to_string()
    });
    let service_name = state.config.service_name.clone();

    let mut app = Router::new();
    if webhook_path != "/health" {
        app = app.route("/health", get(health));
    }

    app.route(&webhook_path, any(webhook))
        .layer(TraceLayer::new_for_http().make_span_with(RequestSpan::new(service_name)))
        .with_state(state)
}
