//! Span annotation for webhook requests.
//!
//! The handler reports handshake metadata through [`SpanAttributes`] rather
//! than touching the global span directly, so it runs the same with or
//! without a tracing subscriber installed.

use std::sync::Arc;

use axum::http::Request;
use tower_http::trace::MakeSpan;
use tracing::{field::Empty, Span};

/// Span field names recorded during the verification handshake.
pub const MODE_FIELD: &str = "mode";
pub const LEASE_SECONDS_FIELD: &str = "lease_seconds";
pub const CHANNEL_ID_FIELD: &str = "channel_id";

/// Sink for string attributes on the current request span.
pub trait SpanAttributes: Send + Sync {
    fn set_attribute(&self, key: &'static str, value: &str);
}

/// Drops every attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAttributes;

impl SpanAttributes for NoopAttributes {
    fn set_attribute(&self, _key: &'static str, _value: &str) {}
}

/// Records attributes on `Span::current()`.
///
/// Only fields declared when the span was created are kept, which is what
/// [`RequestSpan`] is for. Outside any span this does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAttributes;

impl SpanAttributes for TracingAttributes {
    fn set_attribute(&self, key: &'static str, value: &str) {
        Span::current().record(key, value);
    }
}

/// `MakeSpan` for the HTTP trace layer, pre-declaring the handshake fields.
#[derive(Debug, Clone)]
pub struct RequestSpan {
    service: Arc<str>,
}

impl RequestSpan {
    pub fn new(service: impl Into<Arc<str>>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "webhook_request",
            service = %self.service,
            method = %request.method(),
            path = %request.uri().path(),
            mode = Empty,
            lease_seconds = Empty,
            channel_id = Empty,
        )
    }
}
