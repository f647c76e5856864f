//! Webhook endpoint handlers.
//!
//! A single route serves the whole WebSub subscriber surface:
//! 1. GET answers the hub's verification handshake by echoing `hub.challenge`
//! 2. POST streams the notification body into the object store
//! 3. Anything else is rejected with 405
//!
//! Failure responses never carry a body.

use std::io;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::storage::{payload_from_bytes, ObjectStore, PayloadStream, StorageKey};
use crate::telemetry::{
    NoopAttributes, SpanAttributes, TracingAttributes, CHANNEL_ID_FIELD, LEASE_SECONDS_FIELD,
    MODE_FIELD,
};
use crate::web::hub::VerificationRequest;
use crate::web::signature::{
    is_signature_verification_enabled, verify_hub_signature, SIGNATURE_HEADER,
};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub handler: Arc<WebhookHandler>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ObjectStore>) -> Self {
        let handler = WebhookHandler::new(store)
            .with_attributes(Arc::new(TracingAttributes))
            .with_secret(config.websub_secret.clone(), config.max_signed_body_bytes);

        Self {
            config: Arc::new(config),
            handler: Arc::new(handler),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// WebSub Webhook
// =============================================================================

/// WebSub webhook endpoint.
pub async fn webhook(State(state): State<AppState>, request: Request) -> Response {
    state.handler.handle(request).await
}

/// Stateless dispatcher for subscriber requests.
///
/// Holds no per-request state; one instance serves every request
/// concurrently.
pub struct WebhookHandler {
    store: Arc<dyn ObjectStore>,
    attributes: Arc<dyn SpanAttributes>,
    secret: Option<String>,
    max_signed_body_bytes: usize,
}

impl WebhookHandler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            attributes: Arc::new(NoopAttributes),
            secret: None,
            max_signed_body_bytes: Config::default().max_signed_body_bytes,
        }
    }

    pub fn with_attributes(mut self, attributes: Arc<dyn SpanAttributes>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Require `X-Hub-Signature` on deliveries. Blank secrets are ignored.
    pub fn with_secret(mut self, secret: Option<String>, max_signed_body_bytes: usize) -> Self {
        self.secret = if is_signature_verification_enabled(&secret) {
            secret
        } else {
            None
        };
        self.max_signed_body_bytes = max_signed_body_bytes;
        self
    }

    pub async fn handle(&self, request: Request) -> Response {
        let method = request.method().clone();
        match method {
            Method::GET => self.verify(request.uri().query()),
            Method::POST => self.ingest(request).await,
            _ => {
                debug!(method = %method, "webhook_method_not_allowed");
                StatusCode::METHOD_NOT_ALLOWED.into_response()
            }
        }
    }

    /// Answer the verification handshake.
    pub fn verify(&self, query: Option<&str>) -> Response {
        let request = match VerificationRequest::from_query(query) {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "subscription_verification_rejected");
                return StatusCode::BAD_REQUEST.into_response();
            }
        };

        let channel_id = request.channel_id();

        self.attributes.set_attribute(MODE_FIELD, &request.mode);
        self.attributes
            .set_attribute(LEASE_SECONDS_FIELD, &request.lease_seconds);
        self.attributes.set_attribute(CHANNEL_ID_FIELD, &channel_id);

        info!(
            mode = %request.mode,
            lease_seconds = %request.lease_seconds,
            channel_id = %channel_id,
            "subscription_verified"
        );

        (StatusCode::OK, request.challenge).into_response()
    }

    /// Persist a content notification under a fresh key.
    async fn ingest(&self, request: Request) -> Response {
        let payload = match &self.secret {
            None => stream_body(request.into_body()),
            Some(secret) => {
                let (parts, body) = request.into_parts();

                let bytes = match buffer_body(body, self.max_signed_body_bytes).await {
                    Ok(b) => b,
                    Err(status) => return status.into_response(),
                };

                let header = parts
                    .headers
                    .get(SIGNATURE_HEADER)
                    .and_then(|v| v.to_str().ok());

                if !verify_hub_signature(secret, &bytes, header) {
                    // Acknowledge anyway so the hub does not learn the result.
                    warn!(body_length = bytes.len(), "notification_signature_rejected");
                    return StatusCode::OK.into_response();
                }

                payload_from_bytes(bytes)
            }
        };

        let key = StorageKey::generate();

        match self.store.put(&key, payload).await {
            Ok(object) => {
                info!(key = %object.key, size = ?object.size, "notification_stored");
                StatusCode::OK.into_response()
            }
            Err(e) => {
                error!(key = %key, error = %e, "notification_store_failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

fn stream_body(body: Body) -> PayloadStream {
    Box::pin(body.into_data_stream().map_err(io::Error::other))
}

/// Collect a body up to `limit` bytes.
async fn buffer_body(body: Body, limit: usize) -> Result<Bytes, StatusCode> {
    let mut stream = body.into_data_stream();
    let mut buffer = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            warn!(error = %e, "notification_body_read_failed");
            StatusCode::BAD_REQUEST
        })?;

        if buffer.len() + chunk.len() > limit {
            warn!(limit = limit, "notification_body_too_large");
            return Err(StatusCode::PAYLOAD_TOO_LARGE);
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StoreError, StoredObject};
    use crate::web::signature::sign;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FailingStore;

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn put(
            &self,
            _key: &StorageKey,
            _body: PayloadStream,
        ) -> Result<StoredObject, StoreError> {
            Err(StoreError::Rejected { status: 503 })
        }
    }

    #[derive(Default)]
    struct RecordingAttributes(Mutex<Vec<(&'static str, String)>>);

    impl SpanAttributes for RecordingAttributes {
        fn set_attribute(&self, key: &'static str, value: &str) {
            self.0.lock().unwrap().push((key, value.to_string()));
        }
    }

    fn request(method: Method, uri: &str, body: impl Into<Body>) -> Request {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(body.into())
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_echoes_challenge() {
        let handler = WebhookHandler::new(Arc::new(MemoryStore::new()));

        let response = handler
            .handle(request(
                Method::GET,
                "/?hub.mode=subscribe&hub.challenge=1234567890abcdef&hub.lease_seconds=432000",
                Body::empty(),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&body_bytes(response).await[..], b"1234567890abcdef");
    }

    #[tokio::test]
    async fn test_get_without_challenge_is_bad_request() {
        let handler = WebhookHandler::new(Arc::new(MemoryStore::new()));

        for uri in ["/", "/?hub.mode=subscribe", "/?hub.challenge=&hub.mode=subscribe"] {
            let response = handler.handle(request(Method::GET, uri, Body::empty())).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri: {}", uri);
            assert!(body_bytes(response).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_get_records_handshake_attributes() {
        let attributes = Arc::new(RecordingAttributes::default());
        let handler = WebhookHandler::new(Arc::new(MemoryStore::new()))
            .with_attributes(attributes.clone());

        let response = handler
            .handle(request(
                Method::GET,
                "/?hub.challenge=c&hub.mode=subscribe&hub.lease_seconds=3600\
                 &hub.topic=https%3A%2F%2Fexample.com%2Ffeed%3Fchannel_id%3DABC123",
                Body::empty(),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let recorded = attributes.0.lock().unwrap().clone();
        assert_eq!(
            recorded,
            vec![
                (MODE_FIELD, "subscribe".to_string()),
                (LEASE_SECONDS_FIELD, "3600".to_string()),
                (CHANNEL_ID_FIELD, "ABC123".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_get_with_invalid_topic_still_succeeds() {
        let attributes = Arc::new(RecordingAttributes::default());
        let handler = WebhookHandler::new(Arc::new(MemoryStore::new()))
            .with_attributes(attributes.clone());

        let response = handler
            .handle(request(
                Method::GET,
                "/?hub.challenge=ok&hub.topic=not%20a%20url",
                Body::empty(),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&body_bytes(response).await[..], b"ok");

        let recorded = attributes.0.lock().unwrap().clone();
        assert!(recorded.contains(&(CHANNEL_ID_FIELD, String::new())));
    }

    #[tokio::test]
    async fn test_post_stores_body() {
        let store = MemoryStore::new();
        let handler = WebhookHandler::new(Arc::new(store.clone()));
        let payload = "<?xml version='1.0'?><feed><entry><yt:videoId>x</yt:videoId></entry></feed>";

        let response = handler.handle(request(Method::POST, "/", payload)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.is_empty());

        let keys = store.keys().await;
        assert_eq!(keys.len(), 1);
        assert!(keys[0].ends_with(".xml"));
        assert_eq!(&store.get(&keys[0]).await.unwrap()[..], payload.as_bytes());
    }

    #[tokio::test]
    async fn test_concurrent_posts_get_distinct_keys() {
        let store = MemoryStore::new();
        let handler = WebhookHandler::new(Arc::new(store.clone()));

        let (a, b) = tokio::join!(
            handler.handle(request(Method::POST, "/", "<feed>a</feed>")),
            handler.handle(request(Method::POST, "/", "<feed>b</feed>")),
        );

        assert_eq!(a.status(), StatusCode::OK);
        assert_eq!(b.status(), StatusCode::OK);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_post_store_failure_is_server_error() {
        let handler = WebhookHandler::new(Arc::new(FailingStore));

        let response = handler.handle(request(Method::POST, "/", "<feed/>")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_other_methods_not_allowed() {
        let store = MemoryStore::new();
        let handler = WebhookHandler::new(Arc::new(store.clone()));

        for method in [Method::PUT, Method::DELETE, Method::PATCH, Method::HEAD, Method::OPTIONS] {
            let response = handler
                .handle(request(method.clone(), "/?hub.challenge=x", "<feed/>"))
                .await;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{}", method);
            assert!(body_bytes(response).await.is_empty());
        }

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_signed_post_with_valid_signature_is_stored() {
        let store = MemoryStore::new();
        let handler = WebhookHandler::new(Arc::new(store.clone()))
            .with_secret(Some("topic-secret".to_string()), 1024);
        let body = "<feed><entry/></feed>";

        let signed = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("X-Hub-Signature", sign("topic-secret", body.as_bytes()))
            .body(Body::from(body))
            .unwrap();
        let response = handler.handle(signed).await;

        assert_eq!(response.status(), StatusCode::OK);
        let keys = store.keys().await;
        assert_eq!(keys.len(), 1);
        assert_eq!(&store.get(&keys[0]).await.unwrap()[..], body.as_bytes());
    }

    #[tokio::test]
    async fn test_signed_post_with_bad_signature_is_discarded() {
        let store = MemoryStore::new();
        let handler = WebhookHandler::new(Arc::new(store.clone()))
            .with_secret(Some("topic-secret".to_string()), 1024);

        let unsigned = handler.handle(request(Method::POST, "/", "<feed/>")).await;
        assert_eq!(unsigned.status(), StatusCode::OK);

        let forged = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("X-Hub-Signature", sign("wrong-secret", b"<feed/>"))
            .body(Body::from("<feed/>"))
            .unwrap();
        assert_eq!(handler.handle(forged).await.status(), StatusCode::OK);

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_signed_post_over_limit_is_rejected() {
        let store = MemoryStore::new();
        let handler = WebhookHandler::new(Arc::new(store.clone()))
            .with_secret(Some("topic-secret".to_string()), 8);

        let response = handler
            .handle(request(Method::POST, "/", "<feed>too long</feed>"))
            .await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_blank_secret_disables_verification() {
        let store = MemoryStore::new();
        let handler = WebhookHandler::new(Arc::new(store.clone()))
            .with_secret(Some("  ".to_string()), 8);

        let response = handler
            .handle(request(Method::POST, "/", "<feed>longer than eight</feed>"))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.len().await, 1);
    }
}
