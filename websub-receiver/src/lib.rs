//! WebSub receiver - subscriber endpoint for WebSub (PubSubHubbub) hubs.
//!
//! This library provides the pieces behind the `websub-receiver` binary:
//! - `web`: verification handshake and notification ingestion
//! - `storage`: write-only object stores for notification payloads
//! - `telemetry`: request spans and handshake annotations
//!
//! ## Flow
//!
//! ```text
//! Hub → GET ?hub.challenge → echo challenge
//! Hub → POST <feed> → <unix-millis>.<uuid>.xml in the object store
//! ```

pub mod config;
pub mod storage;
pub mod telemetry;
pub mod web;

// Re-export commonly used types
pub use config::{Config, StorageBackend};
pub use storage::{ObjectStore, StorageKey, StoreError, StoredObject};
pub use web::{router, AppState, WebhookHandler};
