//! HTTP object store.
//!
//! Streams each payload with `PUT <base_url>/<key>`. Works with any blob
//! endpoint that accepts raw PUT uploads (an R2/S3 gateway, a WebDAV share,
//! a small internal upload service).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Body, Client};
use tracing::debug;
use url::Url;

use super::{ObjectStore, PayloadStream, StorageKey, StoreError, StoredObject};

#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpStore {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("storage url cannot be used as a base: {}", base_url);
        }
        // Without the trailing slash, join() would replace the last segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(HttpStore {
            client,
            base_url,
            token,
        })
    }

    pub fn object_url(&self, key: &StorageKey) -> Result<Url, url::ParseError> {
        self.base_url.join(key.as_str())
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn put(&self, key: &StorageKey, body: PayloadStream) -> Result<StoredObject, StoreError> {
        let url = self.object_url(key)?;

        let mut request = self.client.put(url.clone()).body(Body::wrap_stream(body));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!(url = %url, status = status.as_u16(), "http_object_written");

        Ok(StoredObject {
            key: key.to_string(),
            size: None,
        })
    }
}
