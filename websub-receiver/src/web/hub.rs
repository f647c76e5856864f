//! WebSub verification handshake parameters.
//!
//! Reference: https://www.w3.org/TR/websub/#hub-verifies-intent

use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::{form_urlencoded, Url};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("hub.challenge is missing or empty")]
    MissingChallenge,
}

/// Query parameters of a hub's verification GET.
///
/// Only `hub.challenge` is required. The rest are reported as-is and
/// default to empty strings; the hub owns their meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub challenge: String,
    pub mode: String,
    pub lease_seconds: String,
    pub topic: Option<String>,
}

impl VerificationRequest {
    /// Build from a raw (still encoded) query string.
    pub fn from_query(query: Option<&str>) -> Result<Self, HandshakeError> {
        let query = query.unwrap_or_default();

        let challenge = query_param(query, "hub.challenge")
            .filter(|c| !c.is_empty())
            .ok_or(HandshakeError::MissingChallenge)?;

        Ok(VerificationRequest {
            challenge,
            mode: query_param(query, "hub.mode").unwrap_or_default(),
            lease_seconds: query_param(query, "hub.lease_seconds").unwrap_or_default(),
            topic: query_param(query, "hub.topic"),
        })
    }

    /// Channel id carried in the topic URL, or `""`.
    pub fn channel_id(&self) -> String {
        self.topic
            .as_deref()
            .map(channel_id_from_topic)
            .unwrap_or_default()
    }
}

/// First value of `name` in a form-urlencoded query, decoded.
fn query_param(query: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Extract the `channel_id` query parameter of a topic URL.
///
/// The topic is percent-decoded once more before parsing, since hubs
/// commonly double-encode it. Returns `""` when decoding or URL parsing
/// fails, or when the parameter is absent.
pub fn channel_id_from_topic(topic: &str) -> String {
    let decoded = match percent_decode_str(topic).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => return String::new(),
    };

    let url = match Url::parse(&decoded) {
        Ok(url) => url,
        Err(_) => return String::new(),
    };

    url.query_pairs()
        .find(|(key, _)| key == "channel_id")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}
