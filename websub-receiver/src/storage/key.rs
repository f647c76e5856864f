//! Storage key generation.
//!
//! Keys look like `1718035200123.6f1c2b0e-8d4a-4f3e-9a57-0c2d1e4b7a90.xml`.
//! The millisecond prefix only makes listings sort by arrival; two deliveries
//! landing in the same millisecond are kept apart by the v4 UUID.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

const SUFFIX: &str = ".xml";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Generate a fresh key from the current time and a random UUID.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        Self::from_parts(millis, Uuid::new_v4())
    }

    pub fn from_parts(unix_millis: u128, id: Uuid) -> Self {
        StorageKey(format!("{}.{}{}", unix_millis, id, SUFFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
