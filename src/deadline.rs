//! Time bounds for calls that cross a process or network boundary.

use crate::config::Settings;
use crate::error::{PolicyError, Result};
use std::future::Future;
use std::time::Duration;

/// Upper bounds applied to embedding and vector store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub embedding: Duration,
    pub store: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            embedding: Duration::from_secs(60),
            store: Duration::from_secs(30),
        }
    }
}

impl From<&Settings> for Timeouts {
    fn from(settings: &Settings) -> Self {
        Self {
            embedding: Duration::from_secs(settings.embedding.timeout_secs),
            store: Duration::from_secs(settings.vector_store.timeout_secs),
        }
    }
}

/// Await `fut`, failing with a retryable [`PolicyError::Timeout`] after `limit`.
pub async fn bounded<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| PolicyError::Timeout {
            operation: operation.to_string(),
            seconds: limit.as_secs(),
        })?
}
