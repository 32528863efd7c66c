//! OpenAI-compatible client configuration.

use crate::error::{PolicyError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create a client with an optional custom base URL and request timeout.
///
/// Any OpenAI-compatible endpoint (Groq, a local gateway) can be targeted by
/// setting `api_base`. The API key is read from `OPENAI_API_KEY`.
pub fn create_client_with(api_base: Option<&str>, timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PolicyError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = api_base.filter(|b| !b.is_empty()) {
        config = config.with_api_base(base);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}
