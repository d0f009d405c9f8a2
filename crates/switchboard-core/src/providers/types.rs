//! Provider-agnostic types shared by the adapters

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single provider call
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No API key was configured for the provider
    #[error("no API key configured")]
    MissingApiKey,

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request could not be sent or the body could not be read
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("API request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The provider answered, but without usable text
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Trait that both provider adapters implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Machine name (e.g. "anthropic", "google")
    fn provider_name(&self) -> &str;

    /// Name shown to the user (e.g. "Claude", "Gemini")
    fn display_name(&self) -> &str;

    /// Model identifier (e.g. "claude-3-opus-20240229")
    fn model(&self) -> &str;

    /// Send a single prompt and return the primary generated text
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Build the HTTP client an adapter keeps for its lifetime.
///
/// Without a timeout the transport default applies (no deadline).
pub(crate) fn build_client(timeout: Option<Duration>) -> Result<Client, ProviderError> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(ProviderError::Client)
}

/// Read the error body of a failed response without masking the status
pub(crate) async fn status_error(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    ProviderError::Status { status, body }
}
