use reqwest::Client;
use reqwest::Request;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::FetchError;

/// Thin execute-and-classify wrapper around a shared [`reqwest::Client`].
///
/// One request in, one body out; no retries. Retry policy, if any, belongs to
/// the caller.
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    pub fn new(config: &FetchConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    /// Wraps an already-configured client, e.g. the update checker's
    /// short-timeout client or a download worker's own.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Sends `request` and returns the body text.
    ///
    /// Transport failures (timeout, connection error) and non-2xx statuses
    /// both classify as [`FetchError::Network`].
    pub async fn execute(&self, request: Request) -> Result<String, FetchError> {
        debug!("Requesting {}", request.url());
        let response = self.client.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::network(format!("unexpected status {status}")));
        }
        Ok(response.text().await?)
    }
}
