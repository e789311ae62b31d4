//! Presenter-only HTTP action to advance the slide.
//!
//! Independent of the duplex channel: a form-encoded `secret` is posted to
//! the page origin and the only thing read back is the status code.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::ClientError;

/// Notice shown when the server refuses or cannot be reached.
pub const REJECTED_ALERT: &str = "Failed to move to the next slide. Check your secret.";

/// Upper bound on one next-slide request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts next-slide requests to one endpoint.
#[derive(Debug, Clone)]
pub struct PresenterClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl PresenterClient {
    /// Create a client for the given `.../nextSlide` endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Like [`new`](Self::new) with a custom request deadline.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Endpoint requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask the server to advance the slide.
    ///
    /// Returns `true` iff the server answered with a 2xx status within the
    /// deadline. Transport failures and timeouts count as a refusal.
    pub async fn advance_slide(&self, secret: &str) -> bool {
        match self.post(secret).await {
            Ok(status) if status.is_success() => {
                info!(endpoint = %self.endpoint, "slide advanced");
                true
            }
            Ok(status) => {
                warn!(endpoint = %self.endpoint, status = status.as_u16(), "next slide rejected");
                false
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "next slide request failed");
                false
            }
        }
    }

    async fn post(&self, secret: &str) -> Result<reqwest::StatusCode, ClientError> {
        let request = self
            .client
            .post(&self.endpoint)
            .form(&[("secret", secret)])
            .send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| {
                ClientError::Http(format!(
                    "POST {} timed out after {}ms",
                    self.endpoint,
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| ClientError::Http(format!("POST {} failed: {e}", self.endpoint)))?;
        Ok(response.status())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn silent_server_counts_as_refusal() {
        // Accepts the connection and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });

        let presenter = PresenterClient::with_timeout(
            format!("http://{addr}/nextSlide"),
            Duration::from_millis(200),
        );
        let advanced = tokio::time::timeout(Duration::from_secs(5), presenter.advance_slide("x"))
            .await
            .unwrap();
        assert!(!advanced);
        server.abort();
    }
}
