//! Shared HTTP client for discovery and downloads.

mod response;
mod user_agent;

pub use response::HttpResponse;
pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

/// HTTP client with a fixed user agent, timeout and politeness delay.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with the default user agent.
    pub fn new(timeout: Duration, request_delay: Duration) -> Self {
        Self::with_user_agent(timeout, request_delay, None)
    }

    /// Create a new HTTP client with a custom user agent.
    /// - None: default research user agent
    /// - Some(custom): custom user agent string
    pub fn with_user_agent(
        timeout: Duration,
        request_delay: Duration,
        user_agent_config: Option<&str>,
    ) -> Self {
        let user_agent = resolve_user_agent(user_agent_config);
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            request_delay,
        }
    }

    /// Make a GET request.
    ///
    /// Non-success statuses are returned as responses, not errors.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        Ok(HttpResponse::from_response(response))
    }

    /// Get page content as text.
    pub async fn get_text(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self.get(url).await?;
        response.text().await
    }
}
