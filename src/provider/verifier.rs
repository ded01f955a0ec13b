// ABOUTME: Post-deploy health check against the public HTTPS endpoint.
// ABOUTME: Polls with a fixed retry interval until it sees HTTP 200 or runs out of attempts.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::HealthVerifier;
use super::error::ProviderError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRIES: u32 = 6;

#[derive(Debug, Clone)]
pub struct HttpHealthVerifier {
    client: Client,
    retry_interval: Duration,
    max_retries: u32,
    allow_http: bool,
}

impl HttpHealthVerifier {
    pub fn new(
        timeout: Duration,
        retry_interval: Duration,
        max_retries: u32,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ProviderError::Request {
                operation: "build health check client".to_string(),
                source,
            })?;

        Ok(Self {
            client,
            retry_interval,
            max_retries: max_retries.max(1),
            allow_http: false,
        })
    }

    pub fn with_defaults() -> Result<Self, ProviderError> {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_RETRY_INTERVAL, DEFAULT_MAX_RETRIES)
    }

    /// Accept plain `http://` URLs. Only meant for local test servers.
    pub fn allow_insecure_http(mut self) -> Self {
        self.allow_http = true;
        self
    }

    fn check_scheme(&self, url: &str) -> Result<(), ProviderError> {
        if url.starts_with("https://") || (self.allow_http && url.starts_with("http://")) {
            Ok(())
        } else {
            Err(ProviderError::InsecureUrl {
                url: url.to_string(),
            })
        }
    }

    async fn probe(&self, url: &str) -> Result<(), String> {
        match self.client.get(url).send().await {
            Ok(response) if response.status() == StatusCode::OK => Ok(()),
            Ok(response) => Err(format!("unexpected status code: {}", response.status())),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[async_trait]
impl HealthVerifier for HttpHealthVerifier {
    async fn verify(&self, url: &str) -> Result<(), ProviderError> {
        self.check_scheme(url)?;
        tracing::info!(url, "verifying deployment");

        let mut last_error = String::new();
        for attempt in 1..=self.max_retries {
            match self.probe(url).await {
                Ok(()) => {
                    tracing::info!(url, attempt, "health check passed");
                    return Ok(());
                }
                Err(detail) => {
                    tracing::warn!(
                        url,
                        attempt,
                        max_retries = self.max_retries,
                        error = %detail,
                        "health check failed"
                    );
                    last_error = detail;
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_interval).await;
            }
        }

        Err(ProviderError::Unhealthy {
            check: "health".to_string(),
            attempts: self.max_retries,
            detail: last_error,
        })
    }
}
