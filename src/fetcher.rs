use async_trait::async_trait;
use reqwest::Client;

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// Retrieves the markup of a single catalog page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// `PageFetcher` backed by a pooled reqwest client. Each page is tried once.
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let start_time = std::time::Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, format!("unexpected status {}", status)));
        }

        let body = response.text().await.map_err(|e| AppError::fetch(url, e))?;

        tracing::debug!(
            url = %url,
            status = %status,
            bytes = body.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Fetched catalog page"
        );

        Ok(body)
    }
}
