use crate::models::RawFragment;
use crate::scrapers::cards::split_cards;
use crate::scrapers::traits::FragmentSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Listing cards from plain server-rendered HTML
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FragmentSource for HttpSource {
    async fn fetch(&self, target: &str) -> Result<Vec<RawFragment>> {
        info!("Fetching: {}", target);

        let response = self
            .client
            .get(target)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", target))?;

        if !response.status().is_success() {
            warn!("{} returned status: {}", target, response.status());
            anyhow::bail!("Failed to fetch {}: {}", target, response.status());
        }

        let html = response.text().await.context("Failed to read response body")?;
        debug!("Downloaded {} bytes of HTML", html.len());

        Ok(split_cards(&html))
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
