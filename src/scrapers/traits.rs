use crate::models::RawFragment;
use anyhow::Result;
use async_trait::async_trait;

/// Common trait for everything that can hand listing cards to the pipeline
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Fetch one search results page and split it into listing card fragments
    async fn fetch(&self, target: &str) -> Result<Vec<RawFragment>>;

    /// Get the name of the source
    fn source_name(&self) -> &'static str;
}
