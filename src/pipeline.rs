use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::dedupe::dedupe;
use crate::error::StoreError;
use crate::extract::ListingExtractor;
use crate::filter::{keep, preferred_hits};
use crate::models::{Listing, TargetBatch};
use crate::store::ListingStore;

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Fragments received across all targets
    pub fragments: usize,
    /// Fragments without a listing link
    pub unidentified: usize,
    /// Fragments whose content could not be turned into a listing
    pub failed: usize,
    /// Listings left after dedupe
    pub unique: usize,
    /// Listings matching the search criteria
    pub matched: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Matching listings that were not in the store before this run
    pub new_listings: Vec<Listing>,
    /// Listings extracted before dedupe
    pub total_scraped: usize,
    pub stats: RunStats,
}

impl PipelineOutcome {
    /// New listings ordered by effective rent, unknown rent last.
    pub fn sorted_by_price(&self) -> Vec<Listing> {
        let mut sorted = self.new_listings.clone();
        sorted.sort_by_key(|l| l.effective_price().unwrap_or(i64::MAX));
        sorted
    }

    pub fn with_laundry(&self) -> usize {
        self.new_listings.iter().filter(|l| l.has_laundry).count()
    }
}

/// Run one scrape cycle's worth of fragments through extraction, dedupe, filtering and
/// reconciliation.
///
/// Per-fragment problems are logged and counted; only a store failure aborts the run.
/// Finding new listings, recording sightings and writing alerts go through
/// [`ListingStore::reconcile`] as one step.
pub fn run_pipeline<S: ListingStore>(
    batches: &[TargetBatch],
    config: &SearchConfig,
    store: &mut S,
    now: DateTime<Utc>,
) -> Result<PipelineOutcome, StoreError> {
    let extractor = ListingExtractor::new(config);
    let mut stats = RunStats::default();
    let mut scraped = Vec::new();

    for batch in batches {
        let before = scraped.len();
        for (idx, fragment) in batch.fragments.iter().enumerate() {
            stats.fragments += 1;
            match extractor.extract(fragment) {
                Ok(Some(listing)) => scraped.push(listing),
                Ok(None) => {
                    stats.unidentified += 1;
                    debug!(search = %batch.target, fragment = idx, "no listing link, skipping");
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(search = %batch.target, fragment = idx, "Error parsing listing: {}", e);
                }
            }
        }
        info!(
            "Extracted {} listings from {}",
            scraped.len() - before,
            batch.target
        );
    }

    let total_scraped = scraped.len();
    info!("📊 Total listings scraped: {}", total_scraped);

    let unique = dedupe(scraped);
    stats.unique = unique.len();
    info!("📊 Unique listings: {}", stats.unique);

    let matched: Vec<Listing> = unique.into_iter().filter(|l| keep(l, config)).collect();
    stats.matched = matched.len();
    info!("📊 After filtering: {}", stats.matched);

    let new_listings = store.reconcile(&matched, now)?;
    info!("🆕 New listings: {}", new_listings.len());

    for listing in &new_listings {
        let hits = preferred_hits(listing, config);
        if !hits.is_empty() {
            debug!(id = %listing.id, features = ?hits, "preferred features");
        }
    }

    Ok(PipelineOutcome {
        new_listings,
        total_scraped,
        stats,
    })
}
