use anyhow::{Context, Result};
use apartment_scout::config::SourceKind;
use apartment_scout::scrapers::{BrowserSource, FragmentSource, HttpSource};
use apartment_scout::{
    run_pipeline, MemoryStore, PipelineOutcome, SearchConfig, Settings, SqliteStore, TargetBatch,
};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    let config = settings.load_search_config()?;

    info!("🏠 Apartment Scout");
    info!("   {}", Utc::now().format("%Y-%m-%d %H:%M UTC"));
    info!("Search: {}", config.name);
    info!("Max Price: ${}", config.max_price);
    info!("Beds: {}-{}, Baths: {}+", config.min_beds, config.max_beds, config.min_baths);

    let source: Box<dyn FragmentSource> = match settings.source {
        SourceKind::Browser => Box::new(BrowserSource::new(settings.debug_dir.clone())?),
        SourceKind::Http => Box::new(HttpSource::new()?),
    };

    let batches = collect_batches(source.as_ref(), &config, &settings).await;
    drop(source);

    let now = Utc::now();
    let outcome = if settings.dry_run {
        info!("Dry run, nothing will be persisted");
        run_pipeline(&batches, &config, &mut MemoryStore::new(), now)?
    } else {
        let mut store = SqliteStore::open(&settings.db_path)?;
        info!("Listing store: {}", store.path());
        run_pipeline(&batches, &config, &mut store, now)?
    };

    report(&outcome);

    let sorted = outcome.sorted_by_price();
    let json = serde_json::to_string_pretty(&sorted)?;
    tokio::fs::write(&settings.output_path, json)
        .await
        .with_context(|| format!("Failed to write {}", settings.output_path.display()))?;
    info!(
        "💾 Saved {} new listings to {}",
        sorted.len(),
        settings.output_path.display()
    );

    info!("✅ Search complete!");
    Ok(())
}

/// Fetch every search target in turn. A failed target is logged and skipped.
async fn collect_batches(
    source: &dyn FragmentSource,
    config: &SearchConfig,
    settings: &Settings,
) -> Vec<TargetBatch> {
    let mut batches = Vec::with_capacity(config.targets.len());

    for (i, target) in config.targets.iter().enumerate() {
        if i > 0 && !settings.target_delay.is_zero() {
            tokio::time::sleep(settings.target_delay).await;
        }

        match source.fetch(target).await {
            Ok(fragments) => batches.push(TargetBatch {
                target: target.clone(),
                fragments,
            }),
            Err(e) => warn!("Error scraping {} via {}: {:#}", target, source.source_name(), e),
        }
    }

    batches
}

fn report(outcome: &PipelineOutcome) {
    info!(
        "Fragments: {}, without link: {}, failed: {}",
        outcome.stats.fragments, outcome.stats.unidentified, outcome.stats.failed
    );

    if outcome.new_listings.is_empty() {
        info!("✨ No new listings since last check");
        return;
    }

    let with_laundry = outcome.with_laundry();
    if with_laundry > 0 {
        info!("🧺 With in-unit laundry: {}", with_laundry);
    }

    for (i, listing) in outcome.sorted_by_price().iter().enumerate() {
        let price = listing
            .effective_price()
            .map(|p| format!("${}", p))
            .unwrap_or_else(|| "Price N/A".to_string());
        info!(
            "{}. {} · {} · {}",
            i + 1,
            price,
            listing.address.as_deref().unwrap_or("Address not available"),
            listing.url
        );
    }
}
