//! Apartment listing scout: extracts listings from scraped result cards, filters them
//! against a search and reconciles them with previously seen listings.

pub mod config;
pub mod dedupe;
pub mod error;
pub mod extract;
pub mod filter;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod scrapers;
pub mod store;

pub use config::{SearchConfig, Settings};
pub use error::{ExtractError, StoreError};
pub use models::{Listing, ListingRecord, RawFragment, TargetBatch};
pub use pipeline::{run_pipeline, PipelineOutcome, RunStats};
pub use store::{ListingStore, MemoryStore, SqliteStore};
