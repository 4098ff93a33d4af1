//! Durable record of previously seen listings.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{AlertEvent, Listing, ListingRecord};

/// Keyed store of listing records, one per listing id.
pub trait ListingStore {
    fn get(&self, id: &str) -> Result<Option<ListingRecord>, StoreError>;

    /// Write `record` under `record.listing.id`.
    ///
    /// When a record already exists only the fields [`ListingRecord::merge`] updates are
    /// taken from `record`; `first_seen` and the write-once fields stay as stored.
    fn put(&mut self, record: &ListingRecord) -> Result<(), StoreError>;

    fn contains(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.get(id)?.is_some())
    }

    /// Number of stored listings
    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Append an entry to the audit log.
    fn record_alert(&mut self, event: &AlertEvent) -> Result<(), StoreError>;

    /// Listings of `batch` that have no stored record. Read only.
    fn find_new(&self, batch: &[Listing]) -> Result<Vec<Listing>, StoreError> {
        let mut new = Vec::new();
        for listing in batch {
            if !self.contains(&listing.id)? {
                new.push(listing.clone());
            }
        }
        Ok(new)
    }

    /// Record a sighting of every listing in `batch` at `observed_at`.
    ///
    /// Unknown ids are inserted; known ids are merged with
    /// [`ListingRecord::merge`]. Records are written one at a time, so a failure
    /// part way through leaves earlier records written and intact.
    fn upsert(&mut self, batch: &[Listing], observed_at: DateTime<Utc>) -> Result<(), StoreError> {
        for listing in batch {
            let record = match self.get(&listing.id)? {
                Some(existing) => existing.merge(listing, observed_at),
                None => ListingRecord::first_sighting(listing, observed_at),
            };
            self.put(&record)?;
        }
        Ok(())
    }

    /// One run's reconciliation: find the new listings of `matched`, record a sighting
    /// of all of them and log a `new_listing` alert per new listing.
    ///
    /// Backends shared between processes override this to run the whole step as a
    /// single writer.
    fn reconcile(
        &mut self,
        matched: &[Listing],
        observed_at: DateTime<Utc>,
    ) -> Result<Vec<Listing>, StoreError> {
        let new_listings = self.find_new(matched)?;
        self.upsert(matched, observed_at)?;
        for listing in &new_listings {
            self.record_alert(&AlertEvent::new_listing(listing, observed_at))?;
        }
        Ok(new_listings)
    }
}
