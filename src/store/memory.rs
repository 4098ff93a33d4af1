use std::collections::BTreeMap;

use super::ListingStore;
use crate::error::StoreError;
use crate::models::{AlertEvent, ListingRecord};

/// In-process store for dry runs. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, ListingRecord>,
    alerts: Vec<AlertEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> &[AlertEvent] {
        &self.alerts
    }
}

impl ListingStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<ListingRecord>, StoreError> {
        Ok(self.records.get(id).cloned())
    }

    fn put(&mut self, record: &ListingRecord) -> Result<(), StoreError> {
        let stored = match self.records.get(&record.listing.id) {
            Some(existing) => existing.merge(&record.listing, record.last_seen),
            None => record.clone(),
        };
        self.records.insert(record.listing.id.clone(), stored);
        Ok(())
    }

    fn contains(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(id))
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }

    fn record_alert(&mut self, event: &AlertEvent) -> Result<(), StoreError> {
        self.alerts.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{
        check_contract, check_reconcile, check_repeat_upsert, check_stale_put,
    };

    #[test]
    fn memory_store_contract() {
        check_contract(&mut MemoryStore::new());
    }

    #[test]
    fn memory_store_repeat_upsert() {
        check_repeat_upsert(&mut MemoryStore::new());
    }

    #[test]
    fn memory_store_keeps_first_seen_on_stale_put() {
        check_stale_put(&mut MemoryStore::new());
    }

    #[test]
    fn memory_store_reconcile() {
        let mut store = MemoryStore::new();
        check_reconcile(&mut store);
        assert_eq!(store.alerts().len(), 2);
    }
}
