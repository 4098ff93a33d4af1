use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::ListingStore;
use crate::error::StoreError;
use crate::models::{AlertEvent, Listing, ListingRecord};

/// How long a run waits for another writer to release the database
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS listings (
        id TEXT PRIMARY KEY,
        first_seen TEXT NOT NULL,
        last_seen TEXT NOT NULL,
        url TEXT NOT NULL,
        address TEXT,
        neighborhood TEXT,
        price INTEGER,
        net_price INTEGER,
        beds INTEGER,
        baths REAL,
        sqft INTEGER,
        has_laundry INTEGER NOT NULL DEFAULT 0,
        is_no_fee INTEGER NOT NULL DEFAULT 0,
        raw_excerpt TEXT
    );

    CREATE TABLE IF NOT EXISTS alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        listing_id TEXT,
        alert_type TEXT,
        message TEXT
    );
"#;

const SELECT_LISTING: &str = r#"
    SELECT id, url, address, neighborhood, price, net_price, beds, baths, sqft,
           has_laundry, is_no_fee, raw_excerpt, first_seen, last_seen
    FROM listings
    WHERE id = ?1
"#;

/// SQLite-backed listing store.
///
/// Owns a single connection. [`ListingStore::reconcile`] runs inside a
/// `BEGIN IMMEDIATE` transaction, so overlapping runs on the same file take turns.
pub struct SqliteStore {
    conn: Connection,
    path: String,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().display().to_string();
        let conn = Connection::open(&path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        Self::init(conn, path)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let path = ":memory:".to_string();
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        Self::init(conn, path)
    }

    fn init(conn: Connection, path: String) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .and_then(|_| conn.execute_batch(SCHEMA))
            .map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path, "listing store ready");
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of audit log entries
    pub fn alert_count(&self) -> Result<usize, StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|source| StoreError::Query {
                operation: "count alerts",
                source,
            })
    }

    fn tables(&self) -> Tables<'_> {
        Tables { conn: &self.conn }
    }
}

impl ListingStore for SqliteStore {
    fn get(&self, id: &str) -> Result<Option<ListingRecord>, StoreError> {
        self.tables().get(id)
    }

    fn put(&mut self, record: &ListingRecord) -> Result<(), StoreError> {
        self.tables().put(record)
    }

    fn contains(&self, id: &str) -> Result<bool, StoreError> {
        self.tables().contains(id)
    }

    fn len(&self) -> Result<usize, StoreError> {
        self.tables().len()
    }

    fn record_alert(&mut self, event: &AlertEvent) -> Result<(), StoreError> {
        self.tables().record_alert(event)
    }

    fn reconcile(
        &mut self,
        matched: &[Listing],
        observed_at: DateTime<Utc>,
    ) -> Result<Vec<Listing>, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|source| StoreError::Query {
                operation: "begin",
                source,
            })?;

        // Dropping `tx` on an error path rolls the whole run back.
        let new_listings = Tables { conn: &tx }.reconcile(matched, observed_at)?;

        tx.commit().map_err(|source| StoreError::Query {
            operation: "commit",
            source,
        })?;
        debug!(new = new_listings.len(), "reconciliation committed");
        Ok(new_listings)
    }
}

/// Statements against the listing and alert tables, on a plain connection or inside a
/// transaction.
struct Tables<'c> {
    conn: &'c Connection,
}

impl Tables<'_> {
    fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ListingRecord> {
        Ok(ListingRecord {
            listing: Listing {
                id: row.get(0)?,
                url: row.get(1)?,
                address: row.get(2)?,
                neighborhood: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                price: row.get(4)?,
                net_price: row.get(5)?,
                beds: row.get(6)?,
                baths: row.get(7)?,
                sqft: row.get(8)?,
                has_laundry: row.get(9)?,
                is_no_fee: row.get(10)?,
                raw_excerpt: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
            },
            first_seen: row.get(12)?,
            last_seen: row.get(13)?,
        })
    }
}

impl ListingStore for Tables<'_> {
    fn get(&self, id: &str) -> Result<Option<ListingRecord>, StoreError> {
        self.conn
            .query_row(SELECT_LISTING, params![id], Self::record_from_row)
            .optional()
            .map_err(|source| StoreError::Listing {
                operation: "get",
                id: id.to_string(),
                source,
            })
    }

    fn put(&mut self, record: &ListingRecord) -> Result<(), StoreError> {
        let l = &record.listing;
        self.conn
            .execute(
                r#"
                INSERT INTO listings (
                    id, first_seen, last_seen, url, address, neighborhood,
                    price, net_price, beds, baths, sqft,
                    has_laundry, is_no_fee, raw_excerpt
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                ON CONFLICT(id) DO UPDATE SET
                    last_seen = excluded.last_seen,
                    price = excluded.price,
                    net_price = excluded.net_price
                "#,
                params![
                    l.id,
                    record.first_seen,
                    record.last_seen,
                    l.url,
                    l.address,
                    l.neighborhood,
                    l.price,
                    l.net_price,
                    l.beds,
                    l.baths,
                    l.sqft,
                    l.has_laundry,
                    l.is_no_fee,
                    l.raw_excerpt,
                ],
            )
            .map_err(|source| StoreError::Listing {
                operation: "upsert",
                id: l.id.clone(),
                source,
            })?;
        Ok(())
    }

    fn contains(&self, id: &str) -> Result<bool, StoreError> {
        self.conn
            .query_row("SELECT 1 FROM listings WHERE id = ?1", params![id], |_| Ok(()))
            .optional()
            .map(|hit| hit.is_some())
            .map_err(|source| StoreError::Listing {
                operation: "lookup",
                id: id.to_string(),
                source,
            })
    }

    fn len(&self) -> Result<usize, StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|source| StoreError::Query {
                operation: "count",
                source,
            })
    }

    fn record_alert(&mut self, event: &AlertEvent) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO alerts (timestamp, listing_id, alert_type, message) VALUES (?1, ?2, ?3, ?4)",
                params![
                    event.timestamp,
                    event.listing_id,
                    event.kind.as_str(),
                    event.message
                ],
            )
            .map_err(|source| StoreError::Listing {
                operation: "record alert",
                id: event.listing_id.clone(),
                source,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::listing;
    use crate::store::tests::{
        check_contract, check_reconcile, check_repeat_upsert, check_stale_put,
    };
    use chrono::{Duration, TimeZone};

    #[test]
    fn sqlite_store_contract() {
        check_contract(&mut SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn sqlite_store_repeat_upsert() {
        check_repeat_upsert(&mut SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn sqlite_store_keeps_first_seen_on_stale_put() {
        check_stale_put(&mut SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn sqlite_store_reconcile() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        check_reconcile(&mut store);
        assert_eq!(store.alert_count().unwrap(), 2);
    }

    #[test]
    fn overlapping_runs_report_a_listing_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apartments.db");
        let t0 = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap();
        let t1 = t0 + Duration::minutes(5);
        let batch = vec![listing("se_31"), listing("se_32")];

        let mut a = SqliteStore::open(&path).unwrap();
        let mut b = SqliteStore::open(&path).unwrap();

        let new_a = a.reconcile(&batch, t0).unwrap();
        let new_b = b.reconcile(&batch, t1).unwrap();
        assert_eq!(new_a.len(), 2);
        assert!(new_b.is_empty());

        // A put from a read taken before run A committed
        b.put(&ListingRecord::first_sighting(&batch[0], t1)).unwrap();

        assert_eq!(a.alert_count().unwrap(), 2);
        let record = a.get("se_31").unwrap().unwrap();
        assert_eq!(record.first_seen, t0);
        assert_eq!(record.last_seen, t1);
    }

    #[test]
    fn concurrent_runs_take_turns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apartments.db");
        let t0 = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap();
        let batch: Vec<Listing> = (1..=20).map(|n| listing(&format!("se_{}", n))).collect();

        let stores = vec![
            SqliteStore::open(&path).unwrap(),
            SqliteStore::open(&path).unwrap(),
        ];

        let reported: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = stores
                .into_iter()
                .enumerate()
                .map(|(i, mut store)| {
                    let batch = &batch;
                    scope.spawn(move || {
                        let at = t0 + Duration::seconds(i as i64);
                        store.reconcile(batch, at).unwrap().len()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(reported, 20);
        assert_eq!(store.alert_count().unwrap(), 20);
        assert_eq!(store.len().unwrap(), 20);
    }

    #[test]
    fn failed_reconcile_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apartments.db");
        let mut store = SqliteStore::open(&path).unwrap();

        Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE alerts")
            .unwrap();

        let err = store
            .reconcile(&[listing("se_61")], Utc::now())
            .unwrap_err();
        assert_eq!(err.operation(), "record alert");
        assert_eq!(err.listing_id(), Some("se_61"));
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn round_trips_every_field() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 2, 18, 30, 0).unwrap();
        let mut l = listing("se_5");
        l.address = None;
        l.beds = Some(0);
        l.baths = Some(1.5);
        l.sqft = Some(640);
        l.has_laundry = true;
        l.is_no_fee = true;
        l.raw_excerpt = "Studio · 1.5 baths · 640 ft²".to_string();

        store.upsert(std::slice::from_ref(&l), at).unwrap();
        let record = store.get("se_5").unwrap().unwrap();
        assert_eq!(record.listing, l);
        assert_eq!(record.first_seen, at);
        assert!(store.get("se_missing").unwrap().is_none());
    }

    #[test]
    fn alerts_are_appended() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let event = AlertEvent::new_listing(&listing("se_9"), Utc::now());
        store.record_alert(&event).unwrap();
        store.record_alert(&event).unwrap();
        assert_eq!(store.alert_count().unwrap(), 2);
    }

    #[test]
    fn reopening_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apartments.db");
        let at = Utc.with_ymd_and_hms(2026, 10, 3, 7, 0, 0).unwrap();

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.upsert(&[listing("se_1"), listing("se_2")], at).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.get("se_2").unwrap().unwrap().first_seen, at);
    }

    #[test]
    fn io_failure_reports_operation_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apartments.db");
        let mut store = SqliteStore::open(&path).unwrap();

        Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE listings")
            .unwrap();

        let err = store.upsert(&[listing("se_404")], Utc::now()).unwrap_err();
        assert_eq!(err.listing_id(), Some("se_404"));
        assert_eq!(err.operation(), "get");
    }

    #[test]
    fn open_failure_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("apartments.db");
        let err = SqliteStore::open(&path).err().unwrap();
        assert!(matches!(err, StoreError::Open { .. }));
        assert!(err.to_string().contains("apartments.db"));
    }
}
