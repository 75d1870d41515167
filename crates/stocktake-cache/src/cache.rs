//! Read-through snapshot cache keyed by table name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::entry::{TableEntry, TableRead, TableState};

/// Inner state protected by RwLock.
struct CacheInner<T> {
    /// One entry per table name, created lazily.
    tables: HashMap<String, TableEntry<T>>,
}

/// Whole-table snapshot cache with bounded staleness.
///
/// This cache provides:
/// - one lazily created entry per table name
/// - whole-payload replacement on every populate (last write wins, no merging)
/// - freshness derived on demand from the populate instant and
///   [`SYNC_INTERVAL`](crate::SYNC_INTERVAL)
/// - thread-safe access via RwLock
///
/// Nothing expires or evicts in the background; entries only leave via
/// [`clear`](TableCache::clear) or [`clear_all`](TableCache::clear_all).
/// Every operation is infallible. Cloning the cache is cheap and clones
/// share state.
pub struct TableCache<T> {
    inner: Arc<RwLock<CacheInner<T>>>,
}

impl<T> TableCache<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                tables: HashMap::new(),
            })),
        }
    }

    /// Get the current number of entries (populated or not).
    pub async fn len(&self) -> usize {
        self.inner.read().await.tables.len()
    }

    /// Check if the cache has no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.tables.is_empty()
    }

    /// Snapshot the entry for a table, creating an empty one if absent.
    pub async fn entry(&self, table: &str) -> TableEntry<T> {
        let mut inner = self.inner.write().await;
        match inner.tables.get(table) {
            Some(entry) => entry.clone(),
            None => {
                trace!(table = %table, "Creating empty cache entry");
                let entry = TableEntry::new();
                inner.tables.insert(table.to_string(), entry.clone());
                entry
            }
        }
    }

    /// Replace a table's payload with a fresh snapshot.
    ///
    /// Unconditional: the previous payload (if any) is dropped whole, the
    /// stale flag is cleared and the version advances by one. Auto-creates
    /// the entry. Returns the new version.
    pub async fn update(&self, table: &str, rows: T) -> u64 {
        let mut inner = self.inner.write().await;
        let entry = inner
            .tables
            .entry(table.to_string())
            .or_insert_with(TableEntry::new);
        let version = entry.populate(rows, Instant::now(), Utc::now());

        debug!(table = %table, version = version, "Table snapshot updated");
        version
    }

    /// Flag a table's payload as stale.
    ///
    /// The payload (if any) stays readable through [`rows`](TableCache::rows);
    /// it just stops being served as valid until the next populate.
    /// Auto-creates the entry.
    pub async fn mark_stale(&self, table: &str) {
        let mut inner = self.inner.write().await;
        let entry = inner
            .tables
            .entry(table.to_string())
            .or_insert_with(TableEntry::new);
        entry.stale = true;

        debug!(table = %table, "Table marked stale");
    }

    /// Whether a read for this table may be served from cache.
    ///
    /// False when `force_refresh` is set, when no payload is present, when
    /// the payload has aged past the sync interval, or when the entry is
    /// flagged stale. Does not create an entry.
    pub async fn is_valid(&self, table: &str, force_refresh: bool) -> bool {
        let inner = self.inner.read().await;
        match inner.tables.get(table) {
            Some(entry) => entry.is_valid_at(Instant::now(), force_refresh),
            None => false,
        }
    }

    /// Get a table's payload without any validity check.
    ///
    /// Aged and stale payloads are returned as-is; callers that care about
    /// freshness check [`is_valid`](TableCache::is_valid) first.
    pub async fn rows(&self, table: &str) -> Option<Arc<T>> {
        let inner = self.inner.read().await;
        inner.tables.get(table).and_then(|entry| entry.rows.clone())
    }

    /// Get a table's payload together with its provenance.
    ///
    /// `None` when the table was never populated (or was cleared).
    pub async fn read(&self, table: &str) -> Option<TableRead<T>> {
        let inner = self.inner.read().await;
        inner.tables.get(table).and_then(TableRead::from_entry)
    }

    /// Wall-clock time of a table's last successful populate.
    pub async fn last_updated(&self, table: &str) -> Option<DateTime<Utc>> {
        let inner = self.inner.read().await;
        inner.tables.get(table).and_then(|entry| entry.last_updated)
    }

    /// Current version of a table (0 when absent or never populated).
    pub async fn version(&self, table: &str) -> u64 {
        let inner = self.inner.read().await;
        inner.tables.get(table).map_or(0, |entry| entry.version)
    }

    /// Derived freshness of a table (absent tables read as empty).
    pub async fn state(&self, table: &str) -> TableState {
        let inner = self.inner.read().await;
        inner
            .tables
            .get(table)
            .map_or(TableState::Empty, |entry| entry.state_at(Instant::now()))
    }

    /// Remove a table's entry entirely.
    ///
    /// Payload, timestamps and version are all discarded; the next
    /// [`entry`](TableCache::entry) starts over at version 0.
    pub async fn clear(&self, table: &str) {
        let mut inner = self.inner.write().await;
        if inner.tables.remove(table).is_some() {
            debug!(table = %table, "Table entry cleared");
        }
    }

    /// Remove every entry.
    pub async fn clear_all(&self) {
        let mut inner = self.inner.write().await;
        let count = inner.tables.len();
        inner.tables.clear();

        debug!(count = count, "All table entries cleared");
    }

    /// List the names of all entries, populated or not.
    pub async fn table_names(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner.tables.keys().cloned().collect()
    }

    /// Reportable status of one table.
    pub async fn status(&self, table: &str) -> TableStatus {
        let inner = self.inner.read().await;
        let now = Instant::now();
        match inner.tables.get(table) {
            Some(entry) => TableStatus::from_entry(table, entry, now),
            None => TableStatus::absent(table),
        }
    }

    /// Reportable status of every table, sorted by name.
    pub async fn status_all(&self) -> Vec<TableStatus> {
        let inner = self.inner.read().await;
        let now = Instant::now();
        let mut statuses: Vec<TableStatus> = inner
            .tables
            .iter()
            .map(|(table, entry)| TableStatus::from_entry(table, entry, now))
            .collect();
        statuses.sort_by(|a, b| a.table.cmp(&b.table));
        statuses
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        let now = Instant::now();

        let mut stats = CacheStats {
            tables: inner.tables.len(),
            ..CacheStats::default()
        };
        for entry in inner.tables.values() {
            match entry.state_at(now) {
                TableState::Empty => stats.empty += 1,
                TableState::Fresh => stats.fresh += 1,
                TableState::Aged => stats.aged += 1,
                TableState::Stale => stats.stale += 1,
            }
        }
        stats
    }
}

impl<T> Clone for TableCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for TableCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reportable status of a single table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStatus {
    /// Table name.
    pub table: String,

    /// Derived freshness at the time of the report.
    pub state: TableState,

    /// Current version (0 = never populated).
    pub version: u64,

    /// Wall-clock time of the last successful populate.
    pub last_updated: Option<DateTime<Utc>>,

    /// Payload age in milliseconds at the time of the report.
    pub age_ms: Option<u64>,
}

impl TableStatus {
    fn from_entry<T>(table: &str, entry: &TableEntry<T>, now: Instant) -> Self {
        Self {
            table: table.to_string(),
            state: entry.state_at(now),
            version: entry.version,
            last_updated: entry.last_updated,
            age_ms: entry.age_at(now).map(|age| age.as_millis() as u64),
        }
    }

    fn absent(table: &str) -> Self {
        Self {
            table: table.to_string(),
            state: TableState::Empty,
            version: 0,
            last_updated: None,
            age_ms: None,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of entries, populated or not.
    pub tables: usize,

    /// Entries with no payload.
    pub empty: usize,

    /// Entries younger than the sync interval.
    pub fresh: usize,

    /// Entries older than the sync interval.
    pub aged: usize,

    /// Entries flagged by a failed background refresh.
    pub stale: usize,
}
