//! Read-through synchronization over the table cache.

use std::fmt;
use std::sync::Arc;

use stocktake_cache::{SYNC_INTERVAL, TableCache, TableRead};
use stocktake_client::{Error as ClientError, Row};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::scheduler::{RefreshScheduler, TableSubscription, TableUpdate};
use crate::sequence::{FetchSequencer, FetchTicket};
use crate::source::TableSource;

/// How a refresh treats cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Serve from cache while the entry is valid; fetch otherwise.
    #[default]
    CachedOk,

    /// Always fetch, even over a valid entry.
    Force,
}

impl RefreshMode {
    fn is_force(self) -> bool {
        matches!(self, RefreshMode::Force)
    }
}

/// Outcome of one refresh request.
///
/// A refresh never returns `Err`: unreachable backends and failed fetches
/// are ordinary outcomes, logged here and handed to the caller to decide
/// what (if anything) to surface.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The cache entry was valid; served without network traffic.
    Cached(TableRead<Vec<Row>>),

    /// Fetched and applied a new snapshot.
    Refreshed(TableRead<Vec<Row>>),

    /// The fetch completed, but a newer fetch for the table was dispatched
    /// meanwhile; this response was discarded and the cache left untouched.
    Superseded,

    /// The reachability probe failed; nothing was fetched and the previous
    /// payload (if any) is untouched.
    Offline,

    /// The fetch failed; the previous payload (if any) is untouched and
    /// keeps serving.
    Failed(ClientError),
}

impl RefreshOutcome {
    /// Whether this outcome carries servable data.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RefreshOutcome::Cached(_) | RefreshOutcome::Refreshed(_)
        )
    }

    /// Whether the refresh could not produce data.
    pub fn is_failure(&self) -> bool {
        matches!(self, RefreshOutcome::Offline | RefreshOutcome::Failed(_))
    }

    /// The data carried by a successful outcome.
    pub fn read(&self) -> Option<&TableRead<Vec<Row>>> {
        match self {
            RefreshOutcome::Cached(read) | RefreshOutcome::Refreshed(read) => Some(read),
            _ => None,
        }
    }

    /// Consume the outcome, keeping the data of a successful one.
    pub fn into_read(self) -> Option<TableRead<Vec<Row>>> {
        match self {
            RefreshOutcome::Cached(read) | RefreshOutcome::Refreshed(read) => Some(read),
            _ => None,
        }
    }
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshOutcome::Cached(_) => write!(f, "cached"),
            RefreshOutcome::Refreshed(_) => write!(f, "refreshed"),
            RefreshOutcome::Superseded => write!(f, "superseded"),
            RefreshOutcome::Offline => write!(f, "offline"),
            RefreshOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Inner state shared across manager clones.
struct ManagerInner<S> {
    /// Snapshot source.
    source: S,

    /// The snapshot cache.
    cache: TableCache<Vec<Row>>,

    /// Dispatch-order bookkeeping for concurrent fetches.
    sequencer: FetchSequencer,

    /// Background loop lifecycle and subscriber fan-out.
    scheduler: RefreshScheduler,

    /// Serializes check-and-apply of fetched snapshots.
    apply_lock: tokio::sync::Mutex<()>,
}

/// Read-through synchronization service for table snapshots.
///
/// One manager serves any number of tables and consumers:
/// - [`refresh`](SyncManager::refresh) reads through the cache, fetching
///   only when the entry is invalid or a forced refresh asks for it
/// - [`subscribe`](SyncManager::subscribe) keeps a table refreshed in the
///   background for as long as it has subscribers
/// - concurrent fetches are sequenced, so an old response never overwrites
///   a newer snapshot
///
/// Cloning the manager is cheap and clones share state.
pub struct SyncManager<S> {
    inner: Arc<ManagerInner<S>>,
}

impl<S: TableSource> SyncManager<S> {
    /// Create a manager over a snapshot source.
    pub fn new(source: S) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                source,
                cache: TableCache::new(),
                sequencer: FetchSequencer::new(),
                scheduler: RefreshScheduler::new(),
                apply_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// The underlying cache.
    ///
    /// Direct reads (payloads, timestamps, status reports) go through here;
    /// writes normally arrive via refreshes.
    pub fn cache(&self) -> &TableCache<Vec<Row>> {
        &self.inner.cache
    }

    /// Read a table through the cache, fetching when needed.
    ///
    /// The cache is consulted first unless `mode` forces a fetch, and an
    /// unreachable backend aborts before any fetch. See [`RefreshOutcome`]
    /// for the possible results.
    pub async fn refresh(&self, table: &str, mode: RefreshMode) -> RefreshOutcome {
        if self.inner.cache.is_valid(table, mode.is_force()).await {
            if let Some(read) = self.inner.cache.read(table).await {
                debug!(table = %table, version = read.version, "Serving table from cache");
                return RefreshOutcome::Cached(read);
            }
        }

        if !self.inner.source.is_reachable().await {
            debug!(table = %table, "Refresh skipped, backend unreachable");
            return RefreshOutcome::Offline;
        }

        let ticket = self.inner.sequencer.begin(table);
        match self.inner.source.fetch_all(table).await {
            Ok(rows) => match self.apply(table, ticket, rows).await {
                Some(read) => {
                    debug!(
                        table = %table,
                        version = read.version,
                        rows = read.rows.len(),
                        "Table refreshed"
                    );
                    RefreshOutcome::Refreshed(read)
                }
                None => {
                    debug!(table = %table, "Refresh superseded by a newer fetch, discarding");
                    RefreshOutcome::Superseded
                }
            },
            Err(e) => {
                // The last good snapshot stays in place and keeps serving.
                warn!(table = %table, error = %e, "Refresh failed, keeping previous snapshot");
                RefreshOutcome::Failed(e)
            }
        }
    }

    /// Remove a table's entry and forget its dispatch history.
    ///
    /// An in-flight fetch for the table cannot repopulate it afterwards:
    /// its ticket stopped being current.
    pub async fn clear(&self, table: &str) {
        let _guard = self.inner.apply_lock.lock().await;
        self.inner.sequencer.forget(table);
        self.inner.cache.clear(table).await;
    }

    /// Remove every entry and all dispatch history.
    pub async fn clear_all(&self) {
        let _guard = self.inner.apply_lock.lock().await;
        self.inner.sequencer.forget_all();
        self.inner.cache.clear_all().await;
    }

    /// Number of live subscriptions for a table.
    pub fn subscriber_count(&self, table: &str) -> usize {
        self.inner.scheduler.subscriber_count(table)
    }

    /// Whether a table's background loop is running.
    pub fn is_syncing(&self, table: &str) -> bool {
        self.inner.scheduler.is_running(table)
    }

    /// Stop every background refresh loop.
    ///
    /// Open subscriptions see their channel close. In-flight fetches are
    /// not aborted; foreground refreshes keep working.
    pub fn shutdown(&self) {
        self.inner.scheduler.shutdown_all();
    }

    /// One background refresh cycle for a table.
    ///
    /// A failed fetch marks the entry stale (payload stays readable); an
    /// unreachable backend skips the cycle entirely.
    async fn background_tick(&self, table: &str) {
        if !self.inner.source.is_reachable().await {
            debug!(table = %table, "Skipping background refresh, backend unreachable");
            return;
        }

        let ticket = self.inner.sequencer.begin(table);
        match self.inner.source.fetch_all(table).await {
            Ok(rows) => {
                if self.apply(table, ticket, rows).await.is_none() {
                    debug!(table = %table, "Background refresh superseded, discarding");
                }
            }
            Err(e) => {
                let _guard = self.inner.apply_lock.lock().await;
                if self.inner.sequencer.is_current(table, ticket) {
                    warn!(table = %table, error = %e, "Background refresh failed, marking table stale");
                    self.inner.cache.mark_stale(table).await;
                } else {
                    debug!(table = %table, error = %e, "Background refresh failed after being superseded, ignoring");
                }
            }
        }
    }

    /// Apply a fetched snapshot if its ticket is still current.
    ///
    /// Check and apply run under one lock, so applies are strictly ordered
    /// by dispatch. Returns `None` when the ticket was superseded; the
    /// cache is untouched in that case.
    async fn apply(
        &self,
        table: &str,
        ticket: FetchTicket,
        rows: Vec<Row>,
    ) -> Option<TableRead<Vec<Row>>> {
        let _guard = self.inner.apply_lock.lock().await;
        if !self.inner.sequencer.is_current(table, ticket) {
            return None;
        }

        let version = self.inner.cache.update(table, rows).await;
        let read = self.inner.cache.read(table).await?;
        self.inner.scheduler.notify(TableUpdate {
            table: table.to_string(),
            rows: Arc::clone(&read.rows),
            version,
            last_updated: read.last_updated,
        });
        Some(read)
    }
}

impl<S: TableSource + 'static> SyncManager<S> {
    /// Subscribe to a table's refreshes and keep it synchronized.
    ///
    /// The first subscription for a table starts its background loop, which
    /// refetches the table every [`SYNC_INTERVAL`]; dropping the last one
    /// stops the loop. The initial fetch is the caller's move: call
    /// [`refresh`](SyncManager::refresh) after subscribing.
    pub fn subscribe(&self, table: &str) -> TableSubscription {
        let manager = self.clone();
        let name = table.to_string();
        self.inner
            .scheduler
            .subscribe(table, move |shutdown_rx| async move {
                manager.run_refresh_loop(name, shutdown_rx).await;
            })
    }

    /// One table's background loop: tick every sync interval until shutdown.
    async fn run_refresh_loop(self, table: String, mut shutdown_rx: watch::Receiver<bool>) {
        // The subscriber's own foreground refresh covers the present;
        // ticks start one full interval out.
        let start = tokio::time::Instant::now() + SYNC_INTERVAL;
        let mut ticker = tokio::time::interval_at(start, SYNC_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(
            table = %table,
            period_secs = SYNC_INTERVAL.as_secs(),
            "Background refresh loop started"
        );

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.background_tick(&table).await;
                }
            }
        }

        debug!(table = %table, "Background refresh loop stopped");
    }
}

impl<S> Clone for SyncManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
