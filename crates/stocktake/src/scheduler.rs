//! Per-table background refresh scheduling.
//!
//! One refresh loop per table, started when the table gains its first
//! subscriber and stopped when its last subscription drops. The loops
//! themselves are supplied by the sync manager; this module owns their
//! lifecycle and the subscriber fan-out.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use stocktake_client::Row;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Broadcast to a table's subscribers after every successful snapshot apply.
#[derive(Debug, Clone)]
pub struct TableUpdate {
    /// Table that changed.
    pub table: String,

    /// The new payload.
    pub rows: Arc<Vec<Row>>,

    /// Version assigned by the cache.
    pub version: u64,

    /// Wall-clock time of the populate.
    pub last_updated: DateTime<Utc>,
}

/// State for one table's refresh loop.
struct TableTask {
    /// Live subscriber channels, keyed by subscription id.
    subscribers: HashMap<u64, mpsc::UnboundedSender<TableUpdate>>,

    /// Signals the loop to stop.
    shutdown_tx: watch::Sender<bool>,

    /// Loop task handle (kept alive).
    #[allow(dead_code)]
    task: tokio::task::JoinHandle<()>,
}

/// Starts, stops and fans out to per-table refresh loops.
pub(crate) struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    /// Running loops, keyed by table name.
    tables: Mutex<HashMap<String, TableTask>>,

    /// Next subscription id.
    next_subscriber_id: AtomicU64,
}

impl RefreshScheduler {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                tables: Mutex::new(HashMap::new()),
                next_subscriber_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a subscriber for a table.
    ///
    /// The first subscriber spawns the table's refresh loop from `run`;
    /// later subscribers share it. Must be called within a tokio runtime.
    pub(crate) fn subscribe<F, Fut>(&self, table: &str, run: F) -> TableSubscription
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut tables = self.inner.tables.lock();
        match tables.get_mut(table) {
            Some(task) => {
                task.subscribers.insert(id, tx);
            }
            None => {
                debug!(table = %table, "First subscriber, starting refresh loop");
                let (shutdown_tx, shutdown_rx) = watch::channel(false);
                let task = tokio::spawn(run(shutdown_rx));

                let mut subscribers = HashMap::new();
                subscribers.insert(id, tx);
                tables.insert(
                    table.to_string(),
                    TableTask {
                        subscribers,
                        shutdown_tx,
                        task,
                    },
                );
            }
        }
        drop(tables);

        TableSubscription {
            table: table.to_string(),
            id,
            rx,
            scheduler: Arc::clone(&self.inner),
        }
    }

    /// Fan an update out to the table's subscribers.
    pub(crate) fn notify(&self, update: TableUpdate) {
        let tables = self.inner.tables.lock();
        let Some(task) = tables.get(&update.table) else {
            return;
        };
        for tx in task.subscribers.values() {
            // A closed channel just means the subscription is mid-drop.
            let _ = tx.send(update.clone());
        }
    }

    /// Number of live subscriptions for a table.
    pub(crate) fn subscriber_count(&self, table: &str) -> usize {
        self.inner
            .tables
            .lock()
            .get(table)
            .map_or(0, |task| task.subscribers.len())
    }

    /// Whether a table currently has a refresh loop.
    pub(crate) fn is_running(&self, table: &str) -> bool {
        self.inner.tables.lock().contains_key(table)
    }

    /// Stop every refresh loop and drop all subscriber channels.
    pub(crate) fn shutdown_all(&self) {
        let mut tables = self.inner.tables.lock();
        for (table, task) in tables.drain() {
            debug!(table = %table, "Stopping refresh loop");
            let _ = task.shutdown_tx.send(true);
        }
    }
}

impl SchedulerInner {
    /// Drop one subscription; stops the table's loop when it was the last.
    fn release(&self, table: &str, id: u64) {
        let mut tables = self.tables.lock();
        let Some(task) = tables.get_mut(table) else {
            return;
        };
        task.subscribers.remove(&id);

        if task.subscribers.is_empty() {
            debug!(table = %table, "Last subscriber gone, stopping refresh loop");
            if let Some(task) = tables.remove(table) {
                let _ = task.shutdown_tx.send(true);
            }
        }
    }
}

/// A live subscription to one table's successful refreshes.
///
/// Updates arrive only when a refresh applies a new snapshot; failed and
/// skipped refreshes deliver nothing. Dropping the subscription releases its
/// slot, and a table's refresh loop stops with its last subscription.
pub struct TableSubscription {
    table: String,
    id: u64,
    rx: mpsc::UnboundedReceiver<TableUpdate>,
    scheduler: Arc<SchedulerInner>,
}

impl TableSubscription {
    /// Wait for the next successful refresh of this table.
    ///
    /// Returns `None` once the scheduler has shut down.
    pub async fn recv(&mut self) -> Option<TableUpdate> {
        self.rx.recv().await
    }

    /// Take a pending update without waiting.
    pub fn try_recv(&mut self) -> Option<TableUpdate> {
        self.rx.try_recv().ok()
    }

    /// Table this subscription follows.
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl Drop for TableSubscription {
    fn drop(&mut self) {
        self.scheduler.release(&self.table, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::sleep;

    fn update(table: &str, version: u64) -> TableUpdate {
        TableUpdate {
            table: table.to_string(),
            rows: Arc::new(vec![serde_json::json!({"id": version})]),
            version,
            last_updated: Utc::now(),
        }
    }

    /// A stand-in loop that counts spawns and parks until shutdown.
    fn counting_loop(
        spawns: &Arc<AtomicUsize>,
    ) -> impl FnOnce(watch::Receiver<bool>) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>>
    {
        let spawns = Arc::clone(spawns);
        move |mut shutdown_rx| {
            Box::pin(async move {
                spawns.fetch_add(1, Ordering::SeqCst);
                let _ = shutdown_rx.changed().await;
            })
        }
    }

    #[tokio::test]
    async fn test_first_subscriber_spawns_loop_once() {
        let scheduler = RefreshScheduler::new();
        let spawns = Arc::new(AtomicUsize::new(0));

        let _a = scheduler.subscribe("items", counting_loop(&spawns));
        let _b = scheduler.subscribe("items", counting_loop(&spawns));
        sleep(Duration::from_millis(20)).await;

        assert_eq!(spawns.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.subscriber_count("items"), 2);
        assert!(scheduler.is_running("items"));
    }

    #[tokio::test]
    async fn test_loop_stops_with_last_subscriber() {
        let scheduler = RefreshScheduler::new();
        let spawns = Arc::new(AtomicUsize::new(0));

        let a = scheduler.subscribe("items", counting_loop(&spawns));
        let b = scheduler.subscribe("items", counting_loop(&spawns));

        drop(a);
        assert_eq!(scheduler.subscriber_count("items"), 1);
        assert!(scheduler.is_running("items"));

        drop(b);
        assert_eq!(scheduler.subscriber_count("items"), 0);
        assert!(!scheduler.is_running("items"));
    }

    #[tokio::test]
    async fn test_resubscribe_restarts_loop() {
        let scheduler = RefreshScheduler::new();
        let spawns = Arc::new(AtomicUsize::new(0));

        let a = scheduler.subscribe("items", counting_loop(&spawns));
        drop(a);
        let _b = scheduler.subscribe("items", counting_loop(&spawns));
        sleep(Duration::from_millis(20)).await;

        assert_eq!(spawns.load(Ordering::SeqCst), 2);
        assert!(scheduler.is_running("items"));
    }

    #[tokio::test]
    async fn test_tables_run_independent_loops() {
        let scheduler = RefreshScheduler::new();
        let spawns = Arc::new(AtomicUsize::new(0));

        let items = scheduler.subscribe("items", counting_loop(&spawns));
        let _users = scheduler.subscribe("users", counting_loop(&spawns));
        sleep(Duration::from_millis(20)).await;

        assert_eq!(spawns.load(Ordering::SeqCst), 2);

        drop(items);
        assert!(!scheduler.is_running("items"));
        assert!(scheduler.is_running("users"));
    }

    #[tokio::test]
    async fn test_notify_reaches_all_subscribers() {
        let scheduler = RefreshScheduler::new();
        let spawns = Arc::new(AtomicUsize::new(0));

        let mut a = scheduler.subscribe("items", counting_loop(&spawns));
        let mut b = scheduler.subscribe("items", counting_loop(&spawns));

        scheduler.notify(update("items", 3));

        let got_a = a.recv().await.unwrap();
        let got_b = b.recv().await.unwrap();
        assert_eq!(got_a.version, 3);
        assert_eq!(got_b.version, 3);
        assert_eq!(got_a.table, "items");
    }

    #[tokio::test]
    async fn test_notify_unknown_table_is_noop() {
        let scheduler = RefreshScheduler::new();
        scheduler.notify(update("items", 1));
    }

    #[tokio::test]
    async fn test_notify_does_not_cross_tables() {
        let scheduler = RefreshScheduler::new();
        let spawns = Arc::new(AtomicUsize::new(0));

        let mut items = scheduler.subscribe("items", counting_loop(&spawns));
        let _users = scheduler.subscribe("users", counting_loop(&spawns));

        scheduler.notify(update("users", 1));

        assert!(items.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_all_closes_subscriptions() {
        let scheduler = RefreshScheduler::new();
        let spawns = Arc::new(AtomicUsize::new(0));

        let mut sub = scheduler.subscribe("items", counting_loop(&spawns));
        scheduler.shutdown_all();

        assert!(sub.recv().await.is_none());
        assert!(!scheduler.is_running("items"));
    }
}
