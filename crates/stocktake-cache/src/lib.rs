//! Whole-table snapshot cache with bounded staleness.
//!
//! This crate provides the in-memory data layer for table synchronization:
//! - one entry per table name, holding the table's full row snapshot
//! - freshness derived from the last populate and a fixed [`SYNC_INTERVAL`]
//! - an explicit stale flag for failed background refreshes
//! - thread-safe, infallible operations shared across clones
//!
//! # Example
//!
//! ```rust,ignore
//! use stocktake_cache::TableCache;
//!
//! let cache: TableCache<Vec<serde_json::Value>> = TableCache::new();
//!
//! cache.update("items", rows).await;
//! if cache.is_valid("items", false).await {
//!     let rows = cache.rows("items").await;
//! }
//! ```

mod cache;
mod entry;

pub use cache::{CacheStats, TableCache, TableStatus};
pub use entry::{SYNC_INTERVAL, TableEntry, TableRead, TableState};
