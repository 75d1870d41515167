//! Table synchronization engine for the Stocktake inventory backend.
//!
//! Consumers read whole-table snapshots through [`SyncManager`], which
//! serves the cached copy while it is fresh and refetches it when it is
//! not:
//!
//! - reads go through [`SyncManager::refresh`] and come back as a
//!   [`RefreshOutcome`], never as a panic or a silent miss
//! - each subscribed table is refetched in the background every
//!   [`SYNC_INTERVAL`], for as long as it has subscribers
//! - out-of-order fetch completions are discarded, never applied
//!
//! # Example
//!
//! ```no_run
//! use stocktake::{RefreshMode, StocktakeClient, SyncManager};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = StocktakeClient::builder()
//!     .base_url("http://localhost:8080")
//!     .build()?;
//! let manager = SyncManager::new(client);
//!
//! // Keep "items" synchronized and watch its refreshes.
//! let mut updates = manager.subscribe("items");
//! let outcome = manager.refresh("items", RefreshMode::CachedOk).await;
//! if let Some(read) = outcome.read() {
//!     println!("{} rows (version {})", read.rows.len(), read.version);
//! }
//! while let Some(update) = updates.recv().await {
//!     println!("items moved to version {}", update.version);
//! }
//! # Ok(())
//! # }
//! ```

pub mod manager;
pub mod scheduler;
pub mod sequence;
pub mod source;

pub use manager::{RefreshMode, RefreshOutcome, SyncManager};
pub use scheduler::{TableSubscription, TableUpdate};
pub use sequence::{FetchSequencer, FetchTicket};
pub use source::TableSource;

pub use stocktake_cache::{
    CacheStats, SYNC_INTERVAL, TableCache, TableEntry, TableRead, TableState, TableStatus,
};
pub use stocktake_client::{ClientBuilder, Error as ClientError, Row, StocktakeClient};
