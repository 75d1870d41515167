//! Source seam for table snapshots.

use std::sync::Arc;

use async_trait::async_trait;
use stocktake_client::{Result, Row, StocktakeClient};

/// Where table snapshots come from.
///
/// The engine only ever asks for a whole table at once, and probes
/// reachability before fetching. Implemented for [`StocktakeClient`];
/// tests supply in-memory sources.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Fetch every row of a table.
    async fn fetch_all(&self, table: &str) -> Result<Vec<Row>>;

    /// Whether the backend is currently reachable.
    async fn is_reachable(&self) -> bool;
}

#[async_trait]
impl TableSource for StocktakeClient {
    async fn fetch_all(&self, table: &str) -> Result<Vec<Row>> {
        self.tables().fetch_all(table).await
    }

    async fn is_reachable(&self) -> bool {
        self.health().is_reachable().await
    }
}

#[async_trait]
impl<S: TableSource + ?Sized> TableSource for Arc<S> {
    async fn fetch_all(&self, table: &str) -> Result<Vec<Row>> {
        (**self).fetch_all(table).await
    }

    async fn is_reachable(&self) -> bool {
        (**self).is_reachable().await
    }
}
