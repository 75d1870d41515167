//! Tables API.

use crate::client::StocktakeClient;
use crate::error::Result;
use crate::types::Row;

/// Tables API client.
///
/// The backend exposes one endpoint per table that returns the table's
/// entire contents as a JSON array. There is no pagination, filtering or
/// incremental variant; a fetch is always the whole snapshot.
pub struct TablesApi {
    client: StocktakeClient,
}

impl TablesApi {
    pub(crate) fn new(client: StocktakeClient) -> Self {
        Self { client }
    }

    /// Fetch every row of a table.
    ///
    /// Rows come back in backend order, untouched. A non-array body is a
    /// decode error, reported like any other fetch failure.
    pub async fn fetch_all(&self, table: &str) -> Result<Vec<Row>> {
        self.client.get(table).await
    }
}
