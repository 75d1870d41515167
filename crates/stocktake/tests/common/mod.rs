//! Common test utilities for integration tests.

use anyhow::Result;
use serde_json::{Value, json};
use stocktake::{StocktakeClient, SyncManager};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A mock inventory backend with a sync manager wired to it.
pub struct TestBackend {
    /// The mock HTTP server standing in for the backend.
    pub server: MockServer,
    /// Manager fetching through a real client against the mock.
    pub manager: SyncManager<StocktakeClient>,
}

impl TestBackend {
    /// Start a backend whose health probe succeeds.
    pub async fn start() -> Result<Self> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        Self::over(server)
    }

    /// Start a backend whose health probe fails.
    pub async fn start_unreachable() -> Result<Self> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        Self::over(server)
    }

    fn over(server: MockServer) -> Result<Self> {
        let client = StocktakeClient::builder().base_url(server.uri()).build()?;
        Ok(Self {
            server,
            manager: SyncManager::new(client),
        })
    }

    /// Serve `rows` for every fetch of `table`.
    pub async fn serve_table(&self, table: &str, rows: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/{table}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(&self.server)
            .await;
    }
}
