//! Health API.

use crate::client::StocktakeClient;
use crate::error::Result;
use crate::types::HealthResponse;

/// Health API client.
///
/// Note: Health endpoints typically don't require authentication.
pub struct HealthApi {
    client: StocktakeClient,
}

impl HealthApi {
    pub(crate) fn new(client: StocktakeClient) -> Self {
        Self { client }
    }

    /// Check basic health.
    pub async fn check(&self) -> Result<HealthResponse> {
        // Health endpoint is at root, not under /api
        let inner = self.client.inner();
        let url = inner
            .base_url
            .join("health")
            .map_err(crate::error::Error::from)?;

        let response: reqwest::Response = inner
            .http
            .get(url)
            .timeout(inner.timeout)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(crate::error::Error::Api {
                status: response.status().as_u16(),
                code: "health_check_failed".to_string(),
                message: "Health check failed".to_string(),
            })
        }
    }

    /// Connectivity probe - returns true if the backend is reachable.
    ///
    /// Any failure (connect, timeout, bad status, bad body) reads as
    /// unreachable; the reason is logged rather than surfaced.
    pub async fn is_reachable(&self) -> bool {
        match self.check().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Backend unreachable");
                false
            }
        }
    }
}
