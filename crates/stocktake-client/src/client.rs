//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use url::Url;

use crate::api::{HealthApi, TablesApi};
use crate::error::{Error, ErrorResponse, Result};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Stocktake backend client.
///
/// Provides typed access to the inventory backend: whole-table fetches and
/// the reachability probe.
///
/// # Example
///
/// ```no_run
/// use stocktake_client::StocktakeClient;
///
/// # async fn example() -> stocktake_client::Result<()> {
/// let client = StocktakeClient::builder()
///     .base_url("http://localhost:8080")
///     .auth_token("secret")
///     .build()?;
///
/// let items = client.tables().fetch_all("items").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StocktakeClient {
    /// Inner shared state.
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    /// HTTP client.
    pub(crate) http: reqwest::Client,
    /// Base URL for API requests.
    pub(crate) base_url: Url,
    /// Request timeout.
    pub(crate) timeout: Duration,
}

impl StocktakeClient {
    /// Get access to the inner client state (for API implementations).
    pub(crate) fn inner(&self) -> &ClientInner {
        &self.inner
    }
}

impl StocktakeClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client with default settings pointing to localhost.
    pub fn localhost() -> Result<Self> {
        Self::builder().base_url("http://127.0.0.1:8080").build()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the tables API.
    pub fn tables(&self) -> TablesApi {
        TablesApi::new(self.clone())
    }

    /// Access the health API.
    pub fn health(&self) -> HealthApi {
        HealthApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner
            .base_url
            .join(&format!("api/{}", path))
            .map_err(Error::from)
    }

    /// Make a GET request.
    pub(crate) async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .inner
            .http
            .get(url)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Handle a response, extracting the body or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();

        // Try to parse error response
        match response.json::<ErrorResponse>().await {
            Ok(err) => {
                if status == 404 {
                    Error::NotFound(err.message)
                } else if status == 401 {
                    Error::Auth(err.message)
                } else {
                    Error::Api {
                        status,
                        code: err.code,
                        message: err.message,
                    }
                }
            }
            Err(_) => Error::Api {
                status,
                code: "unknown".to_string(),
                message: format!("HTTP {}", status),
            },
        }
    }
}

/// Builder for creating a StocktakeClient.
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    auth_token: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            auth_token: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the base URL for the backend.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the authentication token.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<StocktakeClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        // Build default headers
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| Error::Config("Invalid auth token".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        // Build HTTP client
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("stocktake-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        Ok(StocktakeClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        let result = ClientBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_with_base_url() {
        let client = ClientBuilder::new()
            .base_url("http://localhost:8080")
            .build()
            .unwrap();

        assert_eq!(client.base_url().as_str(), "http://localhost:8080/");
    }

    #[test]
    fn test_builder_normalizes_trailing_slash() {
        let client = ClientBuilder::new()
            .base_url("http://localhost:8080/")
            .build()
            .unwrap();

        assert_eq!(client.base_url().as_str(), "http://localhost:8080/");
    }

    #[test]
    fn test_url_building() {
        let client = ClientBuilder::new()
            .base_url("http://localhost:8080")
            .build()
            .unwrap();

        let url = client.url("items").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/items");

        let url = client.url("/items").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/items");
    }

    #[test]
    fn test_url_building_with_base_path() {
        let client = ClientBuilder::new()
            .base_url("http://localhost:8080/inventory")
            .build()
            .unwrap();

        let url = client.url("items").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/inventory/api/items");
    }
}
