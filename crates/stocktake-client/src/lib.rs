//! HTTP client SDK for the Stocktake inventory backend.
//!
//! This crate provides a typed client for the backend's read API: whole-table
//! fetches and a reachability probe. Table payloads are opaque JSON rows; the
//! backend owns the schema.
//!
//! # Example
//!
//! ```no_run
//! use stocktake_client::{StocktakeClient, Result};
//!
//! # async fn example() -> Result<()> {
//! // Create a client
//! let client = StocktakeClient::builder()
//!     .base_url("http://localhost:8080")
//!     .auth_token("secret")
//!     .build()?;
//!
//! // Probe connectivity before fetching
//! if client.health().is_reachable().await {
//!     let items = client.tables().fetch_all("items").await?;
//!     println!("{} items", items.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientBuilder, StocktakeClient};
pub use error::{Error, Result};
pub use types::{HealthResponse, Row};
