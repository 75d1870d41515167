//! Response types for the inventory backend API.
//!
//! Row payloads are carried as raw JSON values: the backend owns the schema
//! and this layer hands rows through as returned, without validation.

use serde::{Deserialize, Serialize};

/// One table row, as returned by the backend.
pub type Row = serde_json::Value;

/// Health probe response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Reported status, normally "ok".
    pub status: String,

    /// Backend version, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
