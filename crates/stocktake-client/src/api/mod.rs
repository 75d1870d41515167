//! API endpoint implementations.

mod health;
mod tables;

pub use health::HealthApi;
pub use tables::TablesApi;
