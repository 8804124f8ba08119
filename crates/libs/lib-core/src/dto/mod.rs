//! # Data Transfer Objects (DTOs)
//!
//! Structures exchanged with the marketplace API, the search backend, and the
//! presentation layer.
//!
//! - **[`market`]**: Trending collections and time buckets
//! - **[`search`]**: Search results, pagination, and item details

pub mod market;
pub mod search;

pub use market::*;
pub use search::*;

use serde::{Deserialize, Serialize};

/// Error body returned by the proxy: `{ "error": ..., "details": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
