//! # Core Library
//!
//! Configuration, the shared error type, and the DTOs exchanged with the
//! marketplace API, the search backend, and the presentation layer.

pub mod config;
pub mod error;
pub mod dto;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
