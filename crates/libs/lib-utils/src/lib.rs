//! # Utilities Library
//!
//! Shared utility functions for environment variables, time, cancellation, and validation.

pub mod cancel;
pub mod envs;
pub mod time;
pub mod validation;

// Re-export commonly used functions
pub use cancel::CancellationToken;
pub use envs::{get_env, get_env_or, get_env_parse, get_env_parse_or};
pub use time::{age_millis, now_millis};
pub use validation::{encode_path_segment, validate_http_url, validate_range};
