//! # HTTP Request Handlers
//!
//! - **[`proxy`]**: Read-only pass-through to the marketplace API
//!   - `ANY /api/magic-eden/{*path}`
//!
//! - **[`collections`]**: Cached, normalized collection data
//!   - `GET /api/collections/popular`
//!   - `GET /api/collections/trending`
//!   - `GET /api/collections/timeframes`
//!   - `GET /api/collections/by-symbol/{symbol}` and `.../stats`
//!   - `DELETE /api/collections/cache`

pub mod collections;
pub mod proxy;
