//! # Market Library
//!
//! Marketplace data access: the v2/v3 gateway, the cached collection service,
//! the session store and the trending aggregator built on top of them.

// region: --- Modules
pub mod cache;
pub mod fallback;
pub mod gateway;
pub mod normalize;
pub mod store;
pub mod timeframes;
pub mod trending;
// endregion: --- Modules

pub use cache::{CacheSettings, CollectionCacheService};
pub use gateway::{MarketUpstream, UpstreamGateway};
pub use store::{FileStore, MemoryStore, SessionStore};
pub use trending::{TrendingAggregator, TrendingSource, TrendingState, TRENDING_CACHE_KEY};
