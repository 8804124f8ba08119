//! # Trending Aggregator
//!
//! Loads the merged multi-bucket trending view, backed by a session snapshot.
//!
//! A load first looks for a snapshot younger than the TTL (5 minutes by
//! default) under [`TRENDING_CACHE_KEY`]. Only when there is none are the
//! buckets fetched; the result is then written back. Expired snapshots are
//! never served.
//!
//! The aggregator reports an error only when every bucket failed. Partial
//! failures render the buckets that did load.

use crate::cache::CollectionCacheService;
use crate::store::{load_snapshot, save_snapshot, SessionStore};
use async_trait::async_trait;
use lib_core::dto::{TimeFrame, TimeframeCollections, TrendingCollection};
use lib_core::Result;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Session key of the persisted trending snapshot.
pub const TRENDING_CACHE_KEY: &str = "solana-trending-collections-cache";

/// Message shown when no bucket could be loaded.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load collections";

/// Source of per-bucket collection lists.
#[async_trait]
pub trait TrendingSource: Send + Sync {
    async fn fetch_timeframes(&self, time_frames: &[TimeFrame]) -> TimeframeCollections;
}

#[async_trait]
impl TrendingSource for CollectionCacheService {
    async fn fetch_timeframes(&self, time_frames: &[TimeFrame]) -> TimeframeCollections {
        self.get_timeframe_collections(time_frames).await
    }
}

/// What the trending view renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingState {
    pub timeframe_data: BTreeMap<TimeFrame, Vec<TrendingCollection>>,
    pub collections: Vec<TrendingCollection>,
    pub loading: bool,
    pub error: Option<String>,
    /// `true` when the data came from the session snapshot.
    pub from_cache: bool,
}

pub struct TrendingAggregator {
    source: Arc<dyn TrendingSource>,
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    time_frames: Vec<TimeFrame>,
    state: RwLock<TrendingState>,
}

impl TrendingAggregator {
    pub fn new(source: Arc<dyn TrendingSource>, store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self {
            source,
            store,
            ttl,
            time_frames: TimeFrame::TRENDING.to_vec(),
            state: RwLock::new(TrendingState::default()),
        }
    }

    /// Current view state.
    pub fn state(&self) -> TrendingState {
        self.state.read().clone()
    }

    /// Serve the session snapshot when fresh, otherwise fetch and store.
    pub async fn load(&self) -> TrendingState {
        if let Some(cached) =
            load_snapshot::<TimeframeCollections>(self.store.as_ref(), TRENDING_CACHE_KEY, self.ttl).await
        {
            if !cached.timeframe_data.is_empty() {
                debug!("Trending view served from session snapshot");
                let mut state = self.state.write();
                *state = TrendingState {
                    timeframe_data: cached.timeframe_data,
                    collections: cached.collections,
                    loading: false,
                    error: None,
                    from_cache: true,
                };
                return state.clone();
            }
        }

        self.fetch_and_store().await
    }

    /// Ignore the snapshot and fetch every bucket again.
    pub async fn refresh(&self) -> TrendingState {
        self.fetch_and_store().await
    }

    /// Forget the session snapshot so the next load fetches.
    pub async fn invalidate(&self) -> Result<()> {
        self.store.remove(TRENDING_CACHE_KEY).await
    }

    async fn fetch_and_store(&self) -> TrendingState {
        self.state.write().loading = true;

        let data = self.source.fetch_timeframes(&self.time_frames).await;

        if data.all_failed() {
            warn!("Every trending bucket failed ({:?})", data.failed);
            let mut state = self.state.write();
            *state = TrendingState {
                error: Some(LOAD_FAILED_MESSAGE.to_string()),
                ..TrendingState::default()
            };
            return state.clone();
        }

        if let Err(e) = save_snapshot(self.store.as_ref(), TRENDING_CACHE_KEY, &data).await {
            warn!("Could not persist trending snapshot: {}", e);
        }

        info!(
            "Trending view loaded: {} collections across {} buckets",
            data.collections.len(),
            data.timeframe_data.len()
        );

        let mut state = self.state.write();
        *state = TrendingState {
            timeframe_data: data.timeframe_data,
            collections: data.collections,
            loading: false,
            error: None,
            from_cache: false,
        };
        state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::timeframes::merge_timeframes;
    use lib_utils::time::now_millis;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        fail: Vec<TimeFrame>,
    }

    impl CountingSource {
        fn new(fail: Vec<TimeFrame>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl TrendingSource for CountingSource {
        async fn fetch_timeframes(&self, time_frames: &[TimeFrame]) -> TimeframeCollections {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let mut timeframe_data = BTreeMap::new();
            let mut failed = Vec::new();
            for tf in time_frames {
                if self.fail.contains(tf) {
                    failed.push(*tf);
                    timeframe_data.insert(*tf, Vec::new());
                } else {
                    let collection = TrendingCollection {
                        symbol: format!("top_{}", tf),
                        rank: Some(1),
                        time_range: Some(*tf),
                        ..Default::default()
                    };
                    timeframe_data.insert(*tf, vec![collection]);
                }
            }
            TimeframeCollections {
                collections: merge_timeframes(time_frames, &timeframe_data),
                timeframe_data,
                failed,
            }
        }
    }

    fn aggregator(source: Arc<CountingSource>, store: Arc<MemoryStore>) -> TrendingAggregator {
        TrendingAggregator::new(source, store, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_second_load_uses_snapshot() {
        let source = CountingSource::new(vec![]);
        let store = Arc::new(MemoryStore::new());

        let first = aggregator(source.clone(), store.clone()).load().await;
        assert!(!first.from_cache);
        assert_eq!(first.collections.len(), 3);

        // A fresh aggregator stands in for remounting the view.
        let second = aggregator(source.clone(), store.clone()).load().await;
        assert!(second.from_cache);
        assert_eq!(second.collections, first.collections);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_snapshot_triggers_fetch() {
        let source = CountingSource::new(vec![]);
        let store = Arc::new(MemoryStore::new());
        let stale = json!({
            "data": { "collections": [], "timeframeData": { "1h": [] } },
            "timestamp": now_millis() - 6 * 60 * 1000
        });
        store.set(TRENDING_CACHE_KEY, stale.to_string()).await.unwrap();

        let state = aggregator(source.clone(), store).load().await;
        assert!(!state.from_cache);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_still_renders() {
        let source = CountingSource::new(vec![TimeFrame::OneDay]);
        let store = Arc::new(MemoryStore::new());

        let state = aggregator(source, store).load().await;
        assert_eq!(state.error, None);
        assert_eq!(state.collections.len(), 2);
        assert!(state.timeframe_data[&TimeFrame::OneDay].is_empty());
    }

    #[tokio::test]
    async fn test_total_failure_sets_error_and_skips_snapshot() {
        let source = CountingSource::new(TimeFrame::TRENDING.to_vec());
        let store = Arc::new(MemoryStore::new());

        let agg = aggregator(source, store.clone());
        let state = agg.load().await;

        assert_eq!(state.error.as_deref(), Some(LOAD_FAILED_MESSAGE));
        assert!(state.collections.is_empty());
        assert!(!state.loading);
        assert_eq!(store.get(TRENDING_CACHE_KEY).await.unwrap(), None);
        assert_eq!(agg.state(), state);
    }

    #[tokio::test]
    async fn test_refresh_and_invalidate_bypass_snapshot() {
        let source = CountingSource::new(vec![]);
        let store = Arc::new(MemoryStore::new());
        let agg = aggregator(source.clone(), store.clone());

        agg.load().await;
        agg.refresh().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        agg.invalidate().await.unwrap();
        let state = agg.load().await;
        assert!(!state.from_cache);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }
}
