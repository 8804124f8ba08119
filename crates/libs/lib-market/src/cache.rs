//! # Collection Cache Service
//!
//! Cached, rate-limited, retrying access to marketplace collection data.
//!
//! ## Features
//! - **Single flight**: concurrent requests for the same endpoint share one upstream call
//! - **Short TTL**: successful responses are reused for `collection_cache_ttl` (30s by default)
//! - **Global spacing**: outbound calls are at least `min_request_interval` apart, process-wide
//! - **Retry with backoff**: 429 waits `1s × attempt`, 5xx and network failures `500ms × attempt`
//! - **Fail-open popular lists**: a failed bucket becomes an empty list (or offline data in development)
//!
//! Failures are never cached; the next request for a failed endpoint goes upstream again.
//!
//! ## Example
//! ```no_run
//! # async fn demo(service: lib_market::CollectionCacheService) {
//! use lib_core::dto::TimeFrame;
//!
//! let hourly = service.get_popular_collections(TimeFrame::OneHour).await;
//! let merged = service.get_all_timeframe_collections().await;
//! println!("{} hourly, {} merged", hourly.len(), merged.collections.len());
//! # }
//! ```

use crate::fallback::development_collections;
use crate::gateway::MarketUpstream;
use crate::normalize::{parse_popular, parse_trending};
use crate::timeframes::merge_timeframes;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use lib_core::dto::{TimeFrame, TimeframeCollections, TrendingCollection};
use lib_core::{AppError, Config, Result};
use lib_utils::validation::encode_path_segment;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, instrument, warn};

type SharedFetch = Shared<BoxFuture<'static, Result<Value>>>;

/// Tunables of the collection cache.
#[derive(Clone, Debug)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub min_request_interval: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base backoff after a 429, multiplied by the attempt number.
    pub rate_limit_backoff: Duration,
    /// Base backoff after a 5xx or network failure, multiplied by the attempt number.
    pub transient_backoff: Duration,
    /// Serve offline data when a popular bucket cannot be fetched.
    pub development: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CacheSettings {
    fn from(config: &Config) -> Self {
        Self {
            ttl: config.collection_cache_ttl,
            min_request_interval: config.min_request_interval,
            max_retries: config.max_retries,
            rate_limit_backoff: Duration::from_millis(1000),
            transient_backoff: Duration::from_millis(500),
            development: config.is_development(),
        }
    }
}

enum Slot {
    /// An upstream call is running; joiners await the same future.
    Pending { id: u64, fetch: SharedFetch },
    Ready { value: Value, fetched_at: Instant },
}

enum Lookup {
    Hit(Value),
    Join(SharedFetch),
    Miss,
}

/// Process-wide spacing of outbound calls.
///
/// The lock is held across the wait so callers leave strictly one at a time.
struct RequestSpacer {
    min_interval: Duration,
    last_request: tokio::sync::Mutex<Option<Instant>>,
}

impl RequestSpacer {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: tokio::sync::Mutex::new(None),
        }
    }

    async fn wait_turn(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let next_allowed = previous + self.min_interval;
            if next_allowed > Instant::now() {
                sleep_until(next_allowed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Cached, single-flight front of a [`MarketUpstream`].
///
/// Cloning is cheap and clones share the cache, the in-flight table and the
/// request spacing.
#[derive(Clone)]
pub struct CollectionCacheService {
    upstream: Arc<dyn MarketUpstream>,
    entries: Arc<Mutex<HashMap<String, Slot>>>,
    spacer: Arc<RequestSpacer>,
    next_id: Arc<AtomicU64>,
    settings: CacheSettings,
}

impl CollectionCacheService {
    pub fn new(upstream: Arc<dyn MarketUpstream>, settings: CacheSettings) -> Self {
        info!(
            "Collection cache ready (ttl {:?}, spacing {:?}, retries {})",
            settings.ttl, settings.min_request_interval, settings.max_retries
        );
        Self {
            upstream,
            entries: Arc::new(Mutex::new(HashMap::new())),
            spacer: Arc::new(RequestSpacer::new(settings.min_request_interval)),
            next_id: Arc::new(AtomicU64::new(0)),
            settings,
        }
    }

    // region: --- Core request path

    /// Fetch `endpoint` through the cache.
    ///
    /// A fresh cached value is returned immediately. If a call for the same
    /// endpoint is already running, its outcome is shared. Otherwise a new
    /// upstream call starts; it keeps running even if every caller goes away.
    pub async fn request(&self, endpoint: &str) -> Result<Value> {
        let fetch = {
            let mut entries = self.entries.lock();

            let lookup = match entries.get(endpoint) {
                Some(Slot::Ready { value, fetched_at }) if fetched_at.elapsed() < self.settings.ttl => {
                    Lookup::Hit(value.clone())
                }
                Some(Slot::Pending { fetch, .. }) => Lookup::Join(fetch.clone()),
                _ => Lookup::Miss,
            };

            match lookup {
                Lookup::Hit(value) => {
                    debug!("Cache hit for {}", endpoint);
                    return Ok(value);
                }
                Lookup::Join(fetch) => {
                    debug!("Joining in-flight request for {}", endpoint);
                    fetch
                }
                Lookup::Miss => {
                    let ttl = self.settings.ttl;
                    entries.retain(|_, slot| match slot {
                        Slot::Ready { fetched_at, .. } => fetched_at.elapsed() < ttl,
                        Slot::Pending { .. } => true,
                    });

                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let fetch = self.spawn_fetch(endpoint.to_string(), id);
                    entries.insert(
                        endpoint.to_string(),
                        Slot::Pending {
                            id,
                            fetch: fetch.clone(),
                        },
                    );
                    fetch
                }
            }
        };

        fetch.await
    }

    /// Start the upstream call on its own task so it settles the cache entry
    /// even when no caller is left waiting.
    fn spawn_fetch(&self, endpoint: String, id: u64) -> SharedFetch {
        let upstream = Arc::clone(&self.upstream);
        let entries = Arc::clone(&self.entries);
        let spacer = Arc::clone(&self.spacer);
        let settings = self.settings.clone();
        let task_endpoint = endpoint.clone();

        let handle = tokio::spawn(async move {
            let result = fetch_with_retry(upstream.as_ref(), &spacer, &settings, &task_endpoint).await;
            settle(&entries, &task_endpoint, id, &result);
            result
        });

        let entries = Arc::clone(&self.entries);
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Fetch task for {} failed: {}", endpoint, e);
                    settle(&entries, &endpoint, id, &Err(AppError::Internal(e.to_string())));
                    Err(AppError::Internal(format!("fetch task failed: {}", e)))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Drop every cached response. Running calls finish but are not stored.
    pub fn clear_cache(&self) {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        info!("Collection cache cleared ({} entries)", count);
    }

    /// Number of endpoints currently cached or in flight.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // endregion: --- Core request path

    // region: --- Collection operations

    /// Popular collections for one bucket, ranked from 1.
    ///
    /// Never fails: errors yield an empty list, or the offline list in development.
    #[instrument(skip(self))]
    pub async fn get_popular_collections(&self, time_frame: TimeFrame) -> Vec<TrendingCollection> {
        match self.fetch_popular(time_frame).await {
            Ok(collections) => collections,
            Err(e) => {
                warn!("Popular collections for {} unavailable: {}", time_frame, e);
                self.fallback_for(time_frame)
            }
        }
    }

    /// Fetch every trending bucket concurrently and merge them.
    pub async fn get_all_timeframe_collections(&self) -> TimeframeCollections {
        self.get_timeframe_collections(&TimeFrame::TRENDING).await
    }

    /// Fetch `time_frames` concurrently and merge them in the given priority order.
    #[instrument(skip(self))]
    pub async fn get_timeframe_collections(&self, time_frames: &[TimeFrame]) -> TimeframeCollections {
        let results = join_all(time_frames.iter().map(|tf| self.fetch_popular(*tf))).await;

        let mut timeframe_data = BTreeMap::new();
        let mut failed = Vec::new();

        for (time_frame, result) in time_frames.iter().zip(results) {
            let collections = match result {
                Ok(collections) => collections,
                Err(e) => {
                    warn!("Bucket {} failed: {}", time_frame, e);
                    let fallback = self.fallback_for(*time_frame);
                    if fallback.is_empty() {
                        failed.push(*time_frame);
                    }
                    fallback
                }
            };
            timeframe_data.insert(*time_frame, collections);
        }

        let collections = merge_timeframes(time_frames, &timeframe_data);
        info!(
            "Merged {} collections from {} buckets ({} failed)",
            collections.len(),
            timeframe_data.len(),
            failed.len()
        );

        TimeframeCollections {
            collections,
            timeframe_data,
            failed,
        }
    }

    /// Trending collections over the last 24 hours, with market statistics.
    ///
    /// Fails open like [`get_popular_collections`](Self::get_popular_collections).
    #[instrument(skip(self))]
    pub async fn get_trending_collections(&self, limit: u32) -> Vec<TrendingCollection> {
        let endpoint = format!("/marketplace/trending_collections?timeRange=24h&limit={}", limit);
        let parsed = match self.request(&endpoint).await {
            Ok(payload) => parse_trending(&payload),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(collections) => collections,
            Err(e) => {
                warn!("Trending collections unavailable: {}", e);
                self.fallback_for(TimeFrame::OneDay)
            }
        }
    }

    /// Raw statistics document of one collection.
    pub async fn get_collection_stats(&self, symbol: &str) -> Result<Value> {
        let endpoint = format!("/collections/{}/stats", collection_segment(symbol)?);
        self.request(&endpoint).await
    }

    /// Raw metadata document of one collection.
    pub async fn get_collection_metadata(&self, symbol: &str) -> Result<Value> {
        let endpoint = format!("/collections/{}", collection_segment(symbol)?);
        self.request(&endpoint).await
    }

    // endregion: --- Collection operations

    async fn fetch_popular(&self, time_frame: TimeFrame) -> Result<Vec<TrendingCollection>> {
        let endpoint = format!("/marketplace/popular_collections?timeRange={}", time_frame);
        let payload = self.request(&endpoint).await?;
        parse_popular(&payload, time_frame)
    }

    fn fallback_for(&self, time_frame: TimeFrame) -> Vec<TrendingCollection> {
        if self.settings.development {
            debug!("Serving offline collections for {}", time_frame);
            development_collections(time_frame)
        } else {
            Vec::new()
        }
    }
}

fn collection_segment(symbol: &str) -> Result<String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(AppError::InvalidInput("collection symbol is required".to_string()));
    }
    Ok(encode_path_segment(symbol))
}

/// Store a success or forget a failure, unless the slot was replaced meanwhile.
fn settle(entries: &Mutex<HashMap<String, Slot>>, endpoint: &str, id: u64, result: &Result<Value>) {
    let mut entries = entries.lock();
    let still_ours = matches!(entries.get(endpoint), Some(Slot::Pending { id: current, .. }) if *current == id);
    if !still_ours {
        return;
    }

    match result {
        Ok(value) => {
            entries.insert(
                endpoint.to_string(),
                Slot::Ready {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }
        Err(_) => {
            entries.remove(endpoint);
        }
    }
}

async fn fetch_with_retry(
    upstream: &dyn MarketUpstream,
    spacer: &RequestSpacer,
    settings: &CacheSettings,
    endpoint: &str,
) -> Result<Value> {
    let mut attempt: u32 = 0;

    loop {
        spacer.wait_turn().await;

        let error = match upstream.get(endpoint).await {
            Ok(value) => {
                debug!("Fetched {} (attempt {})", endpoint, attempt + 1);
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            debug!("Not retrying {}: {}", endpoint, error);
            return Err(error);
        }

        if attempt >= settings.max_retries {
            error!("Giving up on {} after {} attempts: {}", endpoint, attempt + 1, error);
            return Err(AppError::Unavailable(format!(
                "{} failed after {} attempts: {}",
                endpoint,
                attempt + 1,
                error
            )));
        }

        attempt += 1;
        let delay = if error.is_rate_limited() {
            settings.rate_limit_backoff * attempt
        } else {
            settings.transient_backoff * attempt
        };
        warn!(
            "Attempt {} for {} failed ({}), retrying in {:?}",
            attempt, endpoint, error, delay
        );
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Upstream that replays scripted answers and records when it was called.
    struct ScriptedUpstream {
        answers: Mutex<VecDeque<Result<Value>>>,
        calls: Mutex<Vec<(String, Instant)>>,
        delay: Duration,
    }

    impl ScriptedUpstream {
        fn new(answers: Vec<Result<Value>>) -> Arc<Self> {
            Self::delayed(answers, Duration::ZERO)
        }

        fn delayed(answers: Vec<Result<Value>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                calls: Mutex::new(Vec::new()),
                delay,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().iter().map(|(_, at)| *at).collect()
        }
    }

    #[async_trait]
    impl MarketUpstream for ScriptedUpstream {
        async fn get(&self, endpoint: &str) -> Result<Value> {
            self.calls.lock().push((endpoint.to_string(), Instant::now()));
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            self.answers
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(json!([])))
        }
    }

    /// Upstream answering by `timeRange`, for bucket tests.
    struct BucketUpstream;

    #[async_trait]
    impl MarketUpstream for BucketUpstream {
        async fn get(&self, endpoint: &str) -> Result<Value> {
            if endpoint.ends_with("timeRange=1h") {
                Ok(json!([
                    { "symbol": "a", "name": "A", "floorPrice": 1_000_000_000u64 },
                    { "symbol": "shared", "name": "Shared" }
                ]))
            } else if endpoint.ends_with("timeRange=1d") {
                Ok(json!([
                    { "symbol": "shared", "name": "Shared" },
                    { "symbol": "a2", "name": "A2", "floorPrice": 1_000_000_000u64 }
                ]))
            } else {
                Err(AppError::upstream("Magic Eden", StatusCode::BAD_GATEWAY, "bad gateway"))
            }
        }
    }

    fn service(upstream: Arc<ScriptedUpstream>) -> CollectionCacheService {
        CollectionCacheService::new(upstream, CacheSettings::default())
    }

    fn status(code: StatusCode) -> AppError {
        AppError::upstream("Magic Eden", code, "")
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_call() {
        let upstream = ScriptedUpstream::delayed(vec![Ok(json!({"n": 1}))], Duration::from_millis(50));
        let service = service(upstream.clone());

        let (a, b, c) = tokio::join!(
            service.request("/collections/x"),
            service.request("/collections/x"),
            service.request("/collections/x"),
        );

        assert_eq!(upstream.call_count(), 1);
        assert_eq!(a.unwrap(), json!({"n": 1}));
        assert_eq!(b.unwrap(), json!({"n": 1}));
        assert_eq!(c.unwrap(), json!({"n": 1}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_error() {
        let upstream = ScriptedUpstream::delayed(
            vec![Err(status(StatusCode::BAD_REQUEST)), Ok(json!({"n": 2}))],
            Duration::from_millis(50),
        );
        let service = service(upstream.clone());

        let (a, b) = tokio::join!(service.request("/collections/x"), service.request("/collections/x"));

        assert_eq!(upstream.call_count(), 1);
        assert_eq!(a.as_ref().unwrap_err().upstream_status(), Some(400));
        assert_eq!(a, b);
        assert!(service.is_empty());

        assert_eq!(service.request("/collections/x").await.unwrap(), json!({"n": 2}));
        assert_eq!(upstream.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_value_expires_after_ttl() {
        let upstream = ScriptedUpstream::new(vec![Ok(json!(1)), Ok(json!(2))]);
        let service = service(upstream.clone());

        assert_eq!(service.request("/e").await.unwrap(), json!(1));
        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(service.request("/e").await.unwrap(), json!(1));
        assert_eq!(upstream.call_count(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(service.request("/e").await.unwrap(), json!(2));
        assert_eq!(upstream.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_calls_are_spaced() {
        let upstream = ScriptedUpstream::new(vec![]);
        let service = service(upstream.clone());

        let _ = tokio::join!(service.request("/a"), service.request("/b"), service.request("/c"));

        let times = upstream.call_times();
        assert_eq!(times.len(), 3);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_call_backs_off_then_succeeds() {
        let upstream = ScriptedUpstream::new(vec![
            Err(status(StatusCode::TOO_MANY_REQUESTS)),
            Ok(json!(["ok"])),
        ]);
        let service = service(upstream.clone());

        let started = Instant::now();
        let value = service.request("/e").await.unwrap();

        assert_eq!(value, json!(["ok"]));
        assert_eq!(upstream.call_count(), 2);
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_exhaust_retries() {
        let upstream = ScriptedUpstream::new(vec![
            Err(status(StatusCode::BAD_GATEWAY)),
            Err(status(StatusCode::BAD_GATEWAY)),
            Err(status(StatusCode::BAD_GATEWAY)),
            Ok(json!("never reached")),
        ]);
        let service = service(upstream.clone());

        let started = Instant::now();
        let err = service.request("/e").await.unwrap_err();

        assert!(matches!(err, AppError::Unavailable(_)));
        assert_eq!(upstream.call_count(), 3);
        // 500ms after the first failure, 1000ms after the second
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried_or_cached() {
        let upstream = ScriptedUpstream::new(vec![
            Err(status(StatusCode::NOT_FOUND)),
            Ok(json!({"back": true})),
        ]);
        let service = service(upstream.clone());

        let err = service.request("/collections/gone").await.unwrap_err();
        assert_eq!(err.upstream_status(), Some(404));
        assert_eq!(upstream.call_count(), 1);

        let value = service.request("/collections/gone").await.unwrap();
        assert_eq!(value, json!({"back": true}));
        assert_eq!(upstream.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cache_forces_refetch() {
        let upstream = ScriptedUpstream::new(vec![Ok(json!(1)), Ok(json!(2))]);
        let service = service(upstream.clone());

        service.request("/e").await.unwrap();
        service.clear_cache();
        assert!(service.is_empty());

        assert_eq!(service.request("/e").await.unwrap(), json!(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_popular_collections_fail_open() {
        let upstream = ScriptedUpstream::new(vec![Err(status(StatusCode::BAD_REQUEST))]);
        let service = service(upstream);

        assert!(service.get_popular_collections(TimeFrame::OneDay).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_bucket_is_empty_and_others_merge() {
        let service = CollectionCacheService::new(Arc::new(BucketUpstream), CacheSettings::default());

        let data = service.get_all_timeframe_collections().await;

        assert!(data.timeframe_data[&TimeFrame::SevenDays].is_empty());
        assert_eq!(data.failed, vec![TimeFrame::SevenDays]);
        assert!(!data.all_failed());

        let merged: Vec<&str> = data.collections.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(merged, vec!["a", "shared", "a2"]);

        let shared = &data.collections[1];
        assert_eq!(shared.primary_timeframe, Some(TimeFrame::OneHour));
        assert_eq!(shared.other_timeframes, vec![TimeFrame::OneDay]);
        assert_eq!(data.collections[2].primary_timeframe, Some(TimeFrame::OneDay));
        assert_eq!(data.collections[0].floor_price, Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_development_mode_serves_offline_list() {
        let upstream = ScriptedUpstream::new(vec![Err(status(StatusCode::BAD_REQUEST))]);
        let settings = CacheSettings {
            development: true,
            ..CacheSettings::default()
        };
        let service = CollectionCacheService::new(upstream, settings);

        let collections = service.get_popular_collections(TimeFrame::SevenDays).await;
        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].symbol, "mad_lads");
        assert_eq!(collections[1].time_range, Some(TimeFrame::SevenDays));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collection_endpoints_are_encoded() {
        let upstream = ScriptedUpstream::new(vec![Ok(json!({"floorPrice": 1}))]);
        let service = service(upstream.clone());

        service.get_collection_stats("mad lads").await.unwrap();
        assert_eq!(upstream.calls.lock()[0].0, "/collections/mad%20lads/stats");

        let err = service.get_collection_metadata("  ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
