//! # Collection Handlers
//!
//! Normalized collection data served from the shared collection cache.
//!
//! ## Endpoints
//!
//! - `GET /api/collections/popular?timeRange=1d` - Ranked popular collections for one bucket
//! - `GET /api/collections/trending?limit=20` - 24h trending collections with market stats
//! - `GET /api/collections/timeframes?refresh=false` - Merged 1h/1d/7d view (session snapshot backed)
//! - `GET /api/collections/by-symbol/{symbol}` - Raw collection metadata
//! - `GET /api/collections/by-symbol/{symbol}/stats` - Raw collection statistics
//! - `DELETE /api/collections/cache` - Drop cached responses and the trending snapshot
//!
//! Popular and trending lists fail open: an unreachable marketplace yields `[]`.
//!
//! ```bash
//! curl "http://localhost:3000/api/collections/popular?timeRange=7d"
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use lib_core::dto::{TimeFrame, TrendingCollection};
use lib_core::{AppError, Result};
use lib_market::{CollectionCacheService, TrendingAggregator, TrendingState};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

const DEFAULT_TRENDING_LIMIT: u32 = 20;
const MAX_TRENDING_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    #[serde(rename = "timeRange")]
    pub time_range: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TimeframesQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[instrument(skip(collections))]
pub async fn get_popular(
    State(collections): State<CollectionCacheService>,
    Query(params): Query<PopularQuery>,
) -> Result<Json<Vec<TrendingCollection>>> {
    let time_frame = match params.time_range.as_deref() {
        Some(raw) => raw.parse::<TimeFrame>().map_err(AppError::InvalidInput)?,
        None => TimeFrame::OneDay,
    };

    let list = collections.get_popular_collections(time_frame).await;
    info!("[COLLECTIONS] {} popular collections for {}", list.len(), time_frame);
    Ok(Json(list))
}

#[instrument(skip(collections))]
pub async fn get_trending(
    State(collections): State<CollectionCacheService>,
    Query(params): Query<TrendingQuery>,
) -> Result<Json<Vec<TrendingCollection>>> {
    let limit = params.limit.unwrap_or(DEFAULT_TRENDING_LIMIT);
    if limit == 0 || limit > MAX_TRENDING_LIMIT {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_TRENDING_LIMIT
        )));
    }

    Ok(Json(collections.get_trending_collections(limit).await))
}

/// Merged multi-bucket view. Answers 503 (with the state body) when every bucket failed.
#[instrument(skip(trending))]
pub async fn get_timeframes(
    State(trending): State<Arc<TrendingAggregator>>,
    Query(params): Query<TimeframesQuery>,
) -> (StatusCode, Json<TrendingState>) {
    let state = if params.refresh {
        trending.refresh().await
    } else {
        trending.load().await
    };

    let status = if state.error.is_some() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(state))
}

#[instrument(skip(collections))]
pub async fn get_collection_metadata(
    State(collections): State<CollectionCacheService>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(collections.get_collection_metadata(&symbol).await?))
}

#[instrument(skip(collections))]
pub async fn get_collection_stats(
    State(collections): State<CollectionCacheService>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(collections.get_collection_stats(&symbol).await?))
}

#[instrument(skip(collections, trending))]
pub async fn clear_cache(
    State(collections): State<CollectionCacheService>,
    State(trending): State<Arc<TrendingAggregator>>,
) -> Result<StatusCode> {
    collections.clear_cache();
    trending.invalidate().await?;
    Ok(StatusCode::NO_CONTENT)
}
