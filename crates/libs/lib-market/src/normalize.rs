//! # Marketplace Payload Normalization
//!
//! Turns raw marketplace JSON into [`TrendingCollection`] values.
//!
//! - Prices arrive as lamport integers (sometimes as strings) and leave as SOL.
//! - Entries without a usable symbol are dropped before ranks are assigned,
//!   so ranks are always contiguous from 1.

use lib_core::dto::{TimeFrame, TrendingCollection};
use lib_core::{AppError, Result};
use serde_json::Value;

/// 1 SOL = 10^9 lamports.
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Image used when the marketplace gives none.
pub const PLACEHOLDER_IMAGE: &str = "/placeholder-collection.jpg";

/// Convert a lamport amount (number or numeric string) to SOL.
///
/// Returns `None` for missing, non-numeric, or non-finite input.
pub fn lamports_to_sol(value: &Value) -> Option<f64> {
    let lamports = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let sol = lamports / LAMPORTS_PER_SOL;
    sol.is_finite().then_some(sol)
}

/// Parse a `popular_collections` payload for one bucket.
pub fn parse_popular(payload: &Value, time_frame: TimeFrame) -> Result<Vec<TrendingCollection>> {
    let items = as_items(payload, "popular_collections")?;

    Ok(items
        .iter()
        .filter_map(popular_entry)
        .enumerate()
        .map(|(index, mut collection)| {
            collection.rank = Some(index as u32 + 1);
            collection.time_range = Some(time_frame);
            collection
        })
        .collect())
}

/// Parse a `trending_collections` payload (24h window).
pub fn parse_trending(payload: &Value) -> Result<Vec<TrendingCollection>> {
    let items = as_items(payload, "trending_collections")?;

    Ok(items
        .iter()
        .filter_map(trending_entry)
        .enumerate()
        .map(|(index, mut collection)| {
            collection.rank = Some(index as u32 + 1);
            collection
        })
        .collect())
}

fn as_items<'a>(payload: &'a Value, endpoint: &str) -> Result<&'a Vec<Value>> {
    payload
        .as_array()
        .ok_or_else(|| AppError::Decoding(format!("{} did not return an array", endpoint)))
}

fn popular_entry(item: &Value) -> Option<TrendingCollection> {
    let symbol = usable_symbol(item)?;

    Some(TrendingCollection {
        name: text(item, "name").unwrap_or_else(|| symbol.clone()),
        image: text(item, "image").unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        floor_price: item.get("floorPrice").and_then(lamports_to_sol),
        volume_all: item.get("volumeAll").and_then(lamports_to_sol),
        description: text(item, "description"),
        verified: flag(item, "verified"),
        featured: flag(item, "featured"),
        has_cnfts: flag(item, "hasCNFTs"),
        symbol,
        ..Default::default()
    })
}

fn trending_entry(item: &Value) -> Option<TrendingCollection> {
    let symbol = usable_symbol(item)?;

    Some(TrendingCollection {
        name: text(item, "name").unwrap_or_else(|| symbol.clone()),
        image: text(item, "image").unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        floor_price: item.get("floorPrice").and_then(lamports_to_sol),
        volume_all: item.get("volumeAll").and_then(lamports_to_sol),
        volume_1d: item.get("volume24hr").and_then(lamports_to_sol),
        avg_price_24hr: item.get("avgPrice24hr").and_then(lamports_to_sol),
        top_bid: item.get("topBid").and_then(lamports_to_sol),
        listed_count: count(item, "listedCount"),
        sales_1d: count(item, "sales24hr"),
        floor_change_1d: item.get("floorChange24hr").and_then(Value::as_f64),
        sparkline: item
            .get("sparkline")
            .and_then(Value::as_array)
            .map(|points| points.iter().filter_map(Value::as_f64).collect())
            .unwrap_or_default(),
        description: text(item, "description"),
        twitter: text(item, "twitter"),
        discord: text(item, "discord"),
        website: text(item, "website"),
        verified: flag(item, "verified"),
        featured: flag(item, "featured"),
        has_cnfts: flag(item, "hasCNFTs"),
        symbol,
        ..Default::default()
    })
}

/// Symbol of an entry, or `None` when it is missing or a placeholder.
fn usable_symbol(item: &Value) -> Option<String> {
    let symbol = text(item, "symbol")?;
    let lowered = symbol.to_lowercase();
    if lowered == "unknown" || lowered.starts_with("unknown-") || lowered.starts_with("unknown_") {
        return None;
    }
    Some(symbol)
}

fn text(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn flag(item: &Value, key: &str) -> bool {
    item.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn count(item: &Value, key: &str) -> Option<u64> {
    let value = item.get(key)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64))
}
