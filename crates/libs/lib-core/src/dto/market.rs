//! # Market Data Transfer Objects
//!
//! Trending collection data as exposed to the presentation layer.
//!
//! ## Wire Format
//!
//! Collections use **camelCase** field names (the shape the presentation layer
//! already consumes). Monetary fields are in SOL, already converted from the
//! marketplace's lamport integers.
//!
//! ```json
//! {
//!   "symbol": "mad_lads",
//!   "name": "Mad Lads",
//!   "image": "https://...",
//!   "floorPrice": 179.99,
//!   "volumeAll": 2812.52,
//!   "verified": true,
//!   "featured": true,
//!   "hasCNFTs": false,
//!   "rank": 1,
//!   "timeRange": "1h",
//!   "primaryTimeframe": "1h",
//!   "otherTimeframes": ["1d"]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Popularity window of a marketplace ranking.
///
/// Declaration order is the merge priority: shorter windows win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl TimeFrame {
    /// Buckets shown by the trending view, in merge priority order.
    pub const TRENDING: [TimeFrame; 3] = [TimeFrame::OneHour, TimeFrame::OneDay, TimeFrame::SevenDays];

    /// Value of the marketplace `timeRange` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::OneHour => "1h",
            TimeFrame::OneDay => "1d",
            TimeFrame::SevenDays => "7d",
            TimeFrame::ThirtyDays => "30d",
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1h" => Ok(TimeFrame::OneHour),
            "1d" | "24h" => Ok(TimeFrame::OneDay),
            "7d" => Ok(TimeFrame::SevenDays),
            "30d" => Ok(TimeFrame::ThirtyDays),
            _ => Err(format!("Invalid timeRange: {}. Must be one of: 1h, 1d, 7d, 30d", s)),
        }
    }
}

/// A marketplace collection ranked within one (or more) popularity windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrendingCollection {
    pub symbol: String,
    pub name: String,
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_all: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_1d: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_price_24hr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_bid: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listed_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_1d: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_change_1d: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sparkline: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, rename = "hasCNFTs")]
    pub has_cnfts: bool,

    /// 1-based position inside `time_range`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeFrame>,

    /// First bucket (in priority order) the collection appeared in. Merged view only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_timeframe: Option<TimeFrame>,
    /// Later buckets that also listed the collection. Merged view only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_timeframes: Vec<TimeFrame>,
}

/// Result of fetching every trending bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimeframeCollections {
    /// Deduplicated, rank-preserving view across buckets.
    pub collections: Vec<TrendingCollection>,
    /// Raw per-bucket lists.
    pub timeframe_data: BTreeMap<TimeFrame, Vec<TrendingCollection>>,
    /// Buckets whose fetch failed (their list is empty). Not persisted.
    #[serde(skip)]
    pub failed: Vec<TimeFrame>,
}

impl TimeframeCollections {
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// `true` when every requested bucket failed to load.
    pub fn all_failed(&self) -> bool {
        !self.failed.is_empty() && self.failed.len() == self.timeframe_data.len()
    }
}
