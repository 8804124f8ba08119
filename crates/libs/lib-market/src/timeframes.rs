//! # Cross-Bucket Merge
//!
//! Collapses per-bucket rankings into one list with each collection listed once.
//!
//! Buckets are walked in the given priority order. A collection keeps the entry
//! (and rank) from the first bucket it appears in, recorded as
//! `primary_timeframe`; every later bucket that lists it is appended to
//! `other_timeframes`.

use lib_core::dto::{TimeFrame, TrendingCollection};
use std::collections::{BTreeMap, HashMap};

pub fn merge_timeframes(
    order: &[TimeFrame],
    buckets: &BTreeMap<TimeFrame, Vec<TrendingCollection>>,
) -> Vec<TrendingCollection> {
    let mut merged: Vec<TrendingCollection> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for time_frame in order {
        let Some(collections) = buckets.get(time_frame) else {
            continue;
        };

        for collection in collections {
            match positions.get(collection.symbol.as_str()) {
                Some(&position) => {
                    let existing = &mut merged[position];
                    if existing.primary_timeframe != Some(*time_frame)
                        && !existing.other_timeframes.contains(time_frame)
                    {
                        existing.other_timeframes.push(*time_frame);
                    }
                }
                None => {
                    positions.insert(collection.symbol.as_str(), merged.len());
                    let mut entry = collection.clone();
                    entry.primary_timeframe = Some(*time_frame);
                    entry.other_timeframes.clear();
                    merged.push(entry);
                }
            }
        }
    }

    merged
}
