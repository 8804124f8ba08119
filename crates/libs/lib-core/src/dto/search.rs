//! # Search Data Transfer Objects
//!
//! Shapes returned by the search backend.
//!
//! ## Endpoints Using These DTOs
//!
//! - `GET /api/search?q=mad&page=1&limit=20` → [`SearchPage`]
//! - `GET /details/{mint_address}` → [`MintDetails`]
//!
//! The plain backend answers search with `{ "results": [...] }` only; the
//! pagination fields are optional and filled in by the client when missing.

use serde::{Deserialize, Serialize};

/// Categorical rarity tier attached to some search hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Mint address, unique per result.
    pub mint_address: String,
    #[serde(alias = "collection_name", alias = "name")]
    pub nft_name: String,
    /// Relevance score. Usually 0..1, but not bounded by the backend.
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<Rarity>,
    #[serde(default, rename = "volume24h", skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<f64>,
    #[serde(default, rename = "lastSale", skip_serializing_if = "Option::is_none")]
    pub last_sale: Option<f64>,
}

/// One page of search results as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchPage {
    pub results: Vec<SearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, rename = "hasMore", skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

/// Parameters of one search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

/// Metadata subset stored alongside a mint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct PartialMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub metadata_uri: Option<String>,
    #[serde(default)]
    pub seller_fee_basis_points: i16,
    pub update_authority: Option<String>,
    #[serde(default)]
    pub primary_sale_happened: bool,
    #[serde(default)]
    pub is_mutable: bool,
}

/// Item detail view data for a single mint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MintDetails {
    pub mint_address: String,
    pub owner: String,
    pub mint_authority: String,
    pub supply: i64,
    pub decimal: i16,
    pub is_initialized: bool,
    pub freeze_authority: Option<String>,
    pub metadata: PartialMetadata,
}

impl MintDetails {
    /// The backend answers unknown mints with an empty record instead of a 404.
    pub fn is_empty_record(&self) -> bool {
        self.mint_address.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_backend_response_deserializes() {
        let json = r#"{"results":[{"mint_address":"7xKX","nft_name":"Mad Lad #1","score":3.2}]}"#;
        let page: SearchPage = serde_json::from_str(json).unwrap();

        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].score, 3.2);
        assert_eq!(page.total, None);
        assert_eq!(page.has_more, None);
    }

    #[test]
    fn test_paginated_response_with_optional_fields() {
        let json = r#"{
            "results": [{
                "mint_address": "9abc",
                "collection_name": "Tensorians",
                "score": 0.91,
                "rarity": "Epic",
                "volume24h": 12.5,
                "lastSale": 58.0
            }],
            "total": 41,
            "page": 2,
            "hasMore": true
        }"#;
        let page: SearchPage = serde_json::from_str(json).unwrap();

        let hit = &page.results[0];
        assert_eq!(hit.nft_name, "Tensorians");
        assert_eq!(hit.rarity, Some(Rarity::Epic));
        assert_eq!(hit.volume_24h, Some(12.5));
        assert_eq!(hit.last_sale, Some(58.0));
        assert_eq!(page.total, Some(41));
        assert_eq!(page.page, Some(2));
        assert_eq!(page.has_more, Some(true));
    }

    #[test]
    fn test_empty_mint_record() {
        let json = r#"{
            "mint_address": "",
            "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
            "mint_authority": "",
            "supply": 0,
            "decimal": 0,
            "is_initialized": false,
            "freeze_authority": null,
            "metadata": {
                "name": null, "symbol": null, "metadata_uri": null,
                "seller_fee_basis_points": 0, "update_authority": null,
                "primary_sale_happened": false, "is_mutable": false
            }
        }"#;
        let details: MintDetails = serde_json::from_str(json).unwrap();
        assert!(details.is_empty_record());
    }
}
