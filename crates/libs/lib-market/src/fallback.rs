//! Offline collection list served in development when the marketplace is unreachable.

use lib_core::dto::{TimeFrame, TrendingCollection};

/// Two well-known collections, ranked and tagged with `time_frame`.
pub fn development_collections(time_frame: TimeFrame) -> Vec<TrendingCollection> {
    vec![
        TrendingCollection {
            symbol: "mad_lads".to_string(),
            name: "Mad Lads".to_string(),
            image: "https://creator-hub-prod.s3.us-east-2.amazonaws.com/mad_lads_pfp_1682211343777.png"
                .to_string(),
            floor_price: Some(179.99),
            volume_all: Some(2812.52),
            description: Some("Mad Lads NFT Collection".to_string()),
            verified: true,
            featured: true,
            has_cnfts: false,
            rank: Some(1),
            time_range: Some(time_frame),
            ..Default::default()
        },
        TrendingCollection {
            symbol: "tensorians".to_string(),
            name: "TENSORIANS".to_string(),
            image: "https://bafkreictk4t6dafy4p7bgpbvgrop76aajnlzllpue6wr4ynkyj3xxsejte.ipfs.nftstorage.link/"
                .to_string(),
            floor_price: Some(59.0),
            volume_all: Some(838.33),
            description: Some("Tensorians NFT Collection".to_string()),
            verified: true,
            featured: false,
            has_cnfts: true,
            rank: Some(2),
            time_range: Some(time_frame),
            ..Default::default()
        },
    ]
}
