//! # Application Configuration
//!
//! This module manages application configuration loaded from environment variables.
//! All configuration is validated on startup to fail fast if misconfigured.
//!
//! The validated [`Config`] is built once by the entry point and handed to the
//! services that need it; there is no global accessor.
//!
//! ```rust,no_run
//! use lib_core::config::Config;
//!
//! let config = Config::from_env()?;
//! config.validate()?;
//! println!("primary upstream: {}", config.upstream_primary_url);
//! # Ok::<(), String>(())
//! ```

use lib_utils::envs::{get_env_or, get_env_parse_or};
use lib_utils::validation::{validate_http_url, validate_range};
use std::time::Duration;

/// Magic Eden v2 REST API (legacy endpoints, tried first).
pub const DEFAULT_UPSTREAM_PRIMARY_URL: &str = "https://api-mainnet.magiceden.dev/v2";
/// Magic Eden v3 RTP API (fallback when v2 answers 404).
pub const DEFAULT_UPSTREAM_SECONDARY_URL: &str = "https://api-mainnet.magiceden.dev/v3/rtp/solana";
pub const DEFAULT_SEARCH_API_URL: &str = "http://127.0.0.1:3001";
pub const DEFAULT_PROXY_BIND_ADDRESS: &str = "127.0.0.1:3000";

/// Deployment environment. `Development` enables offline fallback data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            _ => Environment::Production,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    /// Marketplace API base tried first
    pub upstream_primary_url: String,

    /// Marketplace API base used once when the primary answers 404
    pub upstream_secondary_url: String,

    /// Search backend base URL (serves `/api/search` and `/details/{mint}`)
    pub search_api_url: String,

    /// Listen address of the local marketplace proxy
    pub proxy_bind_address: String,

    pub environment: Environment,

    /// Timeout applied to every outbound HTTP request
    pub request_timeout: Duration,

    /// How long a successful marketplace response stays cached
    pub collection_cache_ttl: Duration,

    /// Minimum spacing between two outbound marketplace calls, process-wide
    pub min_request_interval: Duration,

    /// Retries after the first attempt for 429/5xx/network failures
    pub max_retries: u32,

    /// Lifetime of the persisted trending snapshot
    pub trending_cache_ttl: Duration,

    /// Quiet period after the last keystroke before a search is issued
    pub search_debounce: Duration,

    /// Queries shorter than this (after trimming) never hit the network
    pub search_min_query_length: usize,

    pub search_page_size: u32,

    /// Directory for the file-backed session store; in-memory when unset
    pub session_store_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_primary_url: DEFAULT_UPSTREAM_PRIMARY_URL.to_string(),
            upstream_secondary_url: DEFAULT_UPSTREAM_SECONDARY_URL.to_string(),
            search_api_url: DEFAULT_SEARCH_API_URL.to_string(),
            proxy_bind_address: DEFAULT_PROXY_BIND_ADDRESS.to_string(),
            environment: Environment::Production,
            request_timeout: Duration::from_secs(10),
            collection_cache_ttl: Duration::from_secs(30),
            min_request_interval: Duration::from_millis(100),
            max_retries: 2,
            trending_cache_ttl: Duration::from_secs(5 * 60),
            search_debounce: Duration::from_millis(400),
            search_min_query_length: 0,
            search_page_size: 20,
            session_store_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        let defaults = Config::default();
        let parse_err = |e: lib_utils::envs::Error| e.to_string();

        let session_store_dir = std::env::var("SESSION_STORE_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty());

        Ok(Self {
            upstream_primary_url: trim_base(&get_env_or(
                "MAGIC_EDEN_PRIMARY_URL",
                DEFAULT_UPSTREAM_PRIMARY_URL,
            )),
            upstream_secondary_url: trim_base(&get_env_or(
                "MAGIC_EDEN_SECONDARY_URL",
                DEFAULT_UPSTREAM_SECONDARY_URL,
            )),
            search_api_url: trim_base(&get_env_or("SEARCH_API_URL", DEFAULT_SEARCH_API_URL)),
            proxy_bind_address: get_env_or("PROXY_BIND_ADDRESS", DEFAULT_PROXY_BIND_ADDRESS),
            environment: Environment::parse(&get_env_or("APP_ENV", "production")),
            request_timeout: Duration::from_secs(
                get_env_parse_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout.as_secs())
                    .map_err(parse_err)?,
            ),
            collection_cache_ttl: Duration::from_secs(
                get_env_parse_or(
                    "COLLECTION_CACHE_TTL_SECS",
                    defaults.collection_cache_ttl.as_secs(),
                )
                .map_err(parse_err)?,
            ),
            min_request_interval: Duration::from_millis(
                get_env_parse_or(
                    "MIN_REQUEST_INTERVAL_MS",
                    defaults.min_request_interval.as_millis() as u64,
                )
                .map_err(parse_err)?,
            ),
            max_retries: get_env_parse_or("MAX_RETRIES", defaults.max_retries).map_err(parse_err)?,
            trending_cache_ttl: Duration::from_secs(
                get_env_parse_or(
                    "TRENDING_CACHE_TTL_SECS",
                    defaults.trending_cache_ttl.as_secs(),
                )
                .map_err(parse_err)?,
            ),
            search_debounce: Duration::from_millis(
                get_env_parse_or("SEARCH_DEBOUNCE_MS", defaults.search_debounce.as_millis() as u64)
                    .map_err(parse_err)?,
            ),
            search_min_query_length: get_env_parse_or(
                "SEARCH_MIN_QUERY_LENGTH",
                defaults.search_min_query_length,
            )
            .map_err(parse_err)?,
            search_page_size: get_env_parse_or("SEARCH_PAGE_SIZE", defaults.search_page_size)
                .map_err(parse_err)?,
            session_store_dir,
        })
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        validate_http_url(&self.upstream_primary_url, "MAGIC_EDEN_PRIMARY_URL")?;
        validate_http_url(&self.upstream_secondary_url, "MAGIC_EDEN_SECONDARY_URL")?;
        validate_http_url(&self.search_api_url, "SEARCH_API_URL")?;

        if self.request_timeout.is_zero() {
            return Err("REQUEST_TIMEOUT_SECS must be greater than 0".to_string());
        }
        if self.collection_cache_ttl.is_zero() {
            return Err("COLLECTION_CACHE_TTL_SECS must be greater than 0".to_string());
        }
        if self.trending_cache_ttl.is_zero() {
            return Err("TRENDING_CACHE_TTL_SECS must be greater than 0".to_string());
        }

        validate_range(self.max_retries, 0, 5, "MAX_RETRIES")?;
        validate_range(
            self.search_debounce.as_millis() as u64,
            0,
            5_000,
            "SEARCH_DEBOUNCE_MS",
        )?;
        validate_range(self.search_page_size, 1, 100, "SEARCH_PAGE_SIZE")?;

        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
