//! # Marketplace Gateway
//!
//! Read-only HTTP access to the Magic Eden API with a v2 → v3 fallback.
//!
//! Every call goes to the primary (v2) base first. A `404` there means the
//! endpoint moved, so the same path and query are tried **once** against the
//! secondary (v3) base. Any other primary failure is returned as-is.
//!
//! ## Example
//! ```no_run
//! # async fn demo(gateway: lib_market::UpstreamGateway) -> lib_core::Result<()> {
//! use lib_market::MarketUpstream;
//!
//! let popular = gateway.get("/marketplace/popular_collections?timeRange=1d").await?;
//! println!("{} collections", popular.as_array().map(|a| a.len()).unwrap_or(0));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use lib_core::{AppError, Config, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Name used in upstream error messages.
pub const UPSTREAM_SERVICE: &str = "Magic Eden";

const CLIENT_USER_AGENT: &str = "Mozilla/5.0 (compatible; NFT-Indexer/1.0)";

/// Anything that can answer a read-only marketplace request.
///
/// `endpoint` is a path relative to the API root, optionally with a query
/// string (`/collections/mad_lads/stats`, `/marketplace/popular_collections?timeRange=1h`).
#[async_trait]
pub trait MarketUpstream: Send + Sync {
    async fn get(&self, endpoint: &str) -> Result<Value>;
}

/// HTTP gateway in front of the two marketplace API bases.
#[derive(Clone, Debug)]
pub struct UpstreamGateway {
    http: Client,
    primary_base: String,
    secondary_base: String,
}

impl UpstreamGateway {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_bases(
            &config.upstream_primary_url,
            &config.upstream_secondary_url,
            config.request_timeout,
        )
    }

    pub fn with_bases(primary: &str, secondary: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            primary_base: primary.trim_end_matches('/').to_string(),
            secondary_base: secondary.trim_end_matches('/').to_string(),
        })
    }

    /// Forward a request to the marketplace and decode the JSON body.
    ///
    /// Only `GET` is accepted; anything else fails with
    /// [`AppError::MethodNotAllowed`] without touching the network.
    pub async fn forward(&self, method: &Method, path: &str, query: Option<&str>) -> Result<Value> {
        if method != Method::GET {
            return Err(AppError::MethodNotAllowed(method.to_string()));
        }

        let path = normalize_path(path);
        let primary_url = build_url(&self.primary_base, &path, query);
        debug!("→ marketplace GET {}", primary_url);

        let mut response = self.http.get(&primary_url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            let secondary_url = build_url(&self.secondary_base, &path, query);
            debug!("Primary answered 404 for {}, trying {}", path, secondary_url);
            response = self.http.get(&secondary_url).send().await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Marketplace {} answered {}", path, status);
            return Err(AppError::upstream(UPSTREAM_SERVICE, status, body));
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl MarketUpstream for UpstreamGateway {
    async fn get(&self, endpoint: &str) -> Result<Value> {
        let (path, query) = match endpoint.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (endpoint, None),
        };
        self.forward(&Method::GET, path, query).await
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    format!("/{}", trimmed)
}

fn build_url(base: &str, path: &str, query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("{}{}?{}", base, path, query),
        None => format!("{}{}", base, path),
    }
}
