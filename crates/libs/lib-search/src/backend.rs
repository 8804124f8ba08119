//! # Search Backend Client
//!
//! HTTP access to the search service: paginated full-text search and
//! per-mint item details.

use async_trait::async_trait;
use lib_core::dto::{MintDetails, SearchPage, SearchRequest};
use lib_core::{AppError, Config, Result};
use lib_utils::validation::encode_path_segment;
use lib_utils::CancellationToken;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can answer a search query.
///
/// Implementations must stop at their suspension points once `cancel` fires
/// and return [`AppError::Cancelled`] without side effects.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest, cancel: &CancellationToken) -> Result<SearchPage>;
}

#[derive(Clone, Debug)]
pub struct HttpSearchBackend {
    http: Client,
    base_url: String,
}

impl HttpSearchBackend {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base(&config.search_api_url, config.request_timeout)
    }

    pub fn with_base(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_page(&self, request: &SearchRequest) -> Result<SearchPage> {
        let url = format!("{}/api/search", self.base_url);
        debug!("Searching '{}' page {}", request.query, request.page);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("q", request.query.clone()),
                ("page", request.page.to_string()),
                ("limit", request.limit.to_string()),
            ])
            .send()
            .await?;

        let response = ensure_success(response).await?;
        Ok(response.json::<SearchPage>().await?)
    }

    /// Item detail record for one mint.
    ///
    /// The backend answers unknown mints with an empty record; that becomes
    /// [`AppError::NotFound`].
    pub async fn get_details(&self, mint_address: &str) -> Result<MintDetails> {
        let mint_address = mint_address.trim();
        if mint_address.is_empty() {
            return Err(AppError::InvalidInput("mint address is required".to_string()));
        }

        let url = format!("{}/details/{}", self.base_url, encode_path_segment(mint_address));
        let response = ensure_success(self.http.get(&url).send().await?).await?;
        let details = response.json::<MintDetails>().await?;

        if details.is_empty_record() {
            return Err(AppError::NotFound(format!("No item with mint {}", mint_address)));
        }
        Ok(details)
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, request: &SearchRequest, cancel: &CancellationToken) -> Result<SearchPage> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            result = self.fetch_page(request) => result,
        }
    }
}

/// Turn a non-2xx response into an [`AppError::Upstream`] with a readable message.
///
/// The message comes from the body's `message` (or `error`) field when present,
/// otherwise `HTTP {status}: {reason}`.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )
    });
    warn!("Search backend answered {}: {}", status, message);

    Err(AppError::Upstream {
        status: status.as_u16(),
        message,
        details: body,
    })
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|msg| !msg.trim().is_empty())
        .map(str::to_string)
}
