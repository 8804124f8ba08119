//! # Server Setup
//!
//! Tracing setup, shared state construction, route registration and HTTP
//! server startup for the marketplace proxy.

// region: --- Imports
use axum::extract::FromRef;
use axum::routing::{any, delete, get};
use axum::Router;
use lib_core::Config;
use lib_market::{
    CacheSettings, CollectionCacheService, FileStore, MemoryStore, SessionStore, TrendingAggregator,
    UpstreamGateway,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{log_requests, stamp_req, RequestStamp};
// endregion: --- Imports

// region: --- AppState
/// Application state shared across all routes.
///
/// One [`CollectionCacheService`] per process: every handler clone shares its
/// cache, in-flight table and request spacing.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<UpstreamGateway>,
    pub collections: CollectionCacheService,
    pub trending: Arc<TrendingAggregator>,
}

impl AppState {
    /// Build the gateway, collection cache, session store and aggregator from `config`.
    pub async fn from_config(config: Config) -> lib_core::Result<Self> {
        let gateway = Arc::new(UpstreamGateway::new(&config)?);
        let collections = CollectionCacheService::new(gateway.clone(), CacheSettings::from(&config));

        let store: Arc<dyn SessionStore> = match &config.session_store_dir {
            Some(dir) => {
                info!("Session store: files in {}", dir);
                Arc::new(FileStore::open(dir).await?)
            }
            None => {
                info!("Session store: in memory");
                Arc::new(MemoryStore::new())
            }
        };

        let trending = Arc::new(TrendingAggregator::new(
            Arc::new(collections.clone()),
            store,
            config.trending_cache_ttl,
        ));

        Ok(Self {
            config,
            gateway,
            collections,
            trending,
        })
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<UpstreamGateway> {
    fn from_ref(state: &AppState) -> Self {
        state.gateway.clone()
    }
}

impl FromRef<AppState> for CollectionCacheService {
    fn from_ref(state: &AppState) -> Self {
        state.collections.clone()
    }
}

impl FromRef<AppState> for Arc<TrendingAggregator> {
    fn from_ref(state: &AppState) -> Self {
        state.trending.clone()
    }
}
// endregion: --- AppState

// region: --- Server Configuration
/// Listener and CORS settings of the proxy.
pub struct ServerConfig {
    /// Bind address; `PROXY_BIND_ADDRESS` when `None`
    pub bind_address: Option<String>,
    /// Allowed CORS origins
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: None,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}
// endregion: --- Server Configuration

// region: --- Server Setup
/// Install the global tracing subscriber, filtered by `LOG_LEVEL` (default `info`).
pub fn init_tracing() -> anyhow::Result<()> {
    let log_level = std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase();

    let filter = match log_level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => tracing_subscriber::EnvFilter::new(&log_level),
        _ => tracing_subscriber::EnvFilter::new("info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set global tracing subscriber: {}", e))?;

    info!(" Log level: {}", log_level);
    Ok(())
}

/// Install tracing, load configuration, build shared state and serve until shutdown.
///
/// # Errors
///
/// - A global tracing subscriber is already installed
/// - Configuration loading or validation fails
/// - The HTTP client or session store cannot be created
/// - The bind address is unavailable
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    init_tracing()?;
    info!(" NFT DISCOVERY PROXY STARTING");

    info!("Loading configuration...");
    let app_config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    app_config.validate().map_err(|e| anyhow::anyhow!(e))?;

    info!("Primary upstream: {}", app_config.upstream_primary_url);
    info!("Secondary upstream: {}", app_config.upstream_secondary_url);
    if app_config.is_development() {
        info!("DEVELOPMENT MODE - offline collections served when the marketplace is unreachable");
    }

    let bind_address = config
        .bind_address
        .clone()
        .unwrap_or_else(|| app_config.proxy_bind_address.clone());

    let state = AppState::from_config(app_config).await?;
    let app = create_router(state, &config.allowed_origins);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(" SERVER READY: http://{}", bind_address);
    log_server_info();

    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the application router with all routes and layers.
pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    use axum::http::{HeaderValue, Method};

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::HeaderName::from_static("x-request-id"),
        ]);

    Router::new()
        .route("/api/magic-eden/{*path}", any(handlers::proxy::forward))
        .route("/api/collections/popular", get(handlers::collections::get_popular))
        .route("/api/collections/trending", get(handlers::collections::get_trending))
        .route("/api/collections/timeframes", get(handlers::collections::get_timeframes))
        .route("/api/collections/cache", delete(handlers::collections::clear_cache))
        .route("/api/collections/by-symbol/{symbol}", get(handlers::collections::get_collection_metadata))
        .route("/api/collections/by-symbol/{symbol}/stats", get(handlers::collections::get_collection_stats))
        .route("/health", get(|| async { "OK" }))
        .fallback(|| async {
            info!("[404 HANDLER] Unmatched route - returning 404");
            (axum::http::StatusCode::NOT_FOUND, "Route not found")
        })
        .with_state(state)
        .layer(axum::middleware::from_fn(log_requests))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .extensions()
                        .get::<RequestStamp>()
                        .map(|s| s.id.clone())
                        .unwrap_or_else(|| "unknown".to_string());
                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_failure(
                    |error: tower_http::classify::ServerErrorsFailureClass,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::error!(
                            error = ?error,
                            latency_ms = latency.as_millis(),
                            "[HTTP FAILURE] Error: {:?}, Latency: {}ms",
                            error,
                            latency.as_millis()
                        );
                    },
                ),
        )
        // Outermost so the stamp exists before the trace span and the logger run
        .layer(axum::middleware::from_fn(stamp_req))
        .layer(cors)
}

fn log_server_info() {
    info!("MARKETPLACE PROXY:");
    info!("   • GET  /api/magic-eden/{{path}}?{{query}}");
    info!(" COLLECTIONS:");
    info!("   • GET  /api/collections/popular?timeRange=1h|1d|7d|30d");
    info!("   • GET  /api/collections/trending?limit=20");
    info!("   • GET  /api/collections/timeframes?refresh=false");
    info!("   • GET  /api/collections/by-symbol/{{symbol}}");
    info!("   • GET  /api/collections/by-symbol/{{symbol}}/stats");
    info!("   • DELETE /api/collections/cache");
    info!(" HEALTH:");
    info!("   • GET  /health");
}
// endregion: --- Server Setup
