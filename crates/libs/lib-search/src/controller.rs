//! # Search Controller
//!
//! Debounced, cancelable search with stale-response discard and pagination.
//!
//! ## Flow
//!
//! 1. [`set_query`](SearchController::set_query) stores the text and (re)arms the
//!    debounce timer. Edits inside the window reset it.
//! 2. When the timer fires, the settled query is issued unless it equals the
//!    last issued one.
//! 3. Issuing a request cancels the previous one and bumps the request
//!    generation. A response is applied only if its generation is still current.
//! 4. [`load_more`](SearchController::load_more) appends the next page.
//!
//! Cancellation is silent: it never sets `error` and never clears results that
//! are still on screen. Dropping the controller cancels its timer and its
//! in-flight request.
//!
//! ## Example
//! ```no_run
//! # async fn demo(backend: std::sync::Arc<dyn lib_search::SearchBackend>) {
//! use lib_search::{SearchController, SearchSettings};
//!
//! let controller = SearchController::new(backend, SearchSettings::default());
//! controller.set_query("mad lads");
//! tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//! println!("{} results", controller.state().results.len());
//! # }
//! ```

use crate::backend::SearchBackend;
use crate::debounce::Debouncer;
use lib_core::dto::{SearchPage, SearchRequest, SearchResult};
use lib_core::{AppError, Config, Result};
use lib_utils::CancellationToken;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Controller tunables.
#[derive(Clone, Debug)]
pub struct SearchSettings {
    pub debounce: Duration,
    /// Trimmed queries shorter than this never reach the backend.
    pub min_query_length: usize,
    pub page_size: u32,
    pub initial_page: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SearchSettings {
    fn from(config: &Config) -> Self {
        Self {
            debounce: config.search_debounce,
            min_query_length: config.search_min_query_length,
            page_size: config.search_page_size,
            initial_page: 1,
        }
    }
}

/// Everything the presentation layer reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub searching: bool,
    pub error: Option<String>,
    pub current_page: u32,
    pub total_results: u64,
    pub has_more: bool,
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
}

struct Inner {
    backend: Arc<dyn SearchBackend>,
    settings: SearchSettings,
    state: RwLock<SearchState>,
    /// Lock order: `current` before `state`.
    current: Mutex<Option<InFlight>>,
    next_generation: Mutex<u64>,
    /// Last first-page query sent to the backend.
    last_query: Mutex<Option<String>>,
}

pub struct SearchController {
    inner: Arc<Inner>,
    debouncer: Debouncer,
}

impl SearchController {
    pub fn new(backend: Arc<dyn SearchBackend>, settings: SearchSettings) -> Self {
        let debouncer = Debouncer::new(settings.debounce);
        let state = SearchState {
            current_page: settings.initial_page,
            ..SearchState::default()
        };

        Self {
            inner: Arc::new(Inner {
                backend,
                settings,
                state: RwLock::new(state),
                current: Mutex::new(None),
                next_generation: Mutex::new(0),
                last_query: Mutex::new(None),
            }),
            debouncer,
        }
    }

    /// Build a controller and schedule `initial_query` when it is not blank.
    pub fn with_query(
        backend: Arc<dyn SearchBackend>,
        settings: SearchSettings,
        initial_query: &str,
    ) -> Self {
        let controller = Self::new(backend, settings);
        if !initial_query.trim().is_empty() {
            controller.set_query(initial_query);
        }
        controller
    }

    // region: --- Reads

    pub fn state(&self) -> SearchState {
        self.inner.state.read().clone()
    }

    pub fn query(&self) -> String {
        self.inner.state.read().query.clone()
    }

    pub fn results(&self) -> Vec<SearchResult> {
        self.inner.state.read().results.clone()
    }

    pub fn is_searching(&self) -> bool {
        self.inner.state.read().searching
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.read().error.clone()
    }

    pub fn has_more(&self) -> bool {
        self.inner.state.read().has_more
    }

    // endregion: --- Reads

    // region: --- Commands

    /// Update the query text and debounce a search for it.
    pub fn set_query(&self, query: impl Into<String>) {
        let query = query.into();
        let trimmed = query.trim().to_string();
        self.inner.state.write().query = query;

        if trimmed.is_empty() || trimmed.chars().count() < self.inner.settings.min_query_length {
            debug!("Query below minimum length, clearing results");
            self.debouncer.cancel();
            self.inner.cancel_in_flight();
            *self.inner.last_query.lock() = None;

            let mut state = self.inner.state.write();
            state.results.clear();
            state.error = None;
            state.current_page = self.inner.settings.initial_page;
            state.total_results = 0;
            state.has_more = false;
            return;
        }

        let inner = Arc::clone(&self.inner);
        self.debouncer.schedule(async move {
            inner.on_settled(trimmed);
        });
    }

    /// Issue a search right away, bypassing the debounce timer.
    ///
    /// `page > 1` appends to the current results.
    pub fn search(&self, query: &str, page: u32) {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return;
        }
        self.debouncer.cancel();
        self.inner.start_search(trimmed.to_string(), page.max(1));
    }

    /// Request the next page of the results on screen. Returns `false` when nothing was issued.
    ///
    /// Continues the last settled query, not the text still inside the debounce window.
    pub fn load_more(&self) -> bool {
        let next_page = {
            let state = self.inner.state.read();
            if state.searching || !state.has_more || state.query.trim().is_empty() {
                return false;
            }
            state.current_page + 1
        };
        let Some(query) = self.inner.last_query.lock().clone() else {
            return false;
        };

        debug!("Loading page {} for '{}'", next_page, query);
        self.inner.start_search(query, next_page);
        true
    }

    /// Reset to the initial state and drop any pending work.
    pub fn clear_search(&self) {
        self.debouncer.cancel();
        self.inner.cancel_in_flight();
        *self.inner.last_query.lock() = None;
        *self.inner.state.write() = SearchState {
            current_page: self.inner.settings.initial_page,
            ..SearchState::default()
        };
    }

    pub fn clear_error(&self) {
        self.inner.state.write().error = None;
    }

    /// Cancel the debounce timer and the in-flight request, keeping results.
    pub fn cancel_pending_requests(&self) {
        self.debouncer.cancel();
        self.inner.cancel_in_flight();
        *self.inner.last_query.lock() = None;
    }

    // endregion: --- Commands
}

impl Drop for SearchController {
    fn drop(&mut self) {
        self.debouncer.cancel();
        self.inner.cancel_in_flight();
    }
}

impl Inner {
    fn on_settled(self: &Arc<Self>, query: String) {
        if self.last_query.lock().as_deref() == Some(query.as_str()) {
            debug!("Query '{}' unchanged, not re-issuing", query);
            return;
        }
        self.start_search(query, self.settings.initial_page);
    }

    /// Cancel the previous request, register a new generation and spawn the call.
    fn start_search(self: &Arc<Self>, query: String, page: u32) {
        let token = CancellationToken::new();

        let generation = {
            let mut current = self.current.lock();
            if let Some(previous) = current.take() {
                debug!("Cancelling request generation {}", previous.generation);
                previous.token.cancel();
            }

            let generation = {
                let mut next = self.next_generation.lock();
                *next += 1;
                *next
            };
            *current = Some(InFlight {
                generation,
                token: token.clone(),
            });

            let mut state = self.state.write();
            state.searching = true;
            state.error = None;
            generation
        };

        if page <= self.settings.initial_page {
            *self.last_query.lock() = Some(query.clone());
        }

        let request = SearchRequest {
            query,
            page,
            limit: self.settings.page_size,
        };
        info!("Search '{}' page {} (generation {})", request.query, page, generation);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = inner.backend.search(&request, &token).await;
            inner.apply(generation, &request, result);
        });
    }

    /// Drop the in-flight request, if any. Returns `true` when one was cancelled.
    fn cancel_in_flight(&self) -> bool {
        let mut current = self.current.lock();
        match current.take() {
            Some(in_flight) => {
                in_flight.token.cancel();
                self.state.write().searching = false;
                true
            }
            None => false,
        }
    }

    fn apply(&self, generation: u64, request: &SearchRequest, result: Result<SearchPage>) {
        let mut current = self.current.lock();
        if current.as_ref().map(|f| f.generation) != Some(generation) {
            debug!(
                "Discarding stale response for '{}' (generation {})",
                request.query, generation
            );
            return;
        }
        *current = None;

        let mut state = self.state.write();
        state.searching = false;

        match result {
            Ok(page) => {
                let received = page.results.len();
                if request.page > self.settings.initial_page {
                    state.results.extend(page.results);
                } else {
                    state.results = page.results;
                }
                state.current_page = page.page.unwrap_or(request.page);
                state.total_results = page.total.unwrap_or(state.results.len() as u64);
                state.has_more = page
                    .has_more
                    .unwrap_or(received as u64 >= u64::from(request.limit));
                state.error = None;
            }
            Err(AppError::Cancelled) => {}
            Err(e) => {
                warn!("Search '{}' failed: {}", request.query, e);
                if request.page <= self.settings.initial_page {
                    state.results.clear();
                    state.total_results = 0;
                    state.has_more = false;
                }
                state.error = Some(e.user_message());
            }
        }
    }
}
