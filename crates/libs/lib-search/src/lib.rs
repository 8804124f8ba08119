//! # Search Library
//!
//! Client side of NFT search: the HTTP backend client and the debounced,
//! cancelable [`SearchController`].

pub mod backend;
pub mod controller;
pub mod debounce;

pub use backend::{HttpSearchBackend, SearchBackend};
pub use controller::{SearchController, SearchSettings, SearchState};
pub use debounce::Debouncer;
