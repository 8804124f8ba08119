//! # Web Library
//!
//! The browser-facing proxy: HTTP handlers, middleware, and server setup.

pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::{create_router, init_tracing, start_server, AppState, ServerConfig};
