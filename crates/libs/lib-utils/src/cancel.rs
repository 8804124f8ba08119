//! # Cancellation Token
//!
//! A cloneable, one-way cancellation flag that async operations can poll at their
//! suspension points or await directly.
//!
//! ```rust,no_run
//! use lib_utils::CancellationToken;
//!
//! # async fn example() {
//! let token = CancellationToken::new();
//! let child = token.clone();
//!
//! tokio::spawn(async move {
//!     tokio::select! {
//!         _ = child.cancelled() => { /* stop work, no side effects */ }
//!         _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => {}
//!     }
//! });
//!
//! token.cancel();
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag the token and wake every task parked in [`cancelled`](Self::cancelled).
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled. Returns immediately if it already is.
    pub async fn cancelled(&self) {
        // Register interest before checking the flag so a concurrent cancel() is not missed.
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}
