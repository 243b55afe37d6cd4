#![forbid(unsafe_code)]

//! Cooperative cancellation for background tasks.
//!
//! A [`CancellationSource`] owns the signal; each task receives a cloneable
//! [`CancellationToken`] and polls it (or blocks on
//! [`CancellationToken::wait_timeout`]) between units of work. Rust threads
//! cannot be stopped from outside, so a task that never looks at its token
//! runs to completion and its result is discarded.
//!
//! # Example
//!
//! ```
//! use blockgrid_runtime::cancellation::CancellationSource;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//! let worker = std::thread::spawn(move || {
//!     let mut steps = 0u32;
//!     while token.check().is_ok() && steps < 1_000 {
//!         steps += 1;
//!     }
//!     steps
//! });
//! source.cancel();
//! assert!(worker.join().unwrap() <= 1_000);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use web_time::{Duration, Instant};

struct Signal {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Control side of a cancellation signal.
///
/// Dropping the source leaves its tokens uncancelled.
pub struct CancellationSource {
    signal: Arc<Signal>,
}

/// Observer side of a cancellation signal.
#[derive(Clone)]
pub struct CancellationToken {
    signal: Arc<Signal>,
}

/// Returned by [`CancellationToken::check`] once cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("task cancelled")
    }
}

impl std::error::Error for Cancelled {}

impl CancellationSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            signal: Arc::new(Signal {
                cancelled: AtomicBool::new(false),
                lock: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            signal: Arc::clone(&self.signal),
        }
    }

    /// Trip the signal and wake every waiting token. Idempotent.
    pub fn cancel(&self) {
        self.signal.cancelled.store(true, Ordering::Release);
        let _guard = self.signal.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.signal.wake.notify_all();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationToken {
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation was requested, for use with `?`.
    #[inline]
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Block until cancelled or until `duration` elapses.
    ///
    /// Returns `true` when cancelled.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut guard = self.signal.lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self
                .signal
                .wake
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            guard = next;
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
