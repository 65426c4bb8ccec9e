//! Cooperative cancellation.
//!
//! One [`CancelToken`] is created in `main` and passed explicitly to whoever
//! needs to observe it.  It fires at most once; later `cancel()` calls are
//! no-ops.  SIGINT and SIGTERM are both translated into that single firing by
//! [`listen_for_signals`].

use std::{
    io,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread,
    time::Duration,
};

use signal_hook::{
    consts::signal::{SIGINT, SIGTERM},
    iterator::Signals,
};
use tracing::info;

/// Single-shot, cloneable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<State>,
}

#[derive(Debug, Default)]
struct State {
    cancelled: Mutex<bool>,
    changed: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token.  Returns `true` only for the call that fired it.
    pub fn cancel(&self) -> bool {
        let mut cancelled = self.lock();
        if *cancelled {
            return false;
        }
        *cancelled = true;
        self.inner.changed.notify_all();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        *self.lock()
    }

    /// Block until the token fires or `timeout` elapses.  Returns whether it
    /// has fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .inner
            .changed
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fire `token` on SIGINT or SIGTERM.
///
/// Registration happens before this returns; delivery runs on a background
/// thread for the rest of the process lifetime.  Once registered, the signals
/// no longer terminate the process.
pub fn listen_for_signals(token: CancelToken) -> io::Result<thread::JoinHandle<()>> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            for signal in signals.forever() {
                if token.cancel() {
                    info!(signal, "received signal, cancelling backup");
                }
            }
        })
}
