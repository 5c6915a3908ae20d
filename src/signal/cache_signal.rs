//! Reference read signal with a quiescence future.
//!
//! # Example
//!
//! ```ignore
//! use prerender_track::signal::CacheSignal;
//!
//! let signal = CacheSignal::new_shared();
//! let unit = WorkUnit::prerender(signal.handle());
//!
//! // ... render inside `unit.scope(..)`, tracked imports begin reads ...
//!
//! signal.cache_ready().await; // every tracked import has settled
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use super::{ReadSignal, SignalHandle};
use crate::error::{Error, ErrorKind, Result};
use crate::tracing_compat::{error, trace};

/// Counting read signal.
#[derive(Debug, Default)]
pub struct CacheSignal {
    state: Mutex<CacheSignalState>,
}

#[derive(Debug, Default)]
struct CacheSignalState {
    /// Outstanding reads.
    pending: usize,
    /// Reads begun over the signal's lifetime.
    total: u64,
    /// Tasks waiting for quiescence, keyed by [`CacheReady`] id.
    waiters: Vec<(u64, Waker)>,
    next_waiter_id: u64,
}

impl CacheSignal {
    /// Creates a quiescent signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a quiescent signal behind an `Arc`.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the number of outstanding reads.
    #[must_use]
    pub fn pending_reads(&self) -> usize {
        self.state.lock().pending
    }

    /// Returns the number of reads begun since creation.
    #[must_use]
    pub fn total_reads(&self) -> u64 {
        self.state.lock().total
    }

    /// Returns true if no reads are outstanding.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.pending_reads() == 0
    }

    /// Returns a type-erased handle to this signal.
    #[must_use]
    pub fn handle(self: &Arc<Self>) -> SignalHandle {
        Arc::clone(self) as SignalHandle
    }

    /// Ends one read, reporting a pairing violation instead of underflowing.
    pub fn try_end_read(&self) -> Result<()> {
        let waiters = {
            let mut state = self.state.lock();
            if state.pending == 0 {
                return Err(Error::new(ErrorKind::UnpairedEndRead));
            }
            state.pending -= 1;
            trace!(pending = state.pending, "cache signal read ended");
            if state.pending == 0 {
                std::mem::take(&mut state.waiters)
            } else {
                Vec::new()
            }
        };
        for (_, waker) in waiters {
            waker.wake();
        }
        Ok(())
    }

    /// Waits until no reads are outstanding.
    ///
    /// Resolves immediately if the signal is already quiescent. A read that
    /// begins after this future resolved is not observed by it.
    pub fn cache_ready(&self) -> CacheReady<'_> {
        CacheReady {
            signal: self,
            waiter: None,
        }
    }
}

impl ReadSignal for CacheSignal {
    fn begin_read(&self) {
        let mut state = self.state.lock();
        state.pending += 1;
        state.total += 1;
        trace!(pending = state.pending, "cache signal read begun");
    }

    #[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
    fn end_read(&self) {
        if let Err(err) = self.try_end_read() {
            error!(error = %err, "cache signal pairing violated");
        }
    }
}

/// Future returned by [`CacheSignal::cache_ready`].
///
/// Holds at most one entry in the signal's waiter list; dropping the future
/// removes it.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct CacheReady<'a> {
    signal: &'a CacheSignal,
    waiter: Option<u64>,
}

impl Future for CacheReady<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let mut state = this.signal.state.lock();
        if state.pending == 0 {
            this.waiter = None;
            return Poll::Ready(());
        }
        let entry = this
            .waiter
            .and_then(|id| state.waiters.iter_mut().find(|(wid, _)| *wid == id));
        match entry {
            Some((_, waker)) => {
                if !waker.will_wake(cx.waker()) {
                    waker.clone_from(cx.waker());
                }
            }
            // Not registered yet, or the entry was drained by a wake.
            None => {
                let id = state.next_waiter_id;
                state.next_waiter_id += 1;
                state.waiters.push((id, cx.waker().clone()));
                this.waiter = Some(id);
            }
        }
        Poll::Pending
    }
}

impl Drop for CacheReady<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.waiter.take() {
            self.signal.state.lock().waiters.retain(|(wid, _)| *wid != id);
        }
    }
}
