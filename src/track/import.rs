//! Dynamic import tracking.
//!
//! [`track_dynamic_import`] counts one in-flight module load against the
//! current prerender's read signal. The read begins inside the call itself,
//! before the caller gets the future back, and ends exactly once when the
//! future completes. The future's output is returned untouched.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project::pin_project;

use super::Completion;
use crate::error::{Error, Result};
use crate::signal::SignalHandle;
use crate::tracing_compat::trace;
use crate::work_unit::WorkUnit;

/// One begun read on a signal; ends it when released or dropped.
#[must_use = "dropping a lease ends the read immediately"]
pub struct ReadLease {
    signal: SignalHandle,
}

impl ReadLease {
    /// Begins a read on the current prerender's signal, if there is one.
    ///
    /// Returns `None` outside a prerender, or inside one without a signal.
    pub fn begin_current() -> Option<Self> {
        // Clone out first: the signal must not run under the store borrow.
        let signal = WorkUnit::with_current(|unit| unit.and_then(WorkUnit::cache_signal).cloned())?;
        Some(Self::begin(signal))
    }

    /// Begins a read on `signal`.
    pub fn begin(signal: SignalHandle) -> Self {
        signal.begin_read();
        trace!("dynamic import read begun");
        Self { signal }
    }

    /// Ends the read.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ReadLease {
    fn drop(&mut self) {
        self.signal.end_read();
        trace!("dynamic import read ended");
    }
}

impl fmt::Debug for ReadLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadLease")
            .field("signal", &self.signal)
            .finish()
    }
}

/// Future returned by [`track_dynamic_import`].
///
/// Holds the read lease until the inner future completes. Dropping it before
/// completion also ends the read: an abandoned load can never settle.
#[pin_project]
#[must_use = "futures do nothing unless polled"]
pub struct TrackedImport<F> {
    #[pin]
    inner: F,
    lease: Option<ReadLease>,
}

impl<F> TrackedImport<F> {
    /// Returns true while this future still holds a begun read.
    pub fn is_tracking(&self) -> bool {
        self.lease.is_some()
    }
}

impl<F: Future> Future for TrackedImport<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = self.project();
        let output = std::task::ready!(this.inner.poll(cx));
        if let Some(lease) = this.lease.take() {
            lease.release();
        }
        Poll::Ready(output)
    }
}

impl<F> fmt::Debug for TrackedImport<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedImport")
            .field("tracking", &self.lease.is_some())
            .finish_non_exhaustive()
    }
}

/// Counts `import` as outstanding work of the current prerender.
///
/// Must be called in the same synchronous expression that created `import`.
/// Outside a prerender with a read signal this has no side effects.
pub fn track_dynamic_import<F: IntoFuture>(import: F) -> TrackedImport<F::IntoFuture> {
    TrackedImport {
        lease: ReadLease::begin_current(),
        inner: import.into_future(),
    }
}

/// Like [`track_dynamic_import`], but creates the future itself.
///
/// The read begins before `make_import` runs, so no suspension point can
/// separate the load from its registration.
pub fn track_dynamic_import_with<F, M>(make_import: M) -> TrackedImport<F::IntoFuture>
where
    F: IntoFuture,
    M: FnOnce() -> F,
{
    let lease = ReadLease::begin_current();
    TrackedImport {
        inner: make_import().into_future(),
        lease,
    }
}

/// Checked form of [`track_dynamic_import`] for values whose shape is only
/// known at run time.
///
/// # Errors
///
/// A [`Completion::Ready`] value means the instrumentation wrapped something
/// that is not a pending load; this is reported as
/// [`ErrorKind::InvariantViolation`](crate::error::ErrorKind::InvariantViolation)
/// and nothing is counted.
pub fn try_track_completion<T, F: IntoFuture>(
    value: Completion<T, F>,
) -> Result<TrackedImport<F::IntoFuture>> {
    match value {
        Completion::Pending(import) => Ok(track_dynamic_import(import)),
        Completion::Ready(_) => Err(Error::invariant(
            "expected a pending import, got a ready value",
        )),
    }
}
