//! Test utilities for prerender tracking.
//!
//! Shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - A read signal that records every call made to it
//! - A manually settled future standing in for an in-flight import
//! - Small polling helpers (no executor required)
//!
//! # Example
//! ```
//! use prerender_track::test_utils::{Deferred, RecordingSignal, init_test_logging};
//! use prerender_track::{WorkUnit, track_dynamic_import};
//!
//! init_test_logging();
//! let signal = RecordingSignal::new_shared();
//! let (import, resolver) = Deferred::<u8>::new();
//! let tracked = WorkUnit::prerender(signal.handle()).run(|| track_dynamic_import(import));
//! assert_eq!(signal.pending(), 1);
//! resolver.resolve(1);
//! assert_eq!(prerender_track::test_utils::block_on(tracked), 1);
//! assert_eq!(signal.pending(), 0);
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::task::{Context, Poll, Wake, Waker};

use parking_lot::Mutex;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::signal::{ReadSignal, SignalHandle};

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// One call observed by a [`RecordingSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// `begin_read` was called.
    Begin,
    /// `end_read` was called.
    End,
}

/// Read signal that records the order of every call.
///
/// Unlike [`CacheSignal`](crate::signal::CacheSignal) it never saturates, so
/// an unpaired `end_read` shows up as a negative balance.
#[derive(Debug, Default)]
pub struct RecordingSignal {
    events: Mutex<Vec<SignalEvent>>,
}

impl RecordingSignal {
    /// Creates a signal behind an `Arc`.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns a type-erased handle to this signal.
    #[must_use]
    pub fn handle(self: &Arc<Self>) -> SignalHandle {
        Arc::clone(self) as SignalHandle
    }

    /// Returns every recorded call in order.
    #[must_use]
    pub fn events(&self) -> Vec<SignalEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of `begin_read` calls.
    #[must_use]
    pub fn begins(&self) -> usize {
        self.count(SignalEvent::Begin)
    }

    /// Returns the number of `end_read` calls.
    #[must_use]
    pub fn ends(&self) -> usize {
        self.count(SignalEvent::End)
    }

    /// Returns begins minus ends.
    #[must_use]
    pub fn pending(&self) -> isize {
        let begins = isize::try_from(self.begins()).unwrap_or(isize::MAX);
        let ends = isize::try_from(self.ends()).unwrap_or(isize::MAX);
        begins - ends
    }

    fn count(&self, kind: SignalEvent) -> usize {
        self.events.lock().iter().filter(|e| **e == kind).count()
    }
}

impl ReadSignal for RecordingSignal {
    fn begin_read(&self) {
        self.events.lock().push(SignalEvent::Begin);
    }

    fn end_read(&self) {
        self.events.lock().push(SignalEvent::End);
    }
}

#[derive(Debug)]
struct DeferredSlot<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

/// Future that completes when its [`Resolver`] is given a value.
///
/// Stands in for an import whose settlement the test controls.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Deferred<T> {
    slot: Arc<Mutex<DeferredSlot<T>>>,
}

/// Settles the paired [`Deferred`].
#[derive(Debug)]
pub struct Resolver<T> {
    slot: Arc<Mutex<DeferredSlot<T>>>,
}

impl<T> Deferred<T> {
    /// Creates an unsettled future and its resolver.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, Resolver<T>) {
        let slot = Arc::new(Mutex::new(DeferredSlot {
            value: None,
            waker: None,
        }));
        (
            Self {
                slot: Arc::clone(&slot),
            },
            Resolver { slot },
        )
    }
}

impl<T> Resolver<T> {
    /// Settles the future with `value` and wakes its task.
    pub fn resolve(self, value: T) {
        let waker = {
            let mut slot = self.slot.lock();
            slot.value = Some(value);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Future for Deferred<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut slot = self.slot.lock();
        match slot.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Counts wakes delivered to its waker.
#[derive(Debug, Default)]
pub struct WakeCounter {
    wakes: AtomicUsize,
}

impl WakeCounter {
    /// Creates a counter behind an `Arc`.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns a waker that increments this counter.
    #[must_use]
    pub fn waker(self: &Arc<Self>) -> Waker {
        Waker::from(Arc::clone(self))
    }

    /// Returns the number of wakes so far.
    #[must_use]
    pub fn wakes(&self) -> usize {
        self.wakes.load(Ordering::SeqCst)
    }
}

impl Wake for WakeCounter {
    fn wake(self: Arc<Self>) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Polls `future` once with a no-op waker.
pub fn poll_once<F: Future + Unpin>(future: &mut F) -> Option<F::Output> {
    let mut cx = Context::from_waker(Waker::noop());
    match Pin::new(future).poll(&mut cx) {
        Poll::Ready(value) => Some(value),
        Poll::Pending => None,
    }
}

/// Runs `future` to completion on the current thread.
pub fn block_on<F: Future>(future: F) -> F::Output {
    futures_lite::future::block_on(future)
}

/// Yields once to the executor.
pub async fn yield_now() {
    futures_lite::future::yield_now().await;
}
