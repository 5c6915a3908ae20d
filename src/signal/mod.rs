//! Read signals: reference-counting barriers over outstanding async reads.
//!
//! A prerender owns one signal. Every piece of asynchronous work that must
//! contribute to the snapshot calls [`ReadSignal::begin_read`] when it
//! starts and [`ReadSignal::end_read`] exactly once when it settles. The
//! render is quiescent when the counter is back at zero.
//!
//! The trackers in [`crate::track`] only ever talk to the trait; the
//! [`CacheSignal`] here is the reference implementation used by the render
//! scheduler and by tests.

mod cache_signal;

pub use cache_signal::{CacheReady, CacheSignal};

use std::fmt;
use std::sync::Arc;

/// Counter of outstanding reads for one render.
///
/// Implementations must tolerate calls from any thread that holds a handle.
/// Callers must pair every `begin_read` with exactly one `end_read`.
pub trait ReadSignal: Send + Sync + fmt::Debug {
    /// Registers one unit of outstanding work.
    fn begin_read(&self);

    /// Unregisters one unit of outstanding work.
    fn end_read(&self);
}

/// Shared handle to a read signal, as carried by a prerender work unit.
pub type SignalHandle = Arc<dyn ReadSignal>;
