//! Prerender-track: pending-async-work tracking for prerender passes.
//!
//! # Overview
//!
//! A prerender pass must not finish while module loads it started are
//! still in flight. Each prerender work unit carries a read signal; this
//! crate counts every dynamic import (and every call to an instrumented
//! loader that hands back pending work) against that signal, from the
//! moment the work is created until it settles. The renderer waits for the
//! count to reach zero before it takes its snapshot.
//!
//! Outside a prerender, every operation is a no-op and values pass through
//! untouched.
//!
//! # Module Structure
//!
//! - [`track`]: [`track_dynamic_import`] and [`track_async_function`]
//! - [`work_unit`]: the per-thread current work unit and [`Scoped`] futures
//! - [`signal`]: the [`ReadSignal`] seam and the counting [`CacheSignal`]
//! - [`instrument`]: wrapping of registered bundler loader globals
//! - [`config`]: [`TrackingConfig`] for the instrumentation pass
//! - [`error`](mod@error): Error types
//! - [`tracing_compat`]: Optional tracing integration (requires `tracing-integration` feature)
//!
//! # Example
//!
//! ```
//! use prerender_track::{CacheSignal, WorkUnit, track_dynamic_import};
//!
//! let signal = CacheSignal::new_shared();
//! let unit = WorkUnit::prerender(signal.handle());
//!
//! let chunk = unit.run(|| track_dynamic_import(async { "chunk" }));
//! assert_eq!(signal.pending_reads(), 1);
//!
//! let loaded = futures_lite::future::block_on(chunk);
//! assert_eq!(loaded, "chunk");
//! assert!(signal.is_quiescent());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod config;
pub mod error;
pub mod instrument;
pub mod signal;
pub mod track;
pub mod tracing_compat;
pub mod work_unit;

#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

pub use config::{ConfigError, TrackingConfig};
pub use error::{Error, ErrorCategory, ErrorKind, Recoverability, RecoveryAction, Result};
pub use instrument::{
    BUNDLER_LOADER_GLOBALS, InstrumentReport, Instrumenter, LoadError, LoadFuture, LoadResult,
    Loader, LoaderOutput, LoaderTable, ModuleExports,
};
pub use signal::{CacheReady, CacheSignal, ReadSignal, SignalHandle};
pub use track::{
    Completion, ReadLease, TRACKED_NAME_PREFIX, Trackable, TrackedFunction, TrackedImport,
    track_async_function, track_dynamic_import, track_dynamic_import_with, try_track_completion,
};
pub use work_unit::{Scoped, WorkUnit, WorkUnitGuard, WorkUnitKind};
