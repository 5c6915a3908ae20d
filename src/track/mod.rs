//! Tracking of dynamic-import-shaped async work.
//!
//! - [`import`]: counts one pending load against the current prerender's
//!   read signal ([`track_dynamic_import`]).
//! - [`call`]: wraps a function so that pending results it returns are
//!   counted the same way ([`track_async_function`]).
//!
//! Both are synchronous with respect to their caller: they never await,
//! they only attach bookkeeping to the future they hand back.

pub mod call;
pub mod import;

pub use call::{TRACKED_NAME_PREFIX, Trackable, TrackedFunction, track_async_function};
pub use import::{
    ReadLease, TrackedImport, track_dynamic_import, track_dynamic_import_with,
    try_track_completion,
};

/// Result of a call that may finish synchronously or hand back pending work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion<T, F> {
    /// The call produced its value directly.
    Ready(T),
    /// The call returned work that settles later.
    Pending(F),
}

impl<T, F> Completion<T, F> {
    /// Returns true if the value is pending.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Returns the ready value, if any.
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Pending(_) => None,
        }
    }

    /// Returns the pending work, if any.
    pub fn pending(self) -> Option<F> {
        match self {
            Self::Ready(_) => None,
            Self::Pending(work) => Some(work),
        }
    }

    /// Maps the pending work, leaving ready values untouched.
    pub fn map_pending<G>(self, f: impl FnOnce(F) -> G) -> Completion<T, G> {
        match self {
            Self::Ready(value) => Completion::Ready(value),
            Self::Pending(work) => Completion::Pending(f(work)),
        }
    }
}
