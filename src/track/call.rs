//! Function wrapping: track whatever pending work a function hands back.
//!
//! [`track_async_function`] turns `func` into a [`TrackedFunction`] with the
//! same call contract. Arguments (receiver first, when there is one) go in
//! as a single value, usually a tuple.
//!
//! Async functions and closures returning a future go through
//! [`TrackedFunction::call_async`], which tracks every returned future.
//! Functions whose result is only sometimes pending go through
//! [`TrackedFunction::call`]; which return types it inspects is decided by
//! [`Trackable`]:
//!
//! | returned value          | returned to caller                       |
//! |-------------------------|------------------------------------------|
//! | `Completion::Pending(f)`| `Completion::Pending(track_dynamic_import(f))` |
//! | `Completion::Ready(v)`  | unchanged                                |
//! | `Ok(r)`                 | `Ok(r.track())`                          |
//! | `Err(e)`                | unchanged, signal untouched              |
//!
//! Panics from `func` unwind through the wrapper untouched.

use std::fmt;
use std::future::IntoFuture;

use super::Completion;
use super::import::{TrackedImport, track_dynamic_import};
use crate::tracing_compat::trace_span;

/// Prefix added to the name of every tracked function.
pub const TRACKED_NAME_PREFIX: &str = "tracked::";

/// Return values a [`TrackedFunction`] knows how to inspect.
pub trait Trackable {
    /// The value handed back to the caller.
    type Tracked;

    /// Routes pending work through the import tracker; passes the rest.
    fn track(self) -> Self::Tracked;
}

impl<T, F: IntoFuture> Trackable for Completion<T, F> {
    type Tracked = Completion<T, TrackedImport<F::IntoFuture>>;

    fn track(self) -> Self::Tracked {
        self.map_pending(track_dynamic_import)
    }
}

impl<R: Trackable, E> Trackable for Result<R, E> {
    type Tracked = Result<R::Tracked, E>;

    fn track(self) -> Self::Tracked {
        self.map(Trackable::track)
    }
}

/// A function whose pending results count against the current prerender.
#[derive(Clone)]
pub struct TrackedFunction<Func> {
    name: String,
    func: Func,
}

impl<Func> TrackedFunction<Func> {
    /// Wraps `func` under an explicit diagnostic name.
    pub fn with_name(name: impl Into<String>, func: Func) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// Returns the diagnostic name of the wrapper.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls the wrapped function and tracks a pending result.
    pub fn call<A, R>(&self, args: A) -> R::Tracked
    where
        Func: Fn(A) -> R,
        R: Trackable,
    {
        let _span = trace_span!("tracked_call", name = %self.name).entered();
        (self.func)(args).track()
    }

    /// Calls a wrapped async function and tracks the future it returns.
    pub fn call_async<A, Fut>(&self, args: A) -> TrackedImport<Fut::IntoFuture>
    where
        Func: Fn(A) -> Fut,
        Fut: IntoFuture,
    {
        let _span = trace_span!("tracked_call", name = %self.name).entered();
        track_dynamic_import((self.func)(args))
    }

    /// Converts the wrapper of an async function into a plain closure.
    pub fn into_async_fn<A, Fut>(self) -> impl Fn(A) -> TrackedImport<Fut::IntoFuture>
    where
        Func: Fn(A) -> Fut,
        Fut: IntoFuture,
    {
        move |args: A| self.call_async(args)
    }

    /// Returns the wrapped function.
    pub fn into_inner(self) -> Func {
        self.func
    }

    /// Converts the wrapper into a plain closure.
    pub fn into_fn<A, R>(self) -> impl Fn(A) -> R::Tracked
    where
        Func: Fn(A) -> R,
        R: Trackable,
    {
        move |args: A| self.call(args)
    }
}

impl<Func> fmt::Debug for TrackedFunction<Func> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Wraps `func` so that pending work it returns is tracked.
///
/// The wrapper is named `tracked::<name>` so it never shows up under the
/// same label as the function it wraps.
pub fn track_async_function<Func>(name: &str, func: Func) -> TrackedFunction<Func> {
    TrackedFunction::with_name(format!("{TRACKED_NAME_PREFIX}{name}"), func)
}
