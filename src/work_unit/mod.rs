//! Work-unit context: which rendering phase is currently executing.
//!
//! A [`WorkUnit`] describes the phase a piece of rendering code runs in.
//! Only the [`Prerender`](WorkUnit::Prerender) variant carries a read
//! signal, so only prerenders count dynamic imports.
//!
//! The current unit is scope-based ambient state (see [`store`]): entered on
//! the current thread with [`WorkUnit::enter`], or attached to a logical
//! task with [`WorkUnit::scope`], which re-enters it around every poll.

pub mod store;

pub use store::{Scoped, WorkUnitGuard};

use std::fmt;

use crate::signal::SignalHandle;

/// Discriminator of a [`WorkUnit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkUnitKind {
    /// Static prerender with read accounting.
    Prerender,
    /// Partial prerender (static shell with dynamic holes).
    PrerenderPpr,
    /// Prerender without dynamic-IO tracking.
    PrerenderLegacy,
    /// Live request render.
    Request,
    /// Inside a cache scope.
    Cache,
    /// Inside a legacy cache wrapper.
    UnstableCache,
}

impl WorkUnitKind {
    /// Returns the kind name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prerender => "prerender",
            Self::PrerenderPpr => "prerender-ppr",
            Self::PrerenderLegacy => "prerender-legacy",
            Self::Request => "request",
            Self::Cache => "cache",
            Self::UnstableCache => "unstable-cache",
        }
    }
}

impl fmt::Display for WorkUnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of the rendering phase a piece of code runs in.
#[derive(Debug, Clone)]
pub enum WorkUnit {
    /// Static prerender; reads are counted against `cache_signal` if set.
    Prerender {
        /// Read signal of the render, if the render tracks reads.
        cache_signal: Option<SignalHandle>,
    },
    /// Partial prerender.
    PrerenderPpr,
    /// Legacy prerender.
    PrerenderLegacy,
    /// Live request.
    Request,
    /// Cache scope.
    Cache,
    /// Legacy cache wrapper.
    UnstableCache,
}

impl WorkUnit {
    /// Creates a prerender unit counting reads against `signal`.
    #[must_use]
    pub fn prerender(signal: SignalHandle) -> Self {
        Self::Prerender {
            cache_signal: Some(signal),
        }
    }

    /// Creates a prerender unit that does not track reads.
    #[must_use]
    pub const fn prerender_without_signal() -> Self {
        Self::Prerender { cache_signal: None }
    }

    /// Returns the discriminator.
    #[must_use]
    pub const fn kind(&self) -> WorkUnitKind {
        match self {
            Self::Prerender { .. } => WorkUnitKind::Prerender,
            Self::PrerenderPpr => WorkUnitKind::PrerenderPpr,
            Self::PrerenderLegacy => WorkUnitKind::PrerenderLegacy,
            Self::Request => WorkUnitKind::Request,
            Self::Cache => WorkUnitKind::Cache,
            Self::UnstableCache => WorkUnitKind::UnstableCache,
        }
    }

    /// Returns the read signal if this is a prerender that carries one.
    #[must_use]
    pub fn cache_signal(&self) -> Option<&SignalHandle> {
        match self {
            Self::Prerender { cache_signal } => cache_signal.as_ref(),
            _ => None,
        }
    }
}
