//! Loader instrumentation: route bundler module loaders through tracking.
//!
//! Bundler runtimes expose module loading through a handful of well-known
//! globals ([`BUNDLER_LOADER_GLOBALS`]). Chunk loads through them are
//! dynamic imports in all but name, so the instrumentation pass replaces
//! each registered global with a [`TrackedFunction`] around the original.
//!
//! Only names that are actually registered are wrapped; a missing global is
//! reported, never invented. Running the pass twice wraps nothing twice.
//!
//! ```ignore
//! let mut loaders = LoaderTable::new();
//! loaders.register("__turbopack_load__", load_chunk);
//!
//! let report = Instrumenter::new(TrackingConfig::default())?.instrument(&mut loaders);
//! assert_eq!(report.wrapped, ["__turbopack_load__"]);
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::TrackingConfig;
use crate::error::{Error, Result};
use crate::tracing_compat::debug;
use crate::track::{Completion, TrackedFunction};

/// Loader globals wrapped by default.
pub const BUNDLER_LOADER_GLOBALS: [&str; 4] = [
    "__webpack_load__",
    "__webpack_require__",
    "__turbopack_load__",
    "__turbopack_require__",
];

/// Exports of a loaded module.
pub type ModuleExports = Arc<dyn Any + Send + Sync>;

/// Why a module could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// Nothing is known under this specifier.
    #[error("module not found: {specifier}")]
    NotFound {
        /// Requested module specifier.
        specifier: String,
    },
    /// The module exists but failed to load or evaluate.
    #[error("failed to load {specifier}: {reason}")]
    Failed {
        /// Requested module specifier.
        specifier: String,
        /// Loader-provided reason.
        reason: String,
    },
}

/// Result of a module load.
pub type LoadResult = std::result::Result<ModuleExports, LoadError>;

/// A module load that settles later.
pub type LoadFuture = Pin<Box<dyn Future<Output = LoadResult> + Send>>;

/// What a loader returns: a module that was already available, or a load
/// in flight.
pub type LoaderOutput = Completion<LoadResult, LoadFuture>;

type LoaderFn = Arc<dyn Fn(&str) -> LoaderOutput + Send + Sync>;

/// A named module loader.
#[derive(Clone)]
pub struct Loader {
    name: String,
    func: LoaderFn,
    instrumented: bool,
}

impl Loader {
    /// Creates a loader with the given diagnostic name.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> LoaderOutput + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
            instrumented: false,
        }
    }

    /// Returns the diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this loader already tracks its pending loads.
    #[must_use]
    pub fn is_instrumented(&self) -> bool {
        self.instrumented
    }

    /// Loads `specifier`.
    pub fn call(&self, specifier: &str) -> LoaderOutput {
        (self.func)(specifier)
    }

    fn into_tracked(self, name: String) -> Self {
        let inner = self.func;
        let tracked = TrackedFunction::with_name(name.clone(), move |specifier: &str| {
            inner(specifier)
        });
        Self {
            name,
            func: Arc::new(move |specifier: &str| {
                tracked
                    .call(specifier)
                    .map_pending(|load| Box::pin(load) as LoadFuture)
            }),
            instrumented: true,
        }
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("name", &self.name)
            .field("instrumented", &self.instrumented)
            .finish_non_exhaustive()
    }
}

/// Module loaders by global name.
#[derive(Debug, Clone, Default)]
pub struct LoaderTable {
    loaders: BTreeMap<String, Loader>,
}

impl LoaderTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `func` under `global`, returning the loader it replaced.
    pub fn register<F>(&mut self, global: impl Into<String>, func: F) -> Option<Loader>
    where
        F: Fn(&str) -> LoaderOutput + Send + Sync + 'static,
    {
        let global = global.into();
        let loader = Loader::new(global.clone(), func);
        self.loaders.insert(global, loader)
    }

    /// Returns true if a loader is registered under `global`.
    #[must_use]
    pub fn contains(&self, global: &str) -> bool {
        self.loaders.contains_key(global)
    }

    /// Returns the loader registered under `global`.
    #[must_use]
    pub fn get(&self, global: &str) -> Option<&Loader> {
        self.loaders.get(global)
    }

    /// Returns the registered global names in order.
    pub fn globals(&self) -> impl Iterator<Item = &str> {
        self.loaders.keys().map(String::as_str)
    }

    /// Loads `specifier` through the loader registered under `global`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::UnknownLoader`](crate::error::ErrorKind::UnknownLoader)
    /// if nothing is registered under `global`.
    pub fn load(&self, global: &str, specifier: &str) -> Result<LoaderOutput> {
        self.get(global)
            .map(|loader| loader.call(specifier))
            .ok_or_else(|| Error::unknown_loader(global))
    }
}

/// Outcome of one instrumentation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentReport {
    /// Globals wrapped by this pass.
    pub wrapped: Vec<String>,
    /// Globals that were already wrapped.
    pub already_instrumented: Vec<String>,
    /// Configured globals with no registered loader.
    pub missing: Vec<String>,
}

/// Applies [`TrackedFunction`] wrapping to configured loader globals.
#[derive(Debug, Clone, Default)]
pub struct Instrumenter {
    config: TrackingConfig,
}

impl Instrumenter {
    /// Creates an instrumenter after validating `config`.
    pub fn new(config: TrackingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Wraps every configured global registered in `table`.
    pub fn instrument(&self, table: &mut LoaderTable) -> InstrumentReport {
        let mut report = InstrumentReport::default();
        if !self.config.enabled {
            debug!("loader instrumentation disabled");
            return report;
        }

        for global in &self.config.instrumented_globals {
            let Some(loader) = table.loaders.remove(global) else {
                report.missing.push(global.clone());
                continue;
            };
            if loader.is_instrumented() {
                table.loaders.insert(global.clone(), loader);
                report.already_instrumented.push(global.clone());
                continue;
            }
            let name = format!("{}{global}", self.config.function_name_prefix);
            debug!(global = %global, name = %name, "instrumenting loader");
            table.loaders.insert(global.clone(), loader.into_tracked(name));
            report.wrapped.push(global.clone());
        }
        report
    }
}
