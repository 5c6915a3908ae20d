//! Error types and error handling strategy for prerender tracking.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Failures of the tracked operation are *not* errors of this crate; they
//!   flow through tracked futures untouched
//! - Errors are classified by recoverability so callers can tell an
//!   instrumentation bug from a bad configuration
//!
//! # Error Categories
//!
//! - **Internal**: instrumentation and runtime have drifted out of sync
//!   (a non-pending value reached the import tracker)
//! - **Signal**: read-signal pairing violations
//! - **Config**: invalid or unparsable tracking configuration
//! - **Loader**: module loader lookups that failed

use core::fmt;
use std::sync::Arc;

use crate::config::ConfigError;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Internal ===
    /// A value that is not pending reached the dynamic import tracker.
    InvariantViolation,

    // === Signal ===
    /// `end_read` was called with no outstanding read.
    UnpairedEndRead,

    // === Config ===
    /// Configuration could not be parsed or failed validation.
    InvalidConfig,

    // === Loader ===
    /// No loader is registered under the requested name.
    UnknownLoader,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvariantViolation => ErrorCategory::Internal,
            Self::UnpairedEndRead => ErrorCategory::Signal,
            Self::InvalidConfig => ErrorCategory::Config,
            Self::UnknownLoader => ErrorCategory::Loader,
        }
    }

    /// Returns the recoverability classification for this error kind.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        match self {
            Self::InvariantViolation | Self::UnpairedEndRead | Self::InvalidConfig => {
                Recoverability::Permanent
            }
            Self::UnknownLoader => Recoverability::Unknown,
        }
    }

    /// Returns the recommended recovery action for this error kind.
    #[must_use]
    pub const fn recovery_action(&self) -> RecoveryAction {
        match self {
            // The barrier can no longer be trusted; abort the render.
            Self::InvariantViolation | Self::UnpairedEndRead => RecoveryAction::Escalate,
            Self::InvalidConfig => RecoveryAction::Propagate,
            Self::UnknownLoader => RecoveryAction::Custom,
        }
    }

    /// Returns a short static description of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvariantViolation => "internal invariant violated",
            Self::UnpairedEndRead => "end_read without matching begin_read",
            Self::InvalidConfig => "invalid tracking configuration",
            Self::UnknownLoader => "unknown module loader",
        }
    }
}

/// Classification of error recoverability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recoverability {
    /// Temporary failure that may succeed on retry.
    Transient,
    /// Permanent failure that will not succeed on retry.
    Permanent,
    /// Recoverability depends on context.
    Unknown,
}

impl Recoverability {
    /// Returns true if this error is safe to retry.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Returns true if this error should never be retried.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent)
    }
}

/// Recommended recovery action for an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryAction {
    /// Propagate the error to the caller without retry.
    Propagate,
    /// Abandon the current render; its completeness guarantee is void.
    Escalate,
    /// Recovery action depends on application-specific context.
    Custom,
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Instrumentation/runtime mismatch.
    Internal,
    /// Read-signal bookkeeping failures.
    Signal,
    /// Configuration failures.
    Config,
    /// Module loader failures.
    Loader,
}

/// The main error type for tracking operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates an internal invariant violation.
    #[must_use]
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvariantViolation).with_message(detail)
    }

    /// Creates an unknown loader error.
    #[must_use]
    pub fn unknown_loader(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownLoader)
            .with_message(format!("no loader registered as `{}`", name.into()))
    }

    /// Returns true if this error indicates an instrumentation bug.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self.kind, ErrorKind::InvariantViolation)
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the recoverability classification.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        self.kind.recoverability()
    }

    /// Returns the recommended recovery action for this error.
    #[must_use]
    pub const fn recovery_action(&self) -> RecoveryAction {
        self.kind.recovery_action()
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.as_str())?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::InvalidConfig)
            .with_message(err.to_string())
            .with_source(err)
    }
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;
