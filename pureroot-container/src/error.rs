//! Error types for PureRoot operations.
//!
//! Every error names what was asked for and, where it helps, what to do
//! about it.

use crate::dispose::DisposeError;
use crate::key::{HandlerKind, ScopeId};
use crate::scope::Lifetime;
use pureroot_support::rendering::{render_bullets, render_names};
use std::fmt;

/// Main error type for all PureRoot operations.
#[derive(Debug, thiserror::Error)]
pub enum PureRootError {
    /// No constructor is registered for the requested handler kind.
    #[error("{}", .0)]
    UnrecognizedKind(UnrecognizedKindError),

    /// A creation operation was attempted after `release_all`.
    #[error("Registry closed: cannot {operation} after the composition root was disposed")]
    RegistryClosed { operation: &'static str },

    /// A scoped value was read before anything stored it.
    #[error(
        "Scoped value not found: {capability} was never set in {scope}\n  \
         Hint: a handler read the value before the handler that provides it was constructed"
    )]
    ScopedValueNotFound {
        capability: String,
        scope: ScopeId,
    },

    /// The request scope already ended; nothing more can be stored in it.
    #[error("Request scope ended: cannot {operation} in {scope}")]
    ScopeEnded {
        operation: &'static str,
        scope: ScopeId,
    },

    /// A constructor returned an error.
    #[error("Failed to construct {family} `{kind}`: {source}")]
    ConstructionFailed {
        family: &'static str,
        kind: HandlerKind,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// One or more resources failed to release. The others were still released.
    #[error("{}", .0)]
    DisposalFailed(DisposalReport),

    /// An operation was refused and releasing what it had been handed failed too.
    #[error("{cause}\n  While releasing: {report}")]
    CleanupFailed {
        #[source]
        cause: Box<PureRootError>,
        report: DisposalReport,
    },
}

impl PureRootError {
    /// Attaches the failures of the release that `self` triggered.
    ///
    /// An empty report leaves the error unchanged.
    pub fn with_cleanup(self, report: DisposalReport) -> Self {
        if report.is_empty() {
            return self;
        }
        PureRootError::CleanupFailed {
            cause: Box::new(self),
            report,
        }
    }

    /// The error that started it, looking through [`CleanupFailed`](Self::CleanupFailed).
    pub fn cause(&self) -> &PureRootError {
        match self {
            PureRootError::CleanupFailed { cause, .. } => cause.cause(),
            other => other,
        }
    }

    pub(crate) fn after_cleanup<T>(self, cleanup: Result<T>) -> Self {
        match cleanup {
            Err(PureRootError::DisposalFailed(report)) => self.with_cleanup(report),
            _ => self,
        }
    }

    /// Wraps an arbitrary constructor error, keeping PureRoot errors as they are.
    pub fn construction(
        family: &'static str,
        kind: &HandlerKind,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let source = source.into();
        match source.downcast::<PureRootError>() {
            Ok(inner) => *inner,
            Err(source) => PureRootError::ConstructionFailed {
                family,
                kind: kind.clone(),
                source,
            },
        }
    }
}

/// Error when a handler kind has no registered constructor.
#[derive(Debug)]
pub struct UnrecognizedKindError {
    /// `"controller"`, `"middleware"`, ...
    pub family: &'static str,
    pub requested: HandlerKind,
    pub known: Vec<HandlerKind>,
    /// Close matches among `known`
    pub suggestions: Vec<String>,
}

impl fmt::Display for UnrecognizedKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unrecognized {} kind: {}", self.family, self.requested)?;
        write!(f, "\n  Registered: {}", render_names(&self.known))?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:{}", render_bullets(&self.suggestions))?;
        }

        Ok(())
    }
}

/// A single resource that failed to release.
#[derive(Debug)]
pub struct DisposalFailure {
    pub resource: String,
    pub lifetime: Lifetime,
    pub error: DisposeError,
}

/// Failures collected during one release pass.
#[derive(Debug, Default)]
pub struct DisposalReport {
    pub failures: Vec<DisposalFailure>,
}

impl DisposalReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, failure: DisposalFailure) {
        self.failures.push(failure);
    }

    pub fn merge(&mut self, other: DisposalReport) {
        self.failures.extend(other.failures);
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// `Ok(value)` when nothing failed, `DisposalFailed` otherwise.
    pub fn into_result<T>(self, value: T) -> Result<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(PureRootError::DisposalFailed(self))
        }
    }
}

impl fmt::Display for DisposalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .failures
            .iter()
            .map(|failure| {
                format!(
                    "{} ({}): {}",
                    failure.resource, failure.lifetime, failure.error
                )
            })
            .collect();

        write!(
            f,
            "Failed to release {} resource(s):{}",
            self.failures.len(),
            render_bullets(&lines)
        )
    }
}

/// Convenient Result type for PureRoot operations.
pub type Result<T> = std::result::Result<T, PureRootError>;
