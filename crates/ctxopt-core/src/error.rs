//! Error taxonomy shared by the session driver, the report emitter and the
//! orchestration facade.
//!
//! Every fatal failure maps to exactly one [`ErrorKind`]; none of them is
//! retried inside this crate.

use std::fmt;
use std::time::Duration;

/// Classification of a run failure.
///
/// `EmissionDegraded` is the only non-fatal kind: it never changes the
/// success/failure classification of the session itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigurationInvalid,
    DependencyMissing,
    ProcessFailure,
    Timeout,
    Cancelled,
    EmissionDegraded,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationInvalid => "ConfigurationInvalid",
            Self::DependencyMissing => "DependencyMissing",
            Self::ProcessFailure => "ProcessFailure",
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::EmissionDegraded => "EmissionDegraded",
        }
    }

    /// Whether a run that hit this kind should exit with a failure status.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::EmissionDegraded)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal errors raised while validating configuration or driving a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("agent runtime not available: {0}")]
    DependencyMissing(String),

    #[error("agent process failed: {0}")]
    ProcessFailure(String),

    #[error("no agent activity for {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("session cancelled")]
    Cancelled,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigurationInvalid(_) => ErrorKind::ConfigurationInvalid,
            Self::DependencyMissing(_) => ErrorKind::DependencyMissing,
            Self::ProcessFailure(_) => ErrorKind::ProcessFailure,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigurationInvalid(msg.into())
    }

    pub fn process(msg: impl Into<String>) -> Self {
        Self::ProcessFailure(msg.into())
    }
}
