//! Core of `ctxopt`: drives one Claude Code analysis session over a
//! workspace and turns its activity into a context-file recommendation
//! report.

pub mod activity;
pub mod config;
pub mod console;
pub mod error;
pub mod harness;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod session;

pub use error::{ErrorKind, SessionError};
pub use orchestrator::{ExitStatus, RunResult, run};
pub use session::{SessionDriver, SessionOutcome};
