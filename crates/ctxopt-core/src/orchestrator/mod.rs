//! Orchestration facade: validate, run one session, emit the report, map the
//! result to an exit status.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{RawInputs, SessionConfig};
use crate::console;
use crate::error::ErrorKind;
use crate::harness::AgentRuntime;
use crate::report::{EmitResult, ReportEmitter};
use crate::session::{SessionDriver, SessionOutcome};

/// Process exit status. No other codes are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    Failure = 1,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Only fatal kinds fail the run; a degraded report does not.
    pub fn from_error(kind: Option<ErrorKind>) -> Self {
        if kind.is_some_and(|k| k.is_fatal()) {
            Self::Failure
        } else {
            Self::Success
        }
    }
}

/// What one invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub status: ExitStatus,
    /// Fatal error kind, if the run failed.
    pub error_kind: Option<ErrorKind>,
    /// `None` when no session was attempted.
    pub emission: Option<EmitResult>,
    pub outcome: Option<SessionOutcome>,
}

/// Run one analysis end to end.
///
/// Configuration problems stop the run before any session is attempted.
/// Every later failure still produces a (partial) report. Report emission
/// problems are printed but never change the exit status.
pub async fn run(
    inputs: RawInputs,
    runtime: &dyn AgentRuntime,
    cancel: CancellationToken,
) -> RunResult {
    let config = match SessionConfig::resolve(inputs) {
        Ok(config) => config,
        Err(e) => {
            console::error(format_args!("{}: {e}", e.kind()));
            return RunResult {
                status: ExitStatus::from_error(Some(e.kind())),
                error_kind: Some(e.kind()),
                emission: None,
                outcome: None,
            };
        }
    };

    console::line(format_args!(
        "Analysing {} for {}",
        config.workspace.display(),
        config.context_file
    ));
    match config.existing_context_file() {
        Some(path) => console::line(format_args!(
            "Existing {} found, recommendations will build on it",
            path.display()
        )),
        None => console::line(format_args!(
            "No existing {} found, recommendations will propose a new one",
            config.context_file
        )),
    }
    console::rule();

    let outcome = SessionDriver::new(runtime, &config)
        .with_cancellation(cancel)
        .run()
        .await;

    console::rule();
    for line in outcome.summary().render_statistics().lines() {
        console::line(line);
    }

    let emission = ReportEmitter::for_config(&config).emit(&outcome, &config);
    if let EmitResult::Degraded { reason } = &emission {
        console::error(format_args!("{}: {reason}", ErrorKind::EmissionDegraded));
    }

    let error_kind = outcome.error().map(|e| {
        console::error(format_args!("{}: {e}", e.kind()));
        e.kind()
    });
    let status = ExitStatus::from_error(error_kind);
    if status == ExitStatus::Success {
        console::line("Analysis completed successfully");
    }
    info!(status = status.code(), "run finished");

    RunResult {
        status,
        error_kind,
        emission: Some(emission),
        outcome: Some(outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_zero_or_one() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Failure.code(), 1);
    }

    #[test]
    fn only_fatal_kinds_fail_the_run() {
        assert_eq!(ExitStatus::from_error(None), ExitStatus::Success);
        assert_eq!(
            ExitStatus::from_error(Some(ErrorKind::EmissionDegraded)),
            ExitStatus::Success
        );
        for kind in [
            ErrorKind::ConfigurationInvalid,
            ErrorKind::DependencyMissing,
            ErrorKind::Timeout,
            ErrorKind::Cancelled,
            ErrorKind::ProcessFailure,
        ] {
            assert_eq!(ExitStatus::from_error(Some(kind)), ExitStatus::Failure, "{kind}");
        }
    }
}
