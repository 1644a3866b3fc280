//! Session driver: runs one analysis session end to end.
//!
//! Sequence: connect, send the task prompt once, consume the message stream
//! (classify every message, fold it into the progress accumulator, print a
//! live line), then release the session. The only suspension point is the
//! wait for the next message, raced against the idle timer and the
//! cancellation token. The timer restarts for every message received.
//!
//! The session handle lives in a [`SessionGuard`]. On every normal exit
//! path the driver awaits [`SessionGuard::release`], which waits for the
//! agent to be gone. If the driver unwinds instead, the guard's `Drop` falls
//! back to the non-blocking [`AgentSession::close`].

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::activity::{ActivityRecord, LifecycleEvent, classify};
use crate::config::SessionConfig;
use crate::console;
use crate::error::SessionError;
use crate::harness::message::AgentMessage;
use crate::harness::{AgentRuntime, AgentSession};
use crate::progress::{DEFAULT_LOG_CAPACITY, ProgressAccumulator, ProgressSummary};

/// Terminal result of one session. Produced exactly once per run.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Success {
        /// The agent's report text (empty if it produced none).
        report: String,
        summary: ProgressSummary,
    },
    Failure {
        error: SessionError,
        /// Whatever report text the agent produced before failing.
        report: Option<String>,
        summary: ProgressSummary,
    },
}

impl SessionOutcome {
    pub fn summary(&self) -> &ProgressSummary {
        match self {
            Self::Success { summary, .. } | Self::Failure { summary, .. } => summary,
        }
    }

    pub fn report(&self) -> Option<&str> {
        match self {
            Self::Success { report, .. } => Some(report.as_str()),
            Self::Failure { report, .. } => report.as_deref(),
        }
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Owns an open session and closes it when dropped unless it was released.
pub struct SessionGuard {
    session: Box<dyn AgentSession>,
    released: bool,
}

impl SessionGuard {
    pub fn new(session: Box<dyn AgentSession>) -> Self {
        Self {
            session,
            released: false,
        }
    }

    pub fn session(&mut self) -> &mut dyn AgentSession {
        self.session.as_mut()
    }

    /// Shut the session down and wait for it. If this future is dropped
    /// part way, `Drop` still closes the session.
    pub async fn release(mut self) {
        self.session.shutdown().await;
        self.released = true;
        debug!("agent session shut down");
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.released {
            self.session.close();
            debug!("agent session closed");
        }
    }
}

fn print_live(line: &str) {
    console::line(line);
}

/// Tracks the text that becomes the report.
#[derive(Debug, Default)]
struct ReportDraft {
    last_text: Option<String>,
    final_result: Option<String>,
}

impl ReportDraft {
    fn observe(&mut self, record: &ActivityRecord) {
        match record {
            ActivityRecord::Reasoning {
                text,
                thinking: false,
            } => self.last_text = Some(text.clone()),
            ActivityRecord::Lifecycle(LifecycleEvent::Finished(done)) if !done.is_error => {
                if let Some(result) = done.result.as_ref().filter(|r| !r.trim().is_empty()) {
                    self.final_result = Some(result.clone());
                }
            }
            _ => {}
        }
    }

    fn into_text(self) -> Option<String> {
        self.final_result.or(self.last_text)
    }
}

/// Drives a single session against an [`AgentRuntime`].
pub struct SessionDriver<'a> {
    runtime: &'a dyn AgentRuntime,
    config: &'a SessionConfig,
    cancel: CancellationToken,
    live: fn(&str),
    log_capacity: usize,
}

impl<'a> SessionDriver<'a> {
    pub fn new(runtime: &'a dyn AgentRuntime, config: &'a SessionConfig) -> Self {
        Self {
            runtime,
            config,
            cancel: CancellationToken::new(),
            live: print_live,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }

    /// Use `cancel` to request early termination from outside.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Where the per-record live lines go. Defaults to the console.
    pub fn with_live_output(mut self, live: fn(&str)) -> Self {
        self.live = live;
        self
    }

    /// How many display lines the progress log keeps. Zero keeps none; live
    /// output is unaffected.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Run the session to completion. Never panics on agent misbehaviour and
    /// never retries.
    pub async fn run(&self) -> SessionOutcome {
        let mut progress = ProgressAccumulator::with_capacity(self.log_capacity);
        let mut draft = ReportDraft::default();

        info!(
            runtime = self.runtime.name(),
            workspace = %self.config.workspace.display(),
            "connecting to agent"
        );

        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SessionError::Cancelled),
            result = self.runtime.connect(self.config) => result,
        };

        let result = match connected {
            Ok(session) => {
                let mut guard = SessionGuard::new(session);
                let result = self.drive(guard.session(), &mut progress, &mut draft).await;
                guard.release().await;
                result
            }
            Err(e) => Err(e),
        };

        let summary = progress.snapshot();
        match result {
            Ok(()) => {
                info!(
                    tool_invocations = summary.counters.tool_invocations,
                    elapsed_secs = summary.elapsed.as_secs_f64(),
                    "agent session completed"
                );
                SessionOutcome::Success {
                    report: draft.into_text().unwrap_or_default(),
                    summary,
                }
            }
            Err(error) => {
                warn!(kind = %error.kind(), error = %error, "agent session failed");
                SessionOutcome::Failure {
                    error,
                    report: draft.into_text(),
                    summary,
                }
            }
        }
    }

    async fn drive(
        &self,
        session: &mut dyn AgentSession,
        progress: &mut ProgressAccumulator,
        draft: &mut ReportDraft,
    ) -> Result<(), SessionError> {
        let idle = self.config.idle_timeout;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),
            _ = tokio::time::sleep(idle) => return Err(SessionError::Timeout(idle)),
            sent = session.send(&self.config.task_prompt) => sent?,
        }

        let mut stream = session.messages();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),
                _ = tokio::time::sleep(idle) => return Err(SessionError::Timeout(idle)),
                next = stream.next() => next,
            };

            let message = match next {
                None => {
                    debug!("agent stream closed");
                    return Ok(());
                }
                Some(Err(e)) => return Err(e),
                Some(Ok(message)) => message,
            };

            for record in classify(&message) {
                if let ActivityRecord::ToolInvocation { name, .. } = &record {
                    debug!(tool = %name, "agent invoked a tool");
                }
                progress.record(&record);
                (self.live)(&record.describe());
                draft.observe(&record);
            }

            match &message {
                AgentMessage::Result(result) if result.is_error => {
                    let detail = result
                        .result
                        .clone()
                        .or_else(|| result.subtype.clone())
                        .unwrap_or_else(|| "no details".to_string());
                    return Err(SessionError::process(format!(
                        "agent reported an error: {detail}"
                    )));
                }
                AgentMessage::Result(_) => return Ok(()),
                AgentMessage::Error(err) => {
                    return Err(SessionError::process(err.description()));
                }
                _ => {}
            }
        }
    }
}
