//! Progress accumulation for one session.
//!
//! [`ProgressAccumulator`] is a plain state container: it folds
//! [`ActivityRecord`]s into counters and a bounded log, never fails and does
//! no I/O. [`ProgressAccumulator::snapshot`] hands out an owned
//! [`ProgressSummary`] that later mutation cannot affect.

use std::collections::{BTreeSet, VecDeque};
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use crate::activity::{ActivityRecord, Completion, LifecycleEvent};
use crate::config::Capability;

/// Lines kept in the rolling display log.
pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// Monotonic activity counters. Every field only ever increases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressCounters {
    pub files_read: u64,
    pub files_written: u64,
    pub edits_performed: u64,
    pub commands_executed: u64,
    pub searches_performed: u64,
    pub tool_invocations: u64,
    pub tool_results: u64,
    pub tool_failures: u64,
    pub reasoning_blocks: u64,
    pub lifecycle_events: u64,
    /// Records this crate could not classify.
    pub other_activity: u64,
}

/// Immutable copy of a session's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub counters: ProgressCounters,
    pub elapsed: Duration,
    pub log: Vec<String>,
    pub tools_used: BTreeSet<String>,
    pub session_id: Option<String>,
    pub model: Option<String>,
    /// Terminal metadata, when the agent sent a terminal message.
    pub completion: Option<Completion>,
}

impl ProgressSummary {
    /// Statistics block used on the console and in reports.
    pub fn render_statistics(&self) -> String {
        let c = &self.counters;
        let mut out = format!(
            "Analysis ran for {:.1}s\n\
             - Files read: {}\n\
             - Files written: {}\n\
             - Edits performed: {}\n\
             - Commands run: {}\n\
             - Searches performed: {}\n\
             - Tool invocations: {} ({} failed results)\n\
             - Reasoning blocks: {}",
            self.elapsed.as_secs_f64(),
            c.files_read,
            c.files_written,
            c.edits_performed,
            c.commands_executed,
            c.searches_performed,
            c.tool_invocations,
            c.tool_failures,
            c.reasoning_blocks,
        );
        if c.other_activity > 0 {
            let _ = write!(out, "\n- Unrecognised messages: {}", c.other_activity);
        }
        if !self.tools_used.is_empty() {
            let tools: Vec<&str> = self.tools_used.iter().map(String::as_str).collect();
            let _ = write!(out, "\n- Tools used: {}", tools.join(", "));
        }
        if let Some(done) = &self.completion {
            if let Some(turns) = done.num_turns {
                let _ = write!(out, "\n- Agent turns: {turns}");
            }
            if let Some(ms) = done.duration_ms {
                let _ = write!(out, "\n- Agent-reported duration: {:.1}s", ms as f64 / 1000.0);
            }
            if let Some(cost) = done.cost_usd {
                let _ = write!(out, "\n- Agent-reported cost: ${cost:.4}");
            }
        }
        out
    }
}

/// Mutable accumulator owned by the session driver.
#[derive(Debug)]
pub struct ProgressAccumulator {
    counters: ProgressCounters,
    started: Instant,
    log: VecDeque<String>,
    capacity: usize,
    tools_used: BTreeSet<String>,
    session_id: Option<String>,
    model: Option<String>,
    completion: Option<Completion>,
}

impl Default for ProgressAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressAccumulator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            counters: ProgressCounters::default(),
            started: Instant::now(),
            log: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity,
            tools_used: BTreeSet::new(),
            session_id: None,
            model: None,
            completion: None,
        }
    }

    /// Fold one record into the counters and append its display line.
    pub fn record(&mut self, record: &ActivityRecord) {
        let c = &mut self.counters;
        match record {
            ActivityRecord::ToolInvocation {
                name, capability, ..
            } => {
                c.tool_invocations += 1;
                match capability {
                    Some(Capability::ReadFile) => c.files_read += 1,
                    Some(Capability::WriteFile) => c.files_written += 1,
                    Some(Capability::Edit | Capability::MultiEdit) => c.edits_performed += 1,
                    Some(Capability::RunCommand) => c.commands_executed += 1,
                    Some(Capability::SearchContent | Capability::ListFiles) => {
                        c.searches_performed += 1
                    }
                    Some(Capability::TodoList) | None => {}
                }
                self.tools_used.insert(name.clone());
            }
            ActivityRecord::ToolResult { is_error, .. } => {
                c.tool_results += 1;
                if *is_error {
                    c.tool_failures += 1;
                }
            }
            ActivityRecord::Reasoning { .. } => c.reasoning_blocks += 1,
            ActivityRecord::Lifecycle(LifecycleEvent::Unknown { .. }) => c.other_activity += 1,
            ActivityRecord::Lifecycle(event) => {
                c.lifecycle_events += 1;
                match event {
                    LifecycleEvent::Started { session_id, model } => {
                        self.session_id = session_id.clone().or(self.session_id.take());
                        self.model = model.clone().or(self.model.take());
                    }
                    LifecycleEvent::Finished(done) => {
                        if self.session_id.is_none() {
                            self.session_id = done.session_id.clone();
                        }
                        self.completion = Some(done.clone());
                    }
                    _ => {}
                }
            }
        }
        self.push_line(record.describe());
    }

    fn push_line(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.log.len() == self.capacity {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    pub fn counters(&self) -> &ProgressCounters {
        &self.counters
    }

    pub fn snapshot(&self) -> ProgressSummary {
        ProgressSummary {
            counters: self.counters,
            elapsed: self.started.elapsed(),
            log: self.log.iter().cloned().collect(),
            tools_used: self.tools_used.clone(),
            session_id: self.session_id.clone(),
            model: self.model.clone(),
            completion: self.completion.clone(),
        }
    }
}
