//! Report emission.
//!
//! The destination is a [`ReportSink`] picked once from configuration
//! ([`select_sink`]). Emission never fails the run: when the sink cannot be
//! written the document is dumped to the console and the result is
//! [`EmitResult::Degraded`].

pub mod render;
pub mod sink;

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::console;
use crate::session::SessionOutcome;

pub use render::{fence_for, render_document, split_report};
pub use sink::{LocalFileSink, ReportSink, StepSummarySink, select_sink};

/// Where the report went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitResult {
    Written { location: PathBuf },
    /// The sink failed; the document was printed to the console instead.
    Degraded { reason: String },
}

impl EmitResult {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

pub struct ReportEmitter {
    sink: Box<dyn ReportSink>,
}

impl ReportEmitter {
    pub fn new(sink: Box<dyn ReportSink>) -> Self {
        Self { sink }
    }

    /// Emitter for the destination `config` selects.
    pub fn for_config(config: &SessionConfig) -> Self {
        Self::new(select_sink(config))
    }

    pub fn emit(&self, outcome: &SessionOutcome, config: &SessionConfig) -> EmitResult {
        let document = render_document(outcome, config.context_file);
        match self.sink.write(&document) {
            Ok(location) => {
                info!(location = %location.display(), "report written");
                console::line(format_args!("Report written to {}", location.display()));
                EmitResult::Written { location }
            }
            Err(e) => {
                let reason = format!("could not write report to {}: {e}", self.sink.describe());
                warn!(error = %e, sink = %self.sink.describe(), "report emission degraded");
                console::error(&reason);
                console::line("Report follows:");
                console::rule();
                println!("{document}");
                console::rule();
                EmitResult::Degraded { reason }
            }
        }
    }
}
