//! `ctxopt run`: analyse a workspace and emit the recommendation report.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Args;
use tokio_util::sync::CancellationToken;

use ctxopt_core::console;
use ctxopt_core::harness::ClaudeCodeAdapter;
use ctxopt_core::{ErrorKind, ExitStatus};

use crate::config;

#[derive(Debug, Default, Clone, Args)]
pub struct RunArgs {
    /// Repository to analyse (overrides WORKSPACE_DIR; default: current dir)
    #[arg(long)]
    pub workspace: Option<PathBuf>,
    /// Context document to recommend: CLAUDE.md or AGENTS.md (overrides CONTEXT_FILE)
    #[arg(long)]
    pub context_file: Option<String>,
    /// Claude Code CLI name or path (overrides CTXOPT_CLAUDE_BINARY)
    #[arg(long)]
    pub claude_binary: Option<String>,
    /// Seconds without agent activity before the run times out
    #[arg(long, value_name = "SECS")]
    pub idle_timeout: Option<u64>,
    /// Directory with system-prompt.txt and optimizer-prompt.txt
    #[arg(long)]
    pub prompts_dir: Option<PathBuf>,
}

/// Run one analysis and return the process exit status.
pub async fn run_analysis(args: &RunArgs) -> ExitStatus {
    let inputs = match config::load_config().and_then(|file| config::resolve_inputs(args, file.as_ref())) {
        Ok(inputs) => inputs,
        Err(e) => {
            console::error(format_args!("{}: {e:#}", ErrorKind::ConfigurationInvalid));
            return ExitStatus::Failure;
        }
    };

    let adapter = ClaudeCodeAdapter::new();
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone(), adapter.clone());

    let result = ctxopt_core::run(inputs, &adapter, cancel).await;
    result.status
}

/// First Ctrl-C cancels the session, the second kills the agent and exits
/// immediately.
fn spawn_interrupt_handler(cancel: CancellationToken, adapter: ClaudeCodeAdapter) {
    let got_first_signal = Arc::new(AtomicBool::new(false));
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if got_first_signal.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                adapter.kill_all();
                std::process::exit(ExitStatus::Failure.code());
            }
            eprintln!("\nCancelling analysis (Ctrl+C again to force)...");
            cancel.cancel();
        }
    });
}
