//! Claude Code runtime adapter.
//!
//! Spawns `claude -p --output-format stream-json` in the workspace, writes
//! the task prompt to its stdin and parses each stdout line into an
//! [`AgentMessage`].

use std::collections::{HashSet, VecDeque};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, info, warn};

use super::locate;
use super::message::AgentMessage;
use super::trait_def::{AgentRuntime, AgentSession, MessageStream};
use crate::config::SessionConfig;
use crate::error::SessionError;

/// How long a still-running agent gets between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Number of stderr lines kept for failure messages.
const STDERR_TAIL_LINES: usize = 20;

/// Pids of agent processes that have not been reaped yet. Each one leads
/// its own process group.
type LiveProcesses = Arc<Mutex<HashSet<u32>>>;

/// Runtime adapter for [Claude Code](https://docs.anthropic.com/en/docs/claude-code).
///
/// Clones share the set of live agent processes, so a clone held by a signal
/// handler can [`kill_all`](Self::kill_all) sessions opened through another.
#[derive(Debug, Clone)]
pub struct ClaudeCodeAdapter {
    grace_period: Duration,
    live: LiveProcesses,
}

impl ClaudeCodeAdapter {
    pub fn new() -> Self {
        Self::with_grace_period(DEFAULT_GRACE_PERIOD)
    }

    pub fn with_grace_period(grace_period: Duration) -> Self {
        Self {
            grace_period,
            live: LiveProcesses::default(),
        }
    }

    /// SIGKILL the process group of every agent still running. For exits
    /// that cannot await [`AgentSession::shutdown`].
    pub fn kill_all(&self) {
        let pids: Vec<u32> = self
            .live
            .lock()
            .map(|live| live.iter().copied().collect())
            .unwrap_or_default();
        for pid in pids {
            warn!(pid, "force-killing agent process group");
            #[cfg(unix)]
            {
                signal_group(pid, libc::SIGKILL);
            }
        }
    }
}

impl Default for ClaudeCodeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Command-line arguments for a print-mode, stream-json session.
pub fn build_args(config: &SessionConfig) -> Vec<OsString> {
    vec![
        "-p".into(),
        "--output-format".into(),
        "stream-json".into(),
        "--verbose".into(),
        "--allowedTools".into(),
        config.allowed_tools().into(),
        "--permission-mode".into(),
        config.permission_mode.as_str().into(),
        "--add-dir".into(),
        config.workspace.clone().into_os_string(),
        "--system-prompt".into(),
        config.system_prompt.clone().into(),
    ]
}

/// `PATH` for the child: existing search dirs first, then the inherited
/// `PATH`, so the CLI's own interpreter is found the same way.
fn child_path(search_paths: &[PathBuf]) -> Option<OsString> {
    let inherited = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect::<Vec<_>>())
        .unwrap_or_default();
    let dirs = search_paths
        .iter()
        .filter(|p| p.is_dir())
        .cloned()
        .chain(inherited);
    std::env::join_paths(dirs).ok()
}

#[async_trait]
impl AgentRuntime for ClaudeCodeAdapter {
    fn name(&self) -> &str {
        "claude-code"
    }

    async fn connect(&self, config: &SessionConfig) -> Result<Box<dyn AgentSession>, SessionError> {
        let binary = locate::find_binary(&config.agent_binary, &config.search_paths)
            .ok_or_else(|| {
                SessionError::DependencyMissing(format!(
                    "agent CLI `{}` not found (searched {} and PATH)",
                    config.agent_binary,
                    display_dirs(&config.search_paths)
                ))
            })?;

        let mut cmd = Command::new(&binary);
        cmd.args(build_args(config))
            .current_dir(&config.workspace)
            .env("ANTHROPIC_API_KEY", config.api_key.expose())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(path) = child_path(&config.search_paths) {
            cmd.env("PATH", path);
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                SessionError::DependencyMissing(format!(
                    "failed to start agent CLI at {}: {e}",
                    binary.display()
                ))
            }
            _ => SessionError::process(format!(
                "failed to start agent CLI at {}: {e}",
                binary.display()
            )),
        })?;

        let pid = child.id();
        info!(pid = ?pid, binary = %binary.display(), "agent process started");
        if let (Some(pid), Ok(mut live)) = (pid, self.live.lock()) {
            live.insert(pid);
        }

        let stderr_tail = Arc::new(Mutex::new(VecDeque::new()));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_stderr(stderr, Arc::clone(&stderr_tail))));

        Ok(Box::new(ClaudeSession {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            child: Some(child),
            stderr_tail,
            stderr_task,
            pid,
            grace_period: self.grace_period,
            live: Arc::clone(&self.live),
        }))
    }
}

fn display_dirs(dirs: &[PathBuf]) -> String {
    if dirs.is_empty() {
        return "no extra directories".to_string();
    }
    dirs.iter()
        .map(|d| d.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

async fn drain_stderr(stderr: ChildStderr, tail: Arc<Mutex<VecDeque<String>>>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(line = %line, "agent stderr");
        if let Ok(mut tail) = tail.lock() {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }
}

/// A running `claude` process.
struct ClaudeSession {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    stderr_task: Option<JoinHandle<()>>,
    /// Recorded at spawn; `Child::id` is gone once the child is reaped.
    pid: Option<u32>,
    grace_period: Duration,
    live: LiveProcesses,
}

fn exit_failure(status: ExitStatus, tail: &Mutex<VecDeque<String>>) -> SessionError {
    let last = tail
        .lock()
        .ok()
        .and_then(|t| t.iter().rev().find(|l| !l.trim().is_empty()).cloned());
    match last {
        Some(line) => SessionError::process(format!("agent exited with {status}: {line}")),
        None => SessionError::process(format!("agent exited with {status}")),
    }
}

#[async_trait]
impl AgentSession for ClaudeSession {
    async fn send(&mut self, prompt: &str) -> Result<(), SessionError> {
        let mut stdin = self
            .stdin
            .take()
            .ok_or_else(|| SessionError::process("task prompt was already sent"))?;
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| SessionError::process(format!("failed to write prompt to agent: {e}")))?;
        stdin
            .shutdown()
            .await
            .map_err(|e| SessionError::process(format!("failed to close agent stdin: {e}")))?;
        debug!(bytes = prompt.len(), "task prompt sent");
        Ok(())
    }

    fn messages(&mut self) -> MessageStream<'_> {
        let stdout = self.stdout.take();
        let stderr_task = self.stderr_task.take();
        let child = self.child.as_mut();
        let tail = Arc::clone(&self.stderr_tail);

        Box::pin(async_stream::stream! {
            let Some(stdout) = stdout else {
                yield Err(SessionError::process("agent output already consumed"));
                return;
            };

            let mut lines = LinesStream::new(BufReader::new(stdout).lines());
            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        let message = AgentMessage::parse_line(trimmed);
                        let terminal = message.is_terminal();
                        yield Ok(message);
                        if terminal {
                            return;
                        }
                    }
                    Err(e) => {
                        yield Err(SessionError::process(format!("error reading agent output: {e}")));
                        return;
                    }
                }
            }

            // stdout closed without a terminal message: the exit status decides.
            let Some(child) = child else {
                return;
            };
            match child.wait().await {
                Ok(status) if status.success() => {
                    debug!("agent output closed with a clean exit");
                }
                Ok(status) => {
                    if let Some(task) = stderr_task {
                        let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
                    }
                    yield Err(exit_failure(status, &tail));
                }
                Err(e) => {
                    yield Err(SessionError::process(format!("failed to wait for agent: {e}")));
                }
            }
        })
    }

    async fn shutdown(&mut self) {
        self.stdin = None;
        let Some(child) = self.child.take() else {
            return;
        };
        stop(child, self.pid, self.grace_period, Arc::clone(&self.live)).await;
    }

    fn close(&mut self) {
        self.stdin = None;
        let Some(mut child) = self.child.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(stop(child, self.pid, self.grace_period, Arc::clone(&self.live)));
            }
            Err(_) => {
                #[cfg(unix)]
                {
                    if let Some(pid) = self.pid {
                        signal_group(pid, libc::SIGKILL);
                    }
                }
                let _ = child.start_kill();
                forget(&self.live, self.pid);
            }
        }
    }
}

/// SIGTERM the agent's process group, SIGKILL the agent if it outlives the
/// grace period, then SIGKILL whatever is left of the group.
async fn stop(mut child: Child, pid: Option<u32>, grace_period: Duration, live: LiveProcesses) {
    let mut signalled = false;
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            signalled = signal_group(pid, libc::SIGTERM);
        }
    }
    if !signalled {
        let _ = child.start_kill();
    }

    match tokio::time::timeout(grace_period, child.wait()).await {
        Ok(Ok(status)) => debug!(pid = ?pid, %status, "agent process stopped"),
        _ => {
            debug!(pid = ?pid, "agent ignored SIGTERM, sending SIGKILL");
            let _ = child.kill().await;
        }
    }

    // Tool commands the agent started share its group.
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            signal_group(pid, libc::SIGKILL);
        }
    }
    forget(&live, pid);
}

fn forget(live: &LiveProcesses, pid: Option<u32>) {
    if let (Some(pid), Ok(mut live)) = (pid, live.lock()) {
        live.remove(&pid);
    }
}

/// Send `signal` to the process group led by `pid`. False if no process in
/// the group could be signalled.
#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) -> bool {
    let Ok(pgid) = i32::try_from(pid) else {
        return false;
    };
    // SAFETY: the agent was spawned with process_group(0), so its pid is
    // the id of a group that only contains the agent and its descendants.
    unsafe { libc::kill(-pgid, signal) == 0 }
}
