//! Shared test utilities for ctxopt integration tests.
//!
//! Provides a scripted [`FakeRuntime`] that stands in for the agent CLI, JSON
//! builders for the agent's stream messages, and a helper that writes a fake
//! `claude` executable for subprocess tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use ctxopt_core::config::SessionConfig;
use ctxopt_core::error::SessionError;
use ctxopt_core::harness::{AgentMessage, AgentRuntime, AgentSession, MessageStream};

/// One step of a scripted agent stream.
#[derive(Debug, Clone)]
pub enum FakeStep {
    Message(AgentMessage),
    /// The transport fails with this error.
    Fail(SessionError),
    Delay(Duration),
    /// Stop producing anything, forever.
    Hang,
}

impl From<Value> for FakeStep {
    fn from(value: Value) -> Self {
        Self::Message(AgentMessage::from_value(value))
    }
}

/// Counters shared between a [`FakeRuntime`] and the sessions it opens.
#[derive(Debug, Clone, Default)]
pub struct SessionTally {
    connects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl SessionTally {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

/// An [`AgentRuntime`] that replays a fixed script.
pub struct FakeRuntime {
    script: Mutex<Option<Vec<FakeStep>>>,
    connect_error: Option<SessionError>,
    tally: SessionTally,
}

impl FakeRuntime {
    pub fn new(script: Vec<FakeStep>) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            connect_error: None,
            tally: SessionTally::default(),
        }
    }

    /// A runtime whose `connect` always fails with `error`.
    pub fn unavailable(error: SessionError) -> Self {
        Self {
            connect_error: Some(error),
            ..Self::new(Vec::new())
        }
    }

    pub fn tally(&self) -> SessionTally {
        self.tally.clone()
    }
}

#[async_trait]
impl AgentRuntime for FakeRuntime {
    fn name(&self) -> &str {
        "fake"
    }

    async fn connect(&self, _config: &SessionConfig) -> Result<Box<dyn AgentSession>, SessionError> {
        self.tally.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.connect_error {
            return Err(e.clone());
        }
        let script = self.script.lock().unwrap().take().unwrap_or_default();
        Ok(Box::new(FakeSession {
            steps: script.into(),
            tally: self.tally.clone(),
        }))
    }
}

struct FakeSession {
    steps: VecDeque<FakeStep>,
    tally: SessionTally,
}

#[async_trait]
impl AgentSession for FakeSession {
    async fn send(&mut self, prompt: &str) -> Result<(), SessionError> {
        self.tally.prompts.lock().unwrap().push(prompt.to_string());
        Ok(())
    }

    fn messages(&mut self) -> MessageStream<'_> {
        let steps = std::mem::take(&mut self.steps);
        Box::pin(futures::stream::unfold(steps, |mut steps| async move {
            loop {
                match steps.pop_front()? {
                    FakeStep::Message(m) => return Some((Ok(m), steps)),
                    FakeStep::Fail(e) => return Some((Err(e), steps)),
                    FakeStep::Delay(d) => tokio::time::sleep(d).await,
                    FakeStep::Hang => futures::future::pending::<()>().await,
                }
            }
        }))
    }

    fn close(&mut self) {
        self.tally.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// -----------------------------------------------------------------------
// Message builders (stream-json shapes)
// -----------------------------------------------------------------------

pub fn system_init(session_id: &str) -> Value {
    json!({
        "type": "system",
        "subtype": "init",
        "session_id": session_id,
        "model": "claude-test"
    })
}

pub fn tool_use(id: &str, name: &str, input: Value) -> Value {
    json!({
        "type": "assistant",
        "message": {
            "content": [{ "type": "tool_use", "id": id, "name": name, "input": input }]
        }
    })
}

pub fn tool_result(tool_use_id: &str, content: &str, is_error: bool) -> Value {
    json!({
        "type": "user",
        "message": {
            "content": [{
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
                "is_error": is_error
            }]
        }
    })
}

pub fn text(text: &str) -> Value {
    json!({
        "type": "assistant",
        "message": { "content": [{ "type": "text", "text": text }] }
    })
}

pub fn result_success(result: &str) -> Value {
    json!({
        "type": "result",
        "subtype": "success",
        "is_error": false,
        "result": result,
        "total_cost_usd": 0.0123,
        "duration_ms": 4200,
        "num_turns": 4,
        "session_id": "sess-1"
    })
}

/// Write an executable shell script named `claude` into `dir`.
#[cfg(unix)]
pub fn write_fake_claude(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("claude");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A fake `claude` that drains stdin and prints `lines` to stdout.
#[cfg(unix)]
pub fn write_streaming_claude(dir: &Path, lines: &[Value]) -> PathBuf {
    let mut body = String::from("cat > /dev/null\n");
    for line in lines {
        let escaped = line.to_string().replace('\'', r"'\''");
        body.push_str(&format!("printf '%s\\n' '{escaped}'\n"));
    }
    write_fake_claude(dir, &body)
}
