//! Event classification: raw agent messages to semantic activity records.
//!
//! [`classify`] is pure and total. A single assistant turn can carry several
//! content blocks, so one message yields one or more records; a message that
//! contributes nothing recognisable still yields a
//! [`LifecycleEvent::Unknown`] record so no event disappears silently.

use serde_json::Value;

use crate::config::Capability;
use crate::harness::message::{
    AgentMessage, ContentBlock, ResultMessage, TurnContent, tool_result_text,
};

/// Preview length for commands and reasoning text in live lines.
pub const PREVIEW_CHARS: usize = 100;

/// One classified unit of agent activity.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityRecord {
    ToolInvocation {
        name: String,
        /// `None` for tools outside the known capability set.
        capability: Option<Capability>,
        input: Value,
    },
    ToolResult {
        is_error: bool,
        bytes: usize,
        lines: usize,
    },
    Reasoning {
        text: String,
        /// Extended-thinking block rather than visible text.
        thinking: bool,
    },
    Lifecycle(LifecycleEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Started {
        session_id: Option<String>,
        model: Option<String>,
    },
    System {
        subtype: Option<String>,
    },
    Finished(Completion),
    Failed {
        message: String,
    },
    Unknown {
        kind: String,
    },
}

/// Metadata from the agent's terminal message. Every field is optional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub is_error: bool,
    pub subtype: Option<String>,
    pub result: Option<String>,
    pub cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub num_turns: Option<u64>,
    pub session_id: Option<String>,
}

impl From<&ResultMessage> for Completion {
    fn from(m: &ResultMessage) -> Self {
        Self {
            is_error: m.is_error,
            subtype: m.subtype.clone(),
            result: m.result.clone(),
            cost_usd: m.total_cost_usd,
            duration_ms: m.duration_ms,
            num_turns: m.num_turns,
            session_id: m.session_id.clone(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Assistant,
    User,
}

/// Classify one agent message. Always returns at least one record.
pub fn classify(message: &AgentMessage) -> Vec<ActivityRecord> {
    let mut records = match message {
        AgentMessage::System(sys) => {
            let event = if sys.subtype.as_deref() == Some("init") {
                LifecycleEvent::Started {
                    session_id: sys.session_id.clone(),
                    model: sys.model.clone(),
                }
            } else {
                LifecycleEvent::System {
                    subtype: sys.subtype.clone(),
                }
            };
            vec![ActivityRecord::Lifecycle(event)]
        }
        AgentMessage::Assistant(turn) => classify_turn(&turn.message.content, Role::Assistant),
        AgentMessage::User(turn) => classify_turn(&turn.message.content, Role::User),
        AgentMessage::Result(result) => vec![ActivityRecord::Lifecycle(LifecycleEvent::Finished(
            Completion::from(result),
        ))],
        AgentMessage::Error(err) => vec![ActivityRecord::Lifecycle(LifecycleEvent::Failed {
            message: err.description(),
        })],
        AgentMessage::Unknown { kind } => vec![unknown(kind)],
    };

    if records.is_empty() {
        records.push(unknown("empty_turn"));
    }
    records
}

fn unknown(kind: &str) -> ActivityRecord {
    ActivityRecord::Lifecycle(LifecycleEvent::Unknown {
        kind: kind.to_string(),
    })
}

fn classify_turn(content: &TurnContent, role: Role) -> Vec<ActivityRecord> {
    match content {
        TurnContent::Text(_) => vec![unknown("user_text")],
        TurnContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|b| classify_block(b, role))
            .collect(),
    }
}

fn classify_block(block: &ContentBlock, role: Role) -> Option<ActivityRecord> {
    match block {
        ContentBlock::Text { text } if text.trim().is_empty() => None,
        ContentBlock::Text { text } => Some(match role {
            Role::Assistant => ActivityRecord::Reasoning {
                text: text.trim().to_string(),
                thinking: false,
            },
            Role::User => unknown("user_text"),
        }),
        ContentBlock::Thinking { thinking } if thinking.trim().is_empty() => None,
        ContentBlock::Thinking { thinking } => Some(ActivityRecord::Reasoning {
            text: thinking.trim().to_string(),
            thinking: true,
        }),
        ContentBlock::ToolUse { name, input, .. } => Some(ActivityRecord::ToolInvocation {
            name: name.clone(),
            capability: Capability::from_tool_name(name),
            input: input.clone(),
        }),
        ContentBlock::ToolResult {
            content, is_error, ..
        } => {
            let text = tool_result_text(content);
            Some(ActivityRecord::ToolResult {
                is_error: is_error.unwrap_or(false),
                bytes: text.len(),
                lines: text.lines().count(),
            })
        }
        ContentBlock::Other => Some(unknown("content_block")),
    }
}

// ---------------------------------------------------------------------------
// Live progress lines
// ---------------------------------------------------------------------------

impl ActivityRecord {
    /// One human-readable progress line.
    pub fn describe(&self) -> String {
        match self {
            Self::ToolInvocation {
                name,
                capability,
                input,
            } => describe_tool(name, *capability, input),
            Self::ToolResult { is_error: true, .. } => "Tool execution failed".to_string(),
            Self::ToolResult { bytes, lines, .. } => {
                format!("Tool result: {lines} lines, {bytes} bytes")
            }
            Self::Reasoning {
                text,
                thinking: false,
            } => format!("Claude: {}", preview(text, PREVIEW_CHARS)),
            Self::Reasoning {
                text,
                thinking: true,
            } => format!("Thinking ({} chars)", text.chars().count()),
            Self::Lifecycle(event) => describe_lifecycle(event),
        }
    }
}

fn input_str<'a>(input: &'a Value, key: &str) -> &'a str {
    input.get(key).and_then(Value::as_str).unwrap_or("")
}

fn describe_tool(name: &str, capability: Option<Capability>, input: &Value) -> String {
    match capability {
        Some(Capability::ReadFile) => format!("Reading: {}", input_str(input, "file_path")),
        Some(Capability::WriteFile) => format!("Writing: {}", input_str(input, "file_path")),
        Some(Capability::Edit | Capability::MultiEdit) => {
            format!("Editing: {}", input_str(input, "file_path"))
        }
        Some(Capability::RunCommand) => {
            format!("Running: {}", preview(input_str(input, "command"), PREVIEW_CHARS))
        }
        Some(Capability::SearchContent) => {
            let path = match input_str(input, "path") {
                "" => ".",
                p => p,
            };
            format!("Searching '{}' in {path}", input_str(input, "pattern"))
        }
        Some(Capability::ListFiles) => {
            format!("Finding files: {}", input_str(input, "pattern"))
        }
        Some(Capability::TodoList) | None => format!("Using tool: {name}"),
    }
}

fn describe_lifecycle(event: &LifecycleEvent) -> String {
    match event {
        LifecycleEvent::Started { model, .. } => match model {
            Some(model) => format!("Session started (model {model})"),
            None => "Session started".to_string(),
        },
        LifecycleEvent::System { subtype } => {
            format!("System event: {}", subtype.as_deref().unwrap_or("unspecified"))
        }
        LifecycleEvent::Finished(done) => {
            let mut line = if done.is_error {
                "Agent finished with an error".to_string()
            } else {
                "Agent finished".to_string()
            };
            if let Some(turns) = done.num_turns {
                line.push_str(&format!(", {turns} turns"));
            }
            if let Some(cost) = done.cost_usd {
                line.push_str(&format!(", ${cost:.4}"));
            }
            line
        }
        LifecycleEvent::Failed { message } => format!("Agent error: {message}"),
        LifecycleEvent::Unknown { kind } => format!("Unrecognised agent message: {kind}"),
    }
}

/// Single-line, char-safe preview with an ellipsis when shortened.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}
