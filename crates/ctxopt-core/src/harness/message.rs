//! The agent's stream-json message schema.
//!
//! The schema is open: new message and content-block types appear over time.
//! Anything this crate does not understand becomes [`AgentMessage::Unknown`]
//! (or [`ContentBlock::Other`]) instead of an error, so a run never fails
//! because of an unfamiliar line.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// One line of the agent's output stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Session lifecycle notices (`init` and friends).
    System(SystemMessage),
    /// A model turn: text, thinking and tool invocations.
    Assistant(TurnMessage),
    /// Tool results fed back to the model.
    User(TurnMessage),
    /// Terminal message carrying the final answer and run metadata.
    Result(ResultMessage),
    Error(ErrorMessage),
    /// Unrecognised or malformed line. `kind` is the `type` tag when one was
    /// present, `"malformed"` for non-JSON, `"untyped"` for JSON without one.
    #[serde(skip_deserializing)]
    Unknown { kind: String },
}

impl AgentMessage {
    /// Parse one line of output. Never fails.
    pub fn parse_line(line: &str) -> Self {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                debug!(error = %e, "agent emitted a non-JSON line");
                Self::unknown("malformed")
            }
        }
    }

    /// Interpret an already-parsed JSON value. Never fails.
    pub fn from_value(value: Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("untyped")
            .to_string();
        match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                debug!(kind = %kind, error = %e, "unrecognised agent message shape");
                Self::Unknown { kind }
            }
        }
    }

    pub fn unknown(kind: impl Into<String>) -> Self {
        Self::Unknown { kind: kind.into() }
    }

    /// Whether this message ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemMessage {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TurnMessage {
    pub message: TurnBody,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TurnBody {
    #[serde(default)]
    pub content: TurnContent,
}

/// Turn content is normally a block list; echoed user prompts are a bare
/// string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Blocks(Vec<ContentBlock>),
    Text(String),
}

impl Default for TurnContent {
    fn default() -> Self {
        Self::Blocks(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultMessage {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default, alias = "cost_usd")]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub num_turns: Option<u64>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorMessage {
    #[serde(default)]
    pub error: Value,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorMessage {
    /// Best available human-readable description.
    pub fn description(&self) -> String {
        self.error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| self.error.as_str())
            .or(self.message.as_deref())
            .unwrap_or("unknown error")
            .to_string()
    }
}

/// Flatten a tool-result payload (string or list of text parts) to text.
pub fn tool_result_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_system_init() {
        let line = r#"{"type":"system","subtype":"init","session_id":"abc","model":"claude-x","tools":["Read"]}"#;
        assert_eq!(
            AgentMessage::parse_line(line),
            AgentMessage::System(SystemMessage {
                subtype: Some("init".to_string()),
                session_id: Some("abc".to_string()),
                model: Some("claude-x".to_string()),
            })
        );
    }

    #[test]
    fn parse_assistant_with_mixed_blocks() {
        let line = r#"{"type":"assistant","message":{"content":[
            {"type":"text","text":"Looking around."},
            {"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"src/lib.rs"}},
            {"type":"image","source":{}}
        ],"usage":{"input_tokens":3}}}"#;
        let AgentMessage::Assistant(turn) = AgentMessage::parse_line(line) else {
            panic!("expected assistant message");
        };
        let TurnContent::Blocks(blocks) = turn.message.content else {
            panic!("expected block content");
        };
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[1],
            ContentBlock::ToolUse {
                id: Some("t1".to_string()),
                name: "Read".to_string(),
                input: json!({"file_path": "src/lib.rs"}),
            }
        );
        assert_eq!(blocks[2], ContentBlock::Other);
    }

    #[test]
    fn parse_user_tool_result() {
        let line = r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"a\nb","is_error":false}]}}"#;
        let AgentMessage::User(turn) = AgentMessage::parse_line(line) else {
            panic!("expected user message");
        };
        assert_eq!(
            turn.message.content,
            TurnContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: Some("t1".to_string()),
                content: json!("a\nb"),
                is_error: Some(false),
            }])
        );
    }

    #[test]
    fn parse_user_plain_string_content() {
        let line = r#"{"type":"user","message":{"role":"user","content":"hi"}}"#;
        let AgentMessage::User(turn) = AgentMessage::parse_line(line) else {
            panic!("expected user message");
        };
        assert_eq!(turn.message.content, TurnContent::Text("hi".to_string()));
    }

    #[test]
    fn parse_result_with_legacy_cost_field() {
        let line = r#"{"type":"result","subtype":"success","is_error":false,"result":"done","cost_usd":0.25,"duration_ms":1200,"num_turns":4}"#;
        let AgentMessage::Result(result) = AgentMessage::parse_line(line) else {
            panic!("expected result message");
        };
        assert!(!result.is_error);
        assert_eq!(result.result.as_deref(), Some("done"));
        assert_eq!(result.total_cost_usd, Some(0.25));
        assert_eq!(result.duration_ms, Some(1200));
        assert_eq!(result.num_turns, Some(4));
    }

    #[test]
    fn parse_result_without_metadata() {
        let msg = AgentMessage::parse_line(r#"{"type":"result"}"#);
        assert!(msg.is_terminal());
        let AgentMessage::Result(result) = msg else {
            panic!("expected result message");
        };
        assert_eq!(result.total_cost_usd, None);
        assert_eq!(result.duration_ms, None);
    }

    #[test]
    fn error_description_variants() {
        let nested = AgentMessage::parse_line(r#"{"type":"error","error":{"message":"rate limited"}}"#);
        let flat = AgentMessage::parse_line(r#"{"type":"error","message":"something broke"}"#);
        let bare = AgentMessage::parse_line(r#"{"type":"error"}"#);
        let describe = |m: AgentMessage| match m {
            AgentMessage::Error(e) => e.description(),
            other => panic!("expected error, got {other:?}"),
        };
        assert_eq!(describe(nested), "rate limited");
        assert_eq!(describe(flat), "something broke");
        assert_eq!(describe(bare), "unknown error");
    }

    #[test]
    fn unknown_type_degrades() {
        assert_eq!(
            AgentMessage::parse_line(r#"{"type":"stream_event","event":{}}"#),
            AgentMessage::unknown("stream_event")
        );
    }

    #[test]
    fn known_type_with_bad_shape_degrades() {
        assert_eq!(
            AgentMessage::parse_line(r#"{"type":"assistant","message":42}"#),
            AgentMessage::unknown("assistant")
        );
    }

    #[test]
    fn malformed_and_untyped_lines_degrade() {
        assert_eq!(AgentMessage::parse_line("not json {"), AgentMessage::unknown("malformed"));
        assert_eq!(AgentMessage::parse_line(r#"{"hello":1}"#), AgentMessage::unknown("untyped"));
        assert_eq!(AgentMessage::parse_line("[1,2]"), AgentMessage::unknown("untyped"));
    }

    #[test]
    fn tool_result_text_flattens_parts() {
        assert_eq!(tool_result_text(&json!("x")), "x");
        assert_eq!(
            tool_result_text(&json!([{"type":"text","text":"a"},{"type":"text","text":"b"}])),
            "a\nb"
        );
        assert_eq!(tool_result_text(&Value::Null), "");
    }
}
