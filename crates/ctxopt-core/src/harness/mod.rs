//! Adapter interface for the external analysis agent.
//!
//! ```text
//! SessionDriver
//!     |
//!     v
//! &dyn AgentRuntime --connect(config)--> Box<dyn AgentSession>
//!                                            |
//!                                            |  send(task prompt)      (once)
//!                                            |  messages() --> Stream<Result<AgentMessage>>
//!                                            |  close()                (exactly once)
//! ```
//!
//! [`ClaudeCodeAdapter`] is the production runtime; tests substitute
//! scripted fakes.

pub mod claude_code;
pub mod locate;
pub mod message;
pub mod trait_def;

pub use claude_code::ClaudeCodeAdapter;
pub use message::{AgentMessage, ContentBlock, ResultMessage, TurnContent};
pub use trait_def::{AgentRuntime, AgentSession, MessageStream};
