//! The `AgentRuntime` / `AgentSession` traits.
//!
//! Both are object-safe so the driver can hold `&dyn AgentRuntime` and
//! `Box<dyn AgentSession>` without knowing the transport.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use super::message::AgentMessage;
use crate::config::SessionConfig;
use crate::error::SessionError;

/// Ordered stream of agent messages. An `Err` item is a transport or process
/// failure; the stream ends after it.
pub type MessageStream<'a> =
    Pin<Box<dyn Stream<Item = Result<AgentMessage, SessionError>> + Send + 'a>>;

/// Something that can open sessions against the external agent.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Human-readable name (e.g. "claude-code").
    fn name(&self) -> &str;

    /// Open a session for `config`.
    ///
    /// A missing agent binary or runtime must be reported as
    /// [`SessionError::DependencyMissing`].
    async fn connect(&self, config: &SessionConfig) -> Result<Box<dyn AgentSession>, SessionError>;
}

/// One open session with the agent.
#[async_trait]
pub trait AgentSession: Send {
    /// Transmit the task prompt. Called once, right after connect.
    async fn send(&mut self, prompt: &str) -> Result<(), SessionError>;

    /// The response stream. Ends when the agent is done or the transport
    /// closes.
    fn messages(&mut self) -> MessageStream<'_>;

    /// Release the underlying resource and wait until it is gone. The driver
    /// awaits this once when the session ends normally.
    async fn shutdown(&mut self) {
        self.close();
    }

    /// Non-blocking release for exit paths that cannot await, such as a
    /// panic unwinding through the driver. Must be idempotent.
    fn close(&mut self);
}

const _: () = {
    fn _assert_object_safe(_: &dyn AgentRuntime, _: &dyn AgentSession) {}
};
