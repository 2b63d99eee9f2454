//! Minimal backend-agnostic contract for one conversational turn.
//!
//! This crate intentionally defines only the shared turn lifecycle and
//! host-mediated tool-authorization contract types. It excludes transport
//! details, prompt content, and multi-turn orchestration concerns.

mod error;
mod events;
mod tools;

use async_trait::async_trait;

pub use error::QueryError;
pub use events::{ContentBlock, StreamEvent};
pub use tools::{ToolDecision, ToolRequest, ToolResponse, ToolResult};

/// Opaque identifier for backend-side conversation state.
pub type SessionId = String;

/// One live exchange channel with a conversational backend.
///
/// A connection accepts prompt submissions and yields an ordered sequence of
/// [`StreamEvent`]s per submission. Tool requests observed in the stream must
/// each be answered through [`BackendConnection::respond_tool`] before the
/// backend may act on them.
#[async_trait]
pub trait BackendConnection: Send {
    /// Submits a prompt, starting a new turn on this connection.
    async fn submit(&mut self, prompt: &str) -> Result<(), QueryError>;

    /// Returns the next event of the current turn, or `None` when the
    /// backend closed the stream.
    async fn next_event(&mut self) -> Result<Option<StreamEvent>, QueryError>;

    /// Answers a pending tool request identified by `call_id`.
    async fn respond_tool(
        &mut self,
        call_id: &str,
        response: ToolResponse,
    ) -> Result<(), QueryError>;

    /// Requests cancellation of the in-flight turn. Best-effort; the stream
    /// may still yield events before terminating.
    async fn interrupt(&mut self) -> Result<(), QueryError>;

    /// Releases the connection and any transport resources it holds.
    async fn close(&mut self) -> Result<(), QueryError>;
}

/// Factory for backend connections.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Opens a connection, resuming prior backend-side state when `resume`
    /// names a known session.
    async fn connect(
        &self,
        resume: Option<&str>,
    ) -> Result<Box<dyn BackendConnection>, QueryError>;
}
