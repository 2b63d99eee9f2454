use serde_json::Value;

use crate::SessionId;

/// One typed event in a turn's stream.
///
/// The set is closed on purpose: consumers match exhaustively, so a new event
/// kind is a deliberate contract change rather than a silently dropped branch.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Informational backend event (init banners, status notices).
    System { subtype: String, data: Value },
    /// Assistant output: text fragments and tool requests, in backend order.
    Assistant { content: Vec<ContentBlock> },
    /// Result of a previously granted tool request.
    ToolResult {
        call_id: String,
        content: Value,
        is_error: bool,
    },
    /// Terminal event carrying the authoritative session identifier.
    Result {
        session_id: SessionId,
        is_error: bool,
        num_turns: u64,
    },
}

impl StreamEvent {
    /// Returns true when this event terminates the turn's stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. })
    }
}

/// One block of assistant content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text { text: String },
    ToolUse(crate::ToolRequest),
}
