//! Single-turn driver: submit a prompt, drain the event stream, answer tool
//! requests, and report how the turn ended.

use std::time::Duration;

use agent_backend::{
    BackendConnection, ContentBlock, QueryError, SessionId, StreamEvent, ToolDecision,
    ToolRequest, ToolResponse,
};
use tracing::{debug, info};

use crate::actions::ActionRegistry;
use crate::policy::PolicyGate;

/// Backend phrasing that signals the conversation no longer fits in context.
/// Matched case-insensitively against assistant text.
pub const OVERFLOW_MARKER: &str = "prompt is too long";

/// How one turn ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The backend reported a context overflow somewhere in the turn.
    pub overflow: bool,
    /// Session identifier from the terminal event, when one arrived.
    pub session_id: Option<SessionId>,
}

/// Drives one prompt to completion over a live connection.
pub struct TurnExecutor<'a> {
    gate: &'a PolicyGate,
    actions: &'a ActionRegistry,
    idle_deadline: Duration,
}

impl<'a> TurnExecutor<'a> {
    #[must_use]
    pub fn new(gate: &'a PolicyGate, actions: &'a ActionRegistry, idle_deadline: Duration) -> Self {
        Self {
            gate,
            actions,
            idle_deadline,
        }
    }

    /// Submits `prompt` and consumes events until a terminal event or the
    /// end of the stream. The overflow flag latches: a marker seen early is
    /// reported even when the turn later completes normally.
    pub async fn execute(
        &self,
        connection: &mut dyn BackendConnection,
        prompt: &str,
    ) -> Result<TurnOutcome, QueryError> {
        connection.submit(prompt).await?;

        let mut outcome = TurnOutcome::default();
        loop {
            let event =
                match tokio::time::timeout(self.idle_deadline, connection.next_event()).await {
                    Ok(next) => next?,
                    Err(_) => {
                        return Err(QueryError::StalledStream {
                            idle: self.idle_deadline,
                        })
                    }
                };
            let Some(event) = event else {
                // Stream ended without a terminal event. The turn is
                // incomplete but the caller decides what that means.
                debug!("event stream ended before a terminal event");
                return Ok(outcome);
            };

            match event {
                StreamEvent::System { subtype, .. } => {
                    debug!(subtype, "backend system event");
                }
                StreamEvent::Assistant { content } => {
                    for block in content {
                        match block {
                            ContentBlock::Text { text } => {
                                if text.to_lowercase().contains(OVERFLOW_MARKER) {
                                    info!("backend reported a context overflow");
                                    outcome.overflow = true;
                                }
                                debug!(%text, "assistant text");
                            }
                            ContentBlock::ToolUse(request) => {
                                self.handle_tool_request(connection, request).await?;
                            }
                        }
                    }
                }
                StreamEvent::ToolResult {
                    call_id, is_error, ..
                } => {
                    debug!(call_id, is_error, "tool result observed");
                }
                StreamEvent::Result {
                    session_id,
                    is_error,
                    num_turns,
                } => {
                    if is_error {
                        return Err(QueryError::backend("turn ended with an error result"));
                    }
                    info!(session = truncate_id(&session_id), num_turns, "turn completed");
                    if !session_id.is_empty() {
                        outcome.session_id = Some(session_id);
                    }
                    return Ok(outcome);
                }
            }
        }
    }

    async fn handle_tool_request(
        &self,
        connection: &mut dyn BackendConnection,
        request: ToolRequest,
    ) -> Result<(), QueryError> {
        match self.gate.decide(&request.tool_name, &request.arguments) {
            ToolDecision::Deny { reason } => {
                connection
                    .respond_tool(&request.call_id, ToolResponse::Denied { reason })
                    .await
            }
            ToolDecision::Allow => match self.actions.get(&request.tool_name) {
                Some(provider) => {
                    debug!(tool = %request.tool_name, "executing host action");
                    let result = provider.execute(&request.arguments).await;
                    connection
                        .respond_tool(&request.call_id, ToolResponse::Completed(result))
                        .await
                }
                None => {
                    connection
                        .respond_tool(&request.call_id, ToolResponse::Granted)
                        .await
                }
            },
        }
    }
}

/// Session identifiers are long and opaque; log only a prefix.
fn truncate_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
