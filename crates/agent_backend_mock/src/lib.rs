//! Deterministic scripted implementation of the shared `agent_backend`
//! contract.
//!
//! This crate contains no transport logic and is intended for local runs and
//! contract-level integration testing. A [`ScriptedBackend`] replays a fixed
//! sequence of turns; every interaction with it (connects, prompts, tool
//! responses, interrupts) is captured in a shared [`Recorder`] for test
//! assertions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use agent_backend::{
    Backend, BackendConnection, ContentBlock, QueryError, StreamEvent, ToolRequest, ToolResponse,
};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Stable backend identifier used for explicit startup selection.
pub const MOCK_BACKEND_ID: &str = "mock";

/// Idle period long enough that any realistic watchdog fires first.
const STALL_SLEEP: Duration = Duration::from_secs(86_400);

/// One step of a scripted turn.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// Yield this event to the consumer.
    Event(StreamEvent),
    /// Wait before yielding the next step.
    Delay(Duration),
    /// Stop yielding events for far longer than any inactivity deadline.
    Stall,
}

/// Scripted event sequence for one prompt submission.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTurn {
    steps: VecDeque<ScriptedStep>,
}

impl ScriptedTurn {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A minimal successful turn: one text fragment, then a terminal result.
    #[must_use]
    pub fn completed(session_id: &str) -> Self {
        Self::new().text("ok").result(session_id)
    }

    /// A turn whose assistant output reports context overflow.
    #[must_use]
    pub fn overflowing(session_id: &str) -> Self {
        Self::new()
            .text("Prompt is too long for the current context window.")
            .result(session_id)
    }

    #[must_use]
    pub fn event(mut self, event: StreamEvent) -> Self {
        self.steps.push_back(ScriptedStep::Event(event));
        self
    }

    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.event(StreamEvent::Assistant {
            content: vec![ContentBlock::Text { text: text.into() }],
        })
    }

    #[must_use]
    pub fn tool_use(self, call_id: &str, tool_name: &str, arguments: Value) -> Self {
        self.event(StreamEvent::Assistant {
            content: vec![ContentBlock::ToolUse(ToolRequest {
                call_id: call_id.to_string(),
                tool_name: tool_name.to_string(),
                arguments,
            })],
        })
    }

    #[must_use]
    pub fn tool_result(self, call_id: &str, content: Value, is_error: bool) -> Self {
        self.event(StreamEvent::ToolResult {
            call_id: call_id.to_string(),
            content,
            is_error,
        })
    }

    #[must_use]
    pub fn system(self, subtype: &str) -> Self {
        self.event(StreamEvent::System {
            subtype: subtype.to_string(),
            data: json!({}),
        })
    }

    #[must_use]
    pub fn result(self, session_id: &str) -> Self {
        self.event(StreamEvent::Result {
            session_id: session_id.to_string(),
            is_error: false,
            num_turns: 1,
        })
    }

    #[must_use]
    pub fn failed_result(self, session_id: &str) -> Self {
        self.event(StreamEvent::Result {
            session_id: session_id.to_string(),
            is_error: true,
            num_turns: 1,
        })
    }

    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.steps.push_back(ScriptedStep::Delay(delay));
        self
    }

    /// Ends the script with an indefinite stall instead of a terminal event.
    #[must_use]
    pub fn stall(mut self) -> Self {
        self.steps.push_back(ScriptedStep::Stall);
        self
    }
}

/// Everything the scripted backend observed, for test assertions.
#[derive(Debug, Default)]
pub struct Recorder {
    /// Resume identifiers passed to `connect`, in call order.
    pub connects: Vec<Option<String>>,
    /// Prompts submitted across all connections, in call order.
    pub prompts: Vec<String>,
    /// Tool responses delivered through `respond_tool`.
    pub tool_responses: Vec<(String, ToolResponse)>,
    /// Number of `interrupt` calls.
    pub interrupts: usize,
    /// Number of `close` calls.
    pub closes: usize,
}

/// Replays scripted turns across one or more connections.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    turns: Arc<Mutex<VecDeque<ScriptedTurn>>>,
    recorder: Arc<Mutex<Recorder>>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns.into())),
            recorder: Arc::new(Mutex::new(Recorder::default())),
        }
    }

    /// Shared recorder handle; clone before moving the backend elsewhere.
    #[must_use]
    pub fn recorder(&self) -> Arc<Mutex<Recorder>> {
        Arc::clone(&self.recorder)
    }

    /// Number of scripted turns not yet consumed by a submission.
    #[must_use]
    pub fn remaining_turns(&self) -> usize {
        lock_unpoisoned(&self.turns).len()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn connect(
        &self,
        resume: Option<&str>,
    ) -> Result<Box<dyn BackendConnection>, QueryError> {
        lock_unpoisoned(&self.recorder)
            .connects
            .push(resume.map(str::to_string));

        Ok(Box::new(ScriptedConnection {
            turns: Arc::clone(&self.turns),
            recorder: Arc::clone(&self.recorder),
            current: VecDeque::new(),
        }))
    }
}

struct ScriptedConnection {
    turns: Arc<Mutex<VecDeque<ScriptedTurn>>>,
    recorder: Arc<Mutex<Recorder>>,
    current: VecDeque<ScriptedStep>,
}

#[async_trait]
impl BackendConnection for ScriptedConnection {
    async fn submit(&mut self, prompt: &str) -> Result<(), QueryError> {
        lock_unpoisoned(&self.recorder)
            .prompts
            .push(prompt.to_string());

        let turn = lock_unpoisoned(&self.turns)
            .pop_front()
            .ok_or_else(|| QueryError::backend("scripted backend has no turns left"))?;
        self.current = turn.steps;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<StreamEvent>, QueryError> {
        loop {
            match self.current.pop_front() {
                Some(ScriptedStep::Event(event)) => return Ok(Some(event)),
                Some(ScriptedStep::Delay(delay)) => tokio::time::sleep(delay).await,
                Some(ScriptedStep::Stall) => {
                    tokio::time::sleep(STALL_SLEEP).await;
                    return Ok(None);
                }
                None => return Ok(None),
            }
        }
    }

    async fn respond_tool(
        &mut self,
        call_id: &str,
        response: ToolResponse,
    ) -> Result<(), QueryError> {
        lock_unpoisoned(&self.recorder)
            .tool_responses
            .push((call_id.to_string(), response));
        Ok(())
    }

    async fn interrupt(&mut self) -> Result<(), QueryError> {
        lock_unpoisoned(&self.recorder).interrupts += 1;
        // Drop the remaining script so the stream ends like an aborted turn.
        self.current.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), QueryError> {
        lock_unpoisoned(&self.recorder).closes += 1;
        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
