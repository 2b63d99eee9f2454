//! Subprocess transport implementing the shared `agent_backend` contract.
//!
//! Each connection owns one backend CLI process speaking newline-delimited
//! JSON over stdin/stdout. Resume-by-identifier, permission round-trips,
//! host tool round-trips, and interrupts all travel over that pipe pair.

mod config;
mod protocol;

use std::collections::HashMap;
use std::process::Stdio;

use agent_backend::{
    Backend, BackendConnection, ContentBlock, QueryError, StreamEvent, ToolResponse,
};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

pub use config::CliBackendConfig;
pub use protocol::ParsedLine;

/// Spawns one CLI subprocess per connection.
#[derive(Debug, Clone)]
pub struct CliBackend {
    config: CliBackendConfig,
}

impl CliBackend {
    #[must_use]
    pub fn new(config: CliBackendConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, resume: Option<&str>) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .arg("--output-format")
            .arg("stream-json")
            .arg("--input-format")
            .arg("stream-json")
            .arg("--verbose");

        if let Some(system_prompt) = &self.config.system_prompt {
            command.arg("--system-prompt").arg(system_prompt);
        }
        if !self.config.allowed_tools.is_empty() {
            command
                .arg("--allowedTools")
                .arg(self.config.allowed_tools.join(","));
        }
        if let Some(session_id) = resume {
            command.arg("--resume").arg(session_id);
        }
        if let Some(cwd) = &self.config.cwd {
            command.current_dir(cwd);
        }
        command.args(&self.config.extra_args);

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Backend for CliBackend {
    async fn connect(
        &self,
        resume: Option<&str>,
    ) -> Result<Box<dyn BackendConnection>, QueryError> {
        let mut child = self.build_command(resume).spawn().map_err(|source| {
            QueryError::connect(format!(
                "failed to spawn {}: {source}",
                self.config.program
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| QueryError::connect("backend process has no stdin pipe"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| QueryError::connect("backend process has no stdout pipe"))?;

        debug!(program = %self.config.program, resume = resume.is_some(), "backend process spawned");
        Ok(Box::new(CliConnection {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            pending: HashMap::new(),
            next_request_id: 0,
        }))
    }
}

enum PendingTool {
    Permission,
    HostCall { rpc_id: Value },
}

struct CliConnection {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    pending: HashMap<String, PendingTool>,
    next_request_id: u64,
}

impl CliConnection {
    async fn write_line(&mut self, value: &Value) -> Result<(), QueryError> {
        let mut line = value.to_string();
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|source| QueryError::transport("writing to backend stdin", source))?;
        self.stdin
            .flush()
            .await
            .map_err(|source| QueryError::transport("flushing backend stdin", source))
    }

    fn fresh_request_id(&mut self) -> String {
        self.next_request_id += 1;
        format!("host-req-{}", self.next_request_id)
    }
}

#[async_trait]
impl BackendConnection for CliConnection {
    async fn submit(&mut self, prompt: &str) -> Result<(), QueryError> {
        self.write_line(&protocol::user_prompt_line(prompt)).await
    }

    async fn next_event(&mut self) -> Result<Option<StreamEvent>, QueryError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|source| QueryError::transport("reading backend stream", source))?;
            let Some(line) = line else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(&line)
                .map_err(|source| QueryError::protocol(format!("invalid JSON line: {source}")))?;

            match protocol::parse_line(&value) {
                ParsedLine::Event(event) => return Ok(Some(event)),
                ParsedLine::Permission(request) => {
                    self.pending
                        .insert(request.call_id.clone(), PendingTool::Permission);
                    return Ok(Some(StreamEvent::Assistant {
                        content: vec![ContentBlock::ToolUse(request)],
                    }));
                }
                ParsedLine::HostCall { request, rpc_id } => {
                    self.pending
                        .insert(request.call_id.clone(), PendingTool::HostCall { rpc_id });
                    return Ok(Some(StreamEvent::Assistant {
                        content: vec![ContentBlock::ToolUse(request)],
                    }));
                }
                ParsedLine::Ignored => debug!(line = %line, "ignoring backend line"),
            }
        }
    }

    async fn respond_tool(
        &mut self,
        call_id: &str,
        response: ToolResponse,
    ) -> Result<(), QueryError> {
        let pending = self.pending.remove(call_id).ok_or_else(|| {
            QueryError::protocol(format!("no pending tool request for call id {call_id}"))
        })?;

        let line = match (pending, response) {
            (PendingTool::Permission, ToolResponse::Granted) => {
                protocol::permission_allow_line(call_id)
            }
            (PendingTool::Permission, ToolResponse::Denied { reason }) => {
                protocol::permission_deny_line(call_id, &reason)
            }
            (PendingTool::Permission, ToolResponse::Completed(_)) => {
                return Err(QueryError::protocol(
                    "permission requests cannot carry a host-executed result",
                ));
            }
            (PendingTool::HostCall { rpc_id }, ToolResponse::Completed(result)) => {
                protocol::host_result_line(call_id, &rpc_id, &result.content, result.is_error)
            }
            (PendingTool::HostCall { rpc_id }, ToolResponse::Denied { reason }) => {
                protocol::host_result_line(call_id, &rpc_id, &Value::String(reason), true)
            }
            (PendingTool::HostCall { rpc_id }, ToolResponse::Granted) => {
                warn!(call_id, "host call granted without a registered provider");
                let message = Value::String("no host provider registered".to_string());
                protocol::host_result_line(call_id, &rpc_id, &message, true)
            }
        };

        self.write_line(&line).await
    }

    async fn interrupt(&mut self) -> Result<(), QueryError> {
        let request_id = self.fresh_request_id();
        self.write_line(&protocol::interrupt_line(&request_id)).await
    }

    async fn close(&mut self) -> Result<(), QueryError> {
        // Best effort: the process may already be gone.
        if let Err(source) = self.child.start_kill() {
            debug!(error = %source, "backend process already terminated");
        }
        let _ = self.child.wait().await;
        Ok(())
    }
}
