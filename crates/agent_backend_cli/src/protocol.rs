//! Wire mapping for the CLI's newline-delimited JSON stream.
//!
//! Incoming lines are mapped onto the closed [`StreamEvent`] sum type plus
//! two host-directed request shapes (permission checks and host tool calls).
//! Assistant `tool_use` blocks are dropped here: the permission round-trip is
//! the single pre-execution authorization point, so surfacing both would
//! gate the same action twice.

use agent_backend::{ContentBlock, StreamEvent, ToolRequest};
use serde_json::{json, Value};

/// One parsed line of backend output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Event(StreamEvent),
    /// `can_use_tool` control request: the backend asks to run a tool itself.
    Permission(ToolRequest),
    /// Host tool invocation routed through the control channel.
    HostCall {
        request: ToolRequest,
        rpc_id: Value,
    },
    /// Recognized but irrelevant to the turn lifecycle.
    Ignored,
}

pub fn parse_line(line: &Value) -> ParsedLine {
    let Some(kind) = line.get("type").and_then(Value::as_str) else {
        return ParsedLine::Ignored;
    };

    match kind {
        "system" => {
            let subtype = line
                .get("subtype")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            ParsedLine::Event(StreamEvent::System {
                subtype,
                data: line.clone(),
            })
        }
        "assistant" => ParsedLine::Event(StreamEvent::Assistant {
            content: assistant_text_blocks(line),
        }),
        "user" => match tool_result_from_user_message(line) {
            Some(event) => ParsedLine::Event(event),
            None => ParsedLine::Ignored,
        },
        "result" => {
            let session_id = line
                .get("session_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let is_error = line
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let num_turns = line.get("num_turns").and_then(Value::as_u64).unwrap_or(0);
            ParsedLine::Event(StreamEvent::Result {
                session_id,
                is_error,
                num_turns,
            })
        }
        "control_request" => parse_control_request(line),
        _ => ParsedLine::Ignored,
    }
}

fn assistant_text_blocks(line: &Value) -> Vec<ContentBlock> {
    let blocks = line
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_array);

    let Some(blocks) = blocks else {
        return Vec::new();
    };

    blocks
        .iter()
        .filter_map(|block| {
            if block.get("type").and_then(Value::as_str) == Some("text") {
                block
                    .get("text")
                    .and_then(Value::as_str)
                    .map(|text| ContentBlock::Text {
                        text: text.to_string(),
                    })
            } else {
                None
            }
        })
        .collect()
}

fn tool_result_from_user_message(line: &Value) -> Option<StreamEvent> {
    let blocks = line
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_array)?;

    let block = blocks
        .iter()
        .find(|block| block.get("type").and_then(Value::as_str) == Some("tool_result"))?;

    Some(StreamEvent::ToolResult {
        call_id: block
            .get("tool_use_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        content: block.get("content").cloned().unwrap_or(Value::Null),
        is_error: block
            .get("is_error")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

fn parse_control_request(line: &Value) -> ParsedLine {
    let Some(request_id) = line.get("request_id").and_then(Value::as_str) else {
        return ParsedLine::Ignored;
    };
    let Some(request) = line.get("request") else {
        return ParsedLine::Ignored;
    };

    match request.get("subtype").and_then(Value::as_str) {
        Some("can_use_tool") => ParsedLine::Permission(ToolRequest {
            call_id: request_id.to_string(),
            tool_name: request
                .get("tool_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            arguments: request.get("input").cloned().unwrap_or(Value::Null),
        }),
        Some("mcp_message") => parse_host_call(request_id, request),
        _ => ParsedLine::Ignored,
    }
}

fn parse_host_call(request_id: &str, request: &Value) -> ParsedLine {
    let Some(message) = request.get("message") else {
        return ParsedLine::Ignored;
    };
    if message.get("method").and_then(Value::as_str) != Some("tools/call") {
        return ParsedLine::Ignored;
    }

    let params = message.get("params").cloned().unwrap_or(Value::Null);
    let tool_name = params
        .get("name")
        .and_then(Value::as_str)
        .map(strip_server_prefix)
        .unwrap_or_default()
        .to_string();

    ParsedLine::HostCall {
        request: ToolRequest {
            call_id: request_id.to_string(),
            tool_name,
            arguments: params.get("arguments").cloned().unwrap_or(Value::Null),
        },
        rpc_id: message.get("id").cloned().unwrap_or(Value::Null),
    }
}

/// Host tool names arrive namespaced as `mcp__<server>__<tool>`.
fn strip_server_prefix(name: &str) -> &str {
    name.rsplit("__").next().unwrap_or(name)
}

pub fn user_prompt_line(prompt: &str) -> Value {
    json!({
        "type": "user",
        "message": {
            "role": "user",
            "content": [{ "type": "text", "text": prompt }],
        },
    })
}

pub fn permission_allow_line(request_id: &str) -> Value {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "success",
            "request_id": request_id,
            "response": { "behavior": "allow" },
        },
    })
}

pub fn permission_deny_line(request_id: &str, reason: &str) -> Value {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "success",
            "request_id": request_id,
            "response": { "behavior": "deny", "message": reason },
        },
    })
}

pub fn host_result_line(request_id: &str, rpc_id: &Value, content: &Value, is_error: bool) -> Value {
    // Block arrays (text, image) pass through untouched; anything else is
    // wrapped as a single text block.
    let blocks = match content {
        Value::Array(blocks) => Value::Array(blocks.clone()),
        other => json!([{ "type": "text", "text": content_as_text(other) }]),
    };
    json!({
        "type": "control_response",
        "response": {
            "subtype": "success",
            "request_id": request_id,
            "response": {
                "mcp_response": {
                    "jsonrpc": "2.0",
                    "id": rpc_id,
                    "result": {
                        "content": blocks,
                        "isError": is_error,
                    },
                },
            },
        },
    })
}

pub fn interrupt_line(request_id: &str) -> Value {
    json!({
        "type": "control_request",
        "request_id": request_id,
        "request": { "subtype": "interrupt" },
    })
}

fn content_as_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use agent_backend::{ContentBlock, StreamEvent};
    use serde_json::json;

    use super::{parse_line, ParsedLine};

    #[test]
    fn result_line_maps_to_terminal_event() {
        let line = json!({
            "type": "result",
            "subtype": "success",
            "session_id": "sess-42",
            "is_error": false,
            "num_turns": 7,
        });

        assert_eq!(
            parse_line(&line),
            ParsedLine::Event(StreamEvent::Result {
                session_id: "sess-42".to_string(),
                is_error: false,
                num_turns: 7,
            })
        );
    }

    #[test]
    fn assistant_line_keeps_text_and_drops_tool_use_blocks() {
        let line = json!({
            "type": "assistant",
            "message": {
                "content": [
                    { "type": "text", "text": "reading the file" },
                    { "type": "tool_use", "id": "toolu_1", "name": "Read", "input": {} },
                ],
            },
        });

        let ParsedLine::Event(StreamEvent::Assistant { content }) = parse_line(&line) else {
            panic!("expected assistant event");
        };
        assert_eq!(
            content,
            vec![ContentBlock::Text {
                text: "reading the file".to_string(),
            }]
        );
    }

    #[test]
    fn can_use_tool_request_becomes_permission() {
        let line = json!({
            "type": "control_request",
            "request_id": "req-9",
            "request": {
                "subtype": "can_use_tool",
                "tool_name": "Bash",
                "input": { "command": "sleep 3" },
            },
        });

        let ParsedLine::Permission(request) = parse_line(&line) else {
            panic!("expected permission request");
        };
        assert_eq!(request.call_id, "req-9");
        assert_eq!(request.tool_name, "Bash");
        assert_eq!(request.arguments["command"], "sleep 3");
    }

    #[test]
    fn mcp_tools_call_becomes_host_call_with_stripped_name() {
        let line = json!({
            "type": "control_request",
            "request_id": "req-12",
            "request": {
                "subtype": "mcp_message",
                "message": {
                    "jsonrpc": "2.0",
                    "id": 3,
                    "method": "tools/call",
                    "params": {
                        "name": "mcp__images__fetch_image",
                        "arguments": { "url": "https://example.com/cat.png" },
                    },
                },
            },
        });

        let ParsedLine::HostCall { request, rpc_id } = parse_line(&line) else {
            panic!("expected host call");
        };
        assert_eq!(request.tool_name, "fetch_image");
        assert_eq!(request.call_id, "req-12");
        assert_eq!(rpc_id, json!(3));
    }

    #[test]
    fn tool_result_user_message_maps_to_tool_result_event() {
        let line = json!({
            "type": "user",
            "message": {
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": "toolu_5",
                    "content": "file contents",
                    "is_error": false,
                }],
            },
        });

        assert_eq!(
            parse_line(&line),
            ParsedLine::Event(StreamEvent::ToolResult {
                call_id: "toolu_5".to_string(),
                content: json!("file contents"),
                is_error: false,
            })
        );
    }

    #[test]
    fn unknown_and_malformed_lines_are_ignored() {
        assert_eq!(parse_line(&json!({ "type": "ping" })), ParsedLine::Ignored);
        assert_eq!(parse_line(&json!({ "no_type": true })), ParsedLine::Ignored);
        assert_eq!(
            parse_line(&json!({ "type": "control_request", "request_id": "r" })),
            ParsedLine::Ignored
        );
    }
}
