use serde_json::Value;

/// Backend request envelope for one side-effecting action.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// Authorization verdict for one tool request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolDecision {
    Allow,
    Deny { reason: String },
}

impl ToolDecision {
    /// Constructs a denial with the stated reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Host answer to a pending tool request.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResponse {
    /// The request passed the policy gate; the backend executes it.
    Granted,
    /// The request was denied before execution; carries the stated reason.
    Denied { reason: String },
    /// The host executed the action itself and returns its result.
    Completed(ToolResult),
}

/// Structured outcome of a host-executed action.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: Value,
    pub is_error: bool,
}

impl ToolResult {
    /// Constructs a successful result.
    #[must_use]
    pub fn success(content: impl Into<Value>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// Constructs an error result.
    #[must_use]
    pub fn error(content: impl Into<Value>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ToolDecision, ToolResult};

    #[test]
    fn deny_constructor_preserves_reason() {
        let decision = ToolDecision::deny("outside sandbox");
        assert!(!decision.is_allow());
        assert_eq!(
            decision,
            ToolDecision::Deny {
                reason: "outside sandbox".to_string(),
            }
        );
    }

    #[test]
    fn tool_result_constructors_set_error_flag_and_content() {
        let success = ToolResult::success(json!({ "bytes": 512 }));
        assert!(!success.is_error);
        assert_eq!(success.content, json!({ "bytes": 512 }));

        let error = ToolResult::error("missing file");
        assert!(error.is_error);
        assert_eq!(error.content, json!("missing file"));
    }
}
