//! Pure authorization gate for side-effecting tool requests.
//!
//! The gate sandboxes filesystem access and shell execution; every other
//! tool name passes through untouched. Decisions are stateless and
//! recomputed per request, so the gate is safe to consult from anywhere.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use agent_backend::ToolDecision;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

const DENY_MISSING_PATH: &str = "missing path";
const DENY_INVALID_PATH: &str = "invalid path";
const DENY_OUTSIDE_SANDBOX: &str = "outside sandbox";
const DENY_COMMAND: &str = "command not permitted";

const ARGUMENT_LOG_MAX_BYTES: usize = 120;

fn sleep_command_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"^sleep \d+(\.\d+)?$").expect("sleep allowlist regex must compile")
    })
}

/// Gate instance bound to one sandbox root.
#[derive(Debug, Clone)]
pub struct PolicyGate {
    sandbox_root: PathBuf,
}

impl PolicyGate {
    /// Creates a gate rooted at `sandbox_root`, which must exist.
    pub fn new(sandbox_root: impl Into<PathBuf>) -> io::Result<Self> {
        let sandbox_root = sandbox_root.into().canonicalize()?;
        if !sandbox_root.is_dir() {
            return Err(io::Error::other("sandbox root must be a directory"));
        }

        Ok(Self { sandbox_root })
    }

    #[must_use]
    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    /// Decides whether one tool request may run. Denials are logged with a
    /// truncated argument view; allows are never logged.
    pub fn decide(&self, tool_name: &str, arguments: &Value) -> ToolDecision {
        let decision = self.evaluate(tool_name, arguments);
        if let ToolDecision::Deny { reason } = &decision {
            warn!(
                tool = tool_name,
                reason = %reason,
                arguments = %truncate_for_log(arguments),
                "denied tool request"
            );
        }

        decision
    }

    fn evaluate(&self, tool_name: &str, arguments: &Value) -> ToolDecision {
        match tool_name {
            "Read" | "Write" => self.check_path(arguments, false),
            // The list-style tool defaults to the sandbox root when no path
            // argument is supplied.
            "Glob" => self.check_path(arguments, true),
            "Bash" => check_command(arguments),
            _ => ToolDecision::Allow,
        }
    }

    fn check_path(&self, arguments: &Value, path_is_optional: bool) -> ToolDecision {
        let path = arguments.get("path").and_then(Value::as_str);
        let Some(path) = path else {
            return if path_is_optional {
                ToolDecision::Allow
            } else {
                ToolDecision::deny(DENY_MISSING_PATH)
            };
        };

        if path.trim().is_empty() {
            return ToolDecision::deny(DENY_INVALID_PATH);
        }

        let resolved = match self.resolve(path) {
            Ok(resolved) => resolved,
            Err(_) => return ToolDecision::deny(DENY_INVALID_PATH),
        };

        if resolved.starts_with(&self.sandbox_root) {
            ToolDecision::Allow
        } else {
            ToolDecision::deny(DENY_OUTSIDE_SANDBOX)
        }
    }

    /// Resolves to an absolute path with symlinks followed and `.`/`..`
    /// normalized, in one filesystem-backed step. Lexical normalization is
    /// deliberately avoided: `link/../x` must be resolved through the link
    /// target, not rewritten before the link is followed.
    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let candidate = {
            let path = Path::new(path);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.sandbox_root.join(path)
            }
        };

        if candidate.exists() {
            return candidate.canonicalize();
        }

        // Non-existent target (a write destination, usually): canonicalize
        // the deepest existing ancestor of the raw candidate, then reattach
        // the missing suffix.
        for ancestor in candidate.ancestors().skip(1) {
            if ancestor.exists() {
                let canonical = ancestor.canonicalize()?;
                let remainder = candidate
                    .strip_prefix(ancestor)
                    .map_err(|_| io::Error::other("ancestor is not a prefix of its path"))?;
                // The suffix does not exist on disk, so `.`/`..` inside it
                // cannot be resolved through the filesystem.
                if remainder
                    .components()
                    .any(|component| !matches!(component, Component::Normal(_)))
                {
                    return Err(io::Error::other("unresolvable path components"));
                }
                return Ok(canonical.join(remainder));
            }
        }

        Err(io::Error::other("no existing ancestor found"))
    }
}

fn check_command(arguments: &Value) -> ToolDecision {
    let Some(command) = arguments.get("command").and_then(Value::as_str) else {
        return ToolDecision::deny(DENY_COMMAND);
    };

    // Hard allowlist: `sleep <number>` and nothing else. Keyword is
    // case-sensitive.
    if sleep_command_regex().is_match(command.trim()) {
        ToolDecision::Allow
    } else {
        ToolDecision::deny(DENY_COMMAND)
    }
}

fn truncate_for_log(arguments: &Value) -> String {
    let rendered = arguments.to_string();
    if rendered.len() <= ARGUMENT_LOG_MAX_BYTES {
        return rendered;
    }

    let mut cutoff = ARGUMENT_LOG_MAX_BYTES;
    while cutoff > 0 && !rendered.is_char_boundary(cutoff) {
        cutoff -= 1;
    }

    let mut truncated = rendered[..cutoff].to_string();
    truncated.push_str("[truncated]");
    truncated
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::truncate_for_log;

    #[test]
    fn sleep_allowlist_accepts_integer_and_decimal_durations() {
        let regex = super::sleep_command_regex();
        assert!(regex.is_match("sleep 30"));
        assert!(regex.is_match("sleep 0.5"));
        assert!(!regex.is_match("sleep 30; rm -rf /"));
        assert!(!regex.is_match("SLEEP 30"));
        assert!(!regex.is_match("sleep"));
        assert!(!regex.is_match("sleep thirty"));
        assert!(!regex.is_match("echo hi && sleep 1"));
    }

    #[test]
    fn oversized_arguments_are_truncated_for_logging() {
        let arguments = json!({ "content": "x".repeat(4096) });
        let rendered = truncate_for_log(&arguments);

        assert!(rendered.len() < 200);
        assert!(rendered.ends_with("[truncated]"));
    }
}
