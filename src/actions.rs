//! Host-executed action providers.
//!
//! Some tools run on this side of the pipe instead of inside the backend.
//! Providers register by name; the turn executor routes approved requests
//! for a registered name here and forwards the result to the backend.

use agent_backend::ToolResult;
use async_trait::async_trait;
use serde_json::Value;

/// One host-executed tool. Failures are reported as error-flagged results,
/// never as transport errors.
#[async_trait]
pub trait ActionProvider: Send + Sync {
    /// Unqualified tool name the provider answers to.
    fn name(&self) -> &str;

    async fn execute(&self, arguments: &Value) -> ToolResult;
}

/// Name-keyed lookup over registered providers.
#[derive(Default)]
pub struct ActionRegistry {
    providers: Vec<Box<dyn ActionProvider>>,
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Box<dyn ActionProvider>) {
        self.providers.push(provider);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn ActionProvider> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
            .map(Box::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use agent_backend::ToolResult;
    use async_trait::async_trait;
    use serde_json::Value;

    use super::{ActionProvider, ActionRegistry};

    struct Echo;

    #[async_trait]
    impl ActionProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(&self, arguments: &Value) -> ToolResult {
            ToolResult::success(arguments.clone())
        }
    }

    #[tokio::test]
    async fn registry_routes_by_name() {
        let mut registry = ActionRegistry::new();
        registry.register(Box::new(Echo));

        assert!(registry.get("echo").is_some());
        assert!(registry.get("fetch_image").is_none());

        let result = registry
            .get("echo")
            .unwrap()
            .execute(&Value::String("hi".to_string()))
            .await;
        assert!(!result.is_error);
    }
}
