//! Tool trait and the registry of tools available to an agent.

use crate::error::{AppError, Result};
use crate::types::ToolSchema;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A single callable tool.
///
/// Implementors describe themselves via [`Tool::schema`] (fed to the
/// provider as part of the tool-calling contract) and perform the actual
/// work in [`Tool::execute`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Value>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Registry of tools an orchestrator may offer to the provider.
///
/// A request can restrict which registered tools are actually exposed via
/// `allowed` in [`ToolRegistry::schemas_for`]/[`ToolRegistry::execute`] —
/// this lets one process-wide registry back many conversations with
/// different tool allow-lists.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool under its own name. Re-registering a name that is
    /// already present is a no-op (the first registration wins) rather than
    /// a silent replacement.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.entry(tool.name().to_string()).or_insert(tool);
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// All registered tool schemas.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Schemas for the subset of registered tools named in `allowed`. If
    /// `allowed` is `None`, every registered tool is included.
    pub fn schemas_for(&self, allowed: Option<&[String]>) -> Vec<ToolSchema> {
        match allowed {
            None => self.schemas(),
            Some(names) => names
                .iter()
                .filter_map(|name| self.tools.get(name))
                .map(|t| t.schema())
                .collect(),
        }
    }

    /// Execute a tool by name, rejecting the call if the tool is not
    /// registered or not present in `allowed` (when given).
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        allowed: Option<&[String]>,
    ) -> Result<Value> {
        if let Some(names) = allowed {
            if !names.iter().any(|n| n == name) {
                return Err(AppError::Validation(format!(
                    "tool '{name}' is not in the allowed-tools list for this call"
                )));
            }
        }

        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AppError::Validation(format!("tool not found: {name}")))?;
        tool.execute(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::calculator::Calculator;

    fn registry_with_calculator() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Calculator));
        registry
    }

    #[test]
    fn registry_creation_is_empty() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.tool_names().len(), 0);
    }

    #[tokio::test]
    async fn re_registering_a_name_is_a_no_op() {
        struct OtherTool;
        #[async_trait]
        impl Tool for OtherTool {
            fn name(&self) -> &str {
                "calculator"
            }
            fn description(&self) -> &str {
                "a different tool that happens to share a name"
            }
            fn parameters_schema(&self) -> Value {
                serde_json::json!({"type": "object"})
            }
            async fn execute(&self, _args: Value) -> Result<Value> {
                Ok(serde_json::json!({"different": true}))
            }
        }

        let mut registry = registry_with_calculator();
        assert_eq!(registry.tool_names().len(), 1);
        registry.register(Arc::new(OtherTool));
        assert_eq!(registry.tool_names().len(), 1);
        let result = registry
            .execute("calculator", serde_json::json!({"operation": "add", "a": 1.0, "b": 1.0}), None)
            .await
            .unwrap();
        assert_eq!(result["result"], 2.0, "first registration must win, not the re-registration");
    }

    #[test]
    fn schemas_list_registered_tools() {
        let registry = registry_with_calculator();
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "calculator");
    }

    #[tokio::test]
    async fn execute_runs_a_registered_tool() {
        let registry = registry_with_calculator();
        let result = registry
            .execute("calculator", serde_json::json!({"operation": "add", "a": 5.0, "b": 3.0}), None)
            .await
            .unwrap();
        assert_eq!(result["result"], 8.0);
    }

    #[tokio::test]
    async fn execute_rejects_unknown_tool() {
        let registry = registry_with_calculator();
        let result = registry.execute("nonexistent", serde_json::json!({}), None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn execute_rejects_tool_outside_allow_list() {
        let registry = registry_with_calculator();
        let allowed = vec!["some_other_tool".to_string()];
        let result = registry
            .execute("calculator", serde_json::json!({}), Some(&allowed))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
