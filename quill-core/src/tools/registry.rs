//! Tool registry: catalogue, conflict policy, and ordered enumeration.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use thiserror::Error;

use crate::llm::request::ToolDeclaration;

use super::traits::{Tool, ToolCategory, declaration_for};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered with a different descriptor")]
    DuplicateName(String),

    #[error("tool '{0}' not found")]
    NotFound(String),
}

/// A catalogued tool. `name` is the presented name, which may carry a
/// source prefix when the bare name was already taken.
pub struct RegisteredTool {
    pub name: String,
    pub source: Option<String>,
    pub tool: Arc<dyn Tool>,
    /// Registration sequence, the tie-break after priority.
    sequence: usize,
}

impl RegisteredTool {
    pub fn category(&self) -> ToolCategory {
        self.tool.category()
    }

    pub fn declaration(&self) -> ToolDeclaration {
        let mut declaration = declaration_for(self.tool.as_ref());
        declaration.name = self.name.clone();
        declaration
    }
}

#[derive(Default)]
struct RegistryInner {
    tools: IndexMap<String, Arc<RegisteredTool>>,
    next_sequence: usize,
}

/// Read-mostly catalogue. Registration takes the write gate; reads share
/// the lock and return snapshots of immutable entries.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<RegistryInner>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a first-party tool under its bare name.
    ///
    /// Re-registering an identical descriptor is a no-op; a different tool
    /// under a taken name is `DuplicateName`.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        self.insert(name, None, tool)
    }

    /// Register a tool from an external source. The first registrant owns
    /// the bare name; later registrants are auto-prefixed `<source>__<name>`
    /// so the name set stays deterministic across restarts given the same
    /// registration order.
    pub fn register_from_source(
        &self,
        source: &str,
        tool: Arc<dyn Tool>,
    ) -> Result<String, RegistryError> {
        let bare = tool.name().to_string();
        let taken = { self.inner.read().tools.contains_key(&bare) };
        let name = if taken {
            format!("{source}__{bare}")
        } else {
            bare
        };
        self.insert(name.clone(), Some(source.to_string()), tool)?;
        Ok(name)
    }

    fn insert(
        &self,
        name: String,
        source: Option<String>,
        tool: Arc<dyn Tool>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();

        if let Some(existing) = inner.tools.get(&name) {
            let identical = existing.tool.category() == tool.category()
                && existing.tool.priority() == tool.priority()
                && existing.tool.parameters() == tool.parameters()
                && existing.tool.description() == tool.description();
            return if identical {
                Ok(())
            } else {
                Err(RegistryError::DuplicateName(name))
            };
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.tools.insert(
            name.clone(),
            Arc::new(RegisteredTool {
                name,
                source,
                tool,
                sequence,
            }),
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<RegisteredTool>, RegistryError> {
        self.inner
            .read()
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Tools in one category, ordered by priority then registration order.
    pub fn list_by_category(&self, category: ToolCategory) -> Vec<Arc<RegisteredTool>> {
        let mut tools: Vec<Arc<RegisteredTool>> = self
            .inner
            .read()
            .tools
            .values()
            .filter(|entry| entry.category() == category)
            .cloned()
            .collect();
        tools.sort_by_key(|entry| (entry.tool.priority(), entry.sequence));
        tools
    }

    /// Every tool, categories in fixed order.
    pub fn all_tools(&self) -> Vec<Arc<RegisteredTool>> {
        ToolCategory::ORDERED
            .iter()
            .flat_map(|category| self.list_by_category(*category))
            .collect()
    }

    /// Declarations handed to the adapter, in `all_tools` order.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.all_tools()
            .iter()
            .map(|entry| entry.declaration())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::error::ToolError;
    use crate::tools::traits::ToolContext;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct FakeTool {
        name: &'static str,
        category: ToolCategory,
        priority: u8,
    }

    #[async_trait]
    impl Tool for FakeTool {
        fn name(&self) -> &'static str {
            self.name
        }
        fn description(&self) -> &'static str {
            "fake"
        }
        fn category(&self) -> ToolCategory {
            self.category
        }
        fn priority(&self) -> u8 {
            self.priority
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}, "required": []})
        }
        async fn execute(&self, _ctx: &ToolContext, _args: Value) -> Result<Value, ToolError> {
            Ok(json!({"ok": true}))
        }
    }

    fn fake(name: &'static str, category: ToolCategory, priority: u8) -> Arc<dyn Tool> {
        Arc::new(FakeTool {
            name,
            category,
            priority,
        })
    }

    #[test]
    fn identical_reregistration_is_idempotent() {
        let registry = ToolRegistry::new();
        registry
            .register(fake("read_file", ToolCategory::FileOps, 10))
            .unwrap();
        registry
            .register(fake("read_file", ToolCategory::FileOps, 10))
            .unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn conflicting_reregistration_fails() {
        let registry = ToolRegistry::new();
        registry
            .register(fake("read_file", ToolCategory::FileOps, 10))
            .unwrap();
        let err = registry
            .register(fake("read_file", ToolCategory::Search, 10))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(_)));
    }

    #[test]
    fn external_source_gets_prefixed_on_conflict() {
        let registry = ToolRegistry::new();
        registry
            .register(fake("grep_search", ToolCategory::Search, 10))
            .unwrap();
        let name = registry
            .register_from_source("mcp", fake("grep_search", ToolCategory::Search, 20))
            .unwrap();
        assert_eq!(name, "mcp__grep_search");
        assert!(registry.get("mcp__grep_search").is_ok());
        assert!(registry.get("grep_search").is_ok());
    }

    #[test]
    fn first_external_registrant_owns_bare_name() {
        let registry = ToolRegistry::new();
        let name = registry
            .register_from_source("mcp", fake("custom", ToolCategory::Workspace, 10))
            .unwrap();
        assert_eq!(name, "custom");
    }

    #[test]
    fn category_order_is_priority_then_insertion() {
        let registry = ToolRegistry::new();
        registry
            .register(fake("b_second", ToolCategory::Search, 20))
            .unwrap();
        registry
            .register(fake("a_first", ToolCategory::Search, 10))
            .unwrap();
        registry
            .register(fake("c_tied", ToolCategory::Search, 20))
            .unwrap();

        let names: Vec<String> = registry
            .list_by_category(ToolCategory::Search)
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["a_first", "b_second", "c_tied"]);
    }

    #[test]
    fn all_tools_enumerates_categories_in_fixed_order() {
        let registry = ToolRegistry::new();
        registry
            .register(fake("run", ToolCategory::Execution, 10))
            .unwrap();
        registry
            .register(fake("edit", ToolCategory::CodeEdit, 10))
            .unwrap();
        registry
            .register(fake("read", ToolCategory::FileOps, 10))
            .unwrap();

        let names: Vec<String> = registry
            .all_tools()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["read", "edit", "run"]);
    }

    #[test]
    fn get_unknown_is_not_found() {
        let registry = ToolRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(RegistryError::NotFound(_))
        ));
    }
}
