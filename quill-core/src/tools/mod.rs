//! Tool system: trait, registry, and built-in implementations.

pub mod command;
pub mod edit;
pub mod error;
pub mod file_ops;
pub mod patch;
pub mod path;
pub mod registry;
pub mod search;
pub mod traits;

use std::sync::Arc;

pub use command::{ExecuteCommandTool, ExecuteProgramTool};
pub use edit::{EditLinesTool, PreviewReplaceTool, ReplaceInFileTool};
pub use error::{ToolError, ToolErrorKind};
pub use file_ops::{ListDirTool, ReadFileTool, WriteFileTool};
pub use patch::{ApplyPatchTool, SemanticPatchTool};
pub use registry::{RegisteredTool, RegistryError, ToolRegistry};
pub use search::{GrepSearchTool, SearchFilesTool};
pub use traits::{Tool, ToolCategory, ToolContext};

/// Build a registry loaded with every built-in tool.
pub fn builtin_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    register_builtins(&registry);
    registry
}

/// Register the built-in tools. Registration is idempotent, so calling this
/// on an already-seeded registry is harmless.
pub fn register_builtins(registry: &ToolRegistry) {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(ReadFileTool),
        Arc::new(WriteFileTool),
        Arc::new(ListDirTool),
        Arc::new(ReplaceInFileTool),
        Arc::new(PreviewReplaceTool),
        Arc::new(EditLinesTool),
        Arc::new(SemanticPatchTool),
        Arc::new(ApplyPatchTool),
        Arc::new(SearchFilesTool),
        Arc::new(GrepSearchTool),
        Arc::new(ExecuteProgramTool),
        Arc::new(ExecuteCommandTool),
    ];
    for tool in tools {
        // Identical re-registration is a no-op by contract.
        registry
            .register(tool)
            .expect("built-in tool names are unique");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_all_tools() {
        let registry = builtin_registry();
        assert_eq!(registry.len(), 12);
        assert!(registry.get("read_file").is_ok());
        assert!(registry.get("semantic_patch").is_ok());
        assert!(registry.get("execute_program").is_ok());
    }

    #[test]
    fn registering_builtins_twice_is_idempotent() {
        let registry = builtin_registry();
        register_builtins(&registry);
        assert_eq!(registry.len(), 12);
    }

    #[test]
    fn execute_program_is_preferred_over_execute_command() {
        let registry = builtin_registry();
        let execution = registry.list_by_category(ToolCategory::Execution);
        assert_eq!(execution[0].name, "execute_program");
        assert_eq!(execution[1].name, "execute_command");
    }

    #[test]
    fn declarations_cover_every_tool_in_category_order() {
        let registry = builtin_registry();
        let declarations = registry.declarations();
        assert_eq!(declarations.len(), 12);
        // file-ops lead the enumeration.
        assert_eq!(declarations[0].name, "read_file");
        // Every declaration carries an object schema with a required list.
        for declaration in &declarations {
            assert_eq!(declaration.parameters["type"], "object");
            assert!(declaration.parameters["required"].is_array());
        }
    }
}
