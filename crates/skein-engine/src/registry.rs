//! Registries for tools and language-model adapters.
//!
//! Both are read-mostly shared maps: registered once at wiring time, then
//! consulted by every execution. Thread-safe via `tokio::sync::RwLock`.

use std::collections::HashMap;
use std::sync::Arc;

use skein_core::{LlmAdapter, SkillTool, ToolDefinition};
use tokio::sync::RwLock;

/// Registry of executable tools, keyed by tool name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn SkillTool>>>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its definition name.
    pub async fn register(&self, tool: Arc<dyn SkillTool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_string(), tool);
    }

    /// Removes a tool, returning it when it was registered.
    pub async fn unregister(&self, name: &str) -> Option<Arc<dyn SkillTool>> {
        let mut tools = self.tools.write().await;
        tools.remove(name)
    }

    /// Looks a tool up by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn SkillTool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// Whether a tool is registered.
    pub async fn contains(&self, name: &str) -> bool {
        let tools = self.tools.read().await;
        tools.contains_key(name)
    }

    /// Definitions of every registered tool.
    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        tools.values().map(|t| t.definition().clone()).collect()
    }

    /// Number of registered tools.
    pub async fn count(&self) -> usize {
        let tools = self.tools.read().await;
        tools.len()
    }
}

/// Registry of language-model adapters with a default slot.
///
/// The first registered adapter becomes the default; PROMPT steps use the
/// default unless the embedder reassigns it.
#[derive(Default)]
pub struct LlmRegistry {
    adapters: Arc<RwLock<HashMap<String, Arc<dyn LlmAdapter>>>>,
    default_name: Arc<RwLock<Option<String>>>,
}

impl LlmRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own name. The first registration
    /// becomes the default.
    pub async fn register(&self, adapter: Arc<dyn LlmAdapter>) {
        let name = adapter.name().to_string();
        let mut adapters = self.adapters.write().await;
        adapters.insert(name.clone(), adapter);
        let mut default_name = self.default_name.write().await;
        if default_name.is_none() {
            *default_name = Some(name);
        }
    }

    /// Makes a registered adapter the default. Returns false when the name
    /// is unknown.
    pub async fn set_default(&self, name: &str) -> bool {
        let adapters = self.adapters.read().await;
        if !adapters.contains_key(name) {
            return false;
        }
        drop(adapters);
        let mut default_name = self.default_name.write().await;
        *default_name = Some(name.to_string());
        true
    }

    /// Looks an adapter up by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn LlmAdapter>> {
        let adapters = self.adapters.read().await;
        adapters.get(name).cloned()
    }

    /// The default adapter, when one is registered.
    pub async fn default_adapter(&self) -> Option<Arc<dyn LlmAdapter>> {
        let name = self.default_name.read().await.clone()?;
        self.get(&name).await
    }
}
