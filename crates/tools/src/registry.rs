//! Tool Registry
//!
//! Holds every registered analysis tool together with its descriptor.
//! Registration validates descriptors, checks that prerequisites exist and
//! rejects cycles, so a request's planning phase can trust the graph it reads.
//!
//! Mutation is rare and administrative; it takes the write lock. Requests
//! take a `RegistrySnapshot` once and plan against it without further locking.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use review_cascade_core::category::normalize_tool_category;
use review_cascade_core::graph::layer_graph;
use review_cascade_core::{AnalysisTool, CoreError, CoreResult, ToolDescriptor};

/// Registry for analysis tools, keyed by identity.
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<dyn AnalysisTool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register one tool.
    ///
    /// Fails with `DuplicateTool` on an existing identity, `UnknownTool` when a
    /// prerequisite is not registered yet, and `Validation`/`DependencyCycle`
    /// for malformed descriptors.
    pub fn register(&self, tool: Arc<dyn AnalysisTool>) -> CoreResult<()> {
        self.register_all(vec![tool])
    }

    /// Register a batch of tools atomically, in any order.
    ///
    /// Prerequisites may point at tools already registered or at other tools
    /// in the batch. Nothing is registered if any tool is rejected.
    pub fn register_all(&self, batch: Vec<Arc<dyn AnalysisTool>>) -> CoreResult<()> {
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());

        let mut incoming: BTreeMap<String, Arc<dyn AnalysisTool>> = BTreeMap::new();
        for tool in batch {
            let descriptor = tool.descriptor();
            descriptor.validate()?;
            if tools.contains_key(&descriptor.id) || incoming.contains_key(&descriptor.id) {
                return Err(CoreError::duplicate_tool(&descriptor.id));
            }
            incoming.insert(descriptor.id.clone(), tool);
        }

        for (id, tool) in &incoming {
            for prerequisite in &tool.descriptor().prerequisites {
                if !tools.contains_key(prerequisite) && !incoming.contains_key(prerequisite) {
                    return Err(CoreError::unknown_tool(format!(
                        "{prerequisite} (prerequisite of {id})"
                    )));
                }
            }
        }

        // Existing tools are acyclic and cannot depend on new ones, so only
        // the incoming batch can close a cycle.
        let graph: BTreeMap<String, BTreeSet<String>> = incoming
            .iter()
            .map(|(id, tool)| (id.clone(), tool.descriptor().prerequisites.clone()))
            .collect();
        layer_graph(&graph)?;

        for (id, tool) in incoming {
            tracing::debug!(
                tool_id = %id,
                category = %tool.descriptor().category,
                prerequisites = tool.descriptor().prerequisites.len(),
                "registered tool"
            );
            tools.insert(id, tool);
        }
        Ok(())
    }

    /// Remove a tool. Refuses while other tools declare it as a prerequisite.
    pub fn unregister(&self, id: &str) -> CoreResult<Arc<dyn AnalysisTool>> {
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        if !tools.contains_key(id) {
            return Err(CoreError::unknown_tool(id));
        }
        let dependents: Vec<&str> = tools
            .values()
            .filter(|t| t.descriptor().prerequisites.contains(id))
            .map(|t| t.id())
            .collect();
        if !dependents.is_empty() {
            return Err(CoreError::validation(format!(
                "cannot unregister '{}': required by {}",
                id,
                dependents.join(", ")
            )));
        }
        tools
            .remove(id)
            .ok_or_else(|| CoreError::unknown_tool(id))
    }

    /// Descriptor of one tool.
    pub fn get(&self, id: &str) -> CoreResult<ToolDescriptor> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        tools
            .get(id)
            .map(|t| t.descriptor().clone())
            .ok_or_else(|| CoreError::unknown_tool(id))
    }

    /// Executable handle of one tool.
    pub fn tool(&self, id: &str) -> CoreResult<Arc<dyn AnalysisTool>> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        tools
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::unknown_tool(id))
    }

    /// Descriptors in identity order, optionally limited to a category and
    /// its sub-categories.
    pub fn list(&self, category: Option<&str>) -> Vec<ToolDescriptor> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        tools
            .values()
            .map(|t| t.descriptor())
            .filter(|d| category.map_or(true, |c| within_category(&d.category, c)))
            .cloned()
            .collect()
    }

    /// Consistent read-only view for one request.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        RegistrySnapshot {
            tools: tools.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether `category` equals `filter` or lies beneath it.
fn within_category(category: &str, filter: &str) -> bool {
    let filter = normalize_tool_category(filter);
    category == filter || category.starts_with(&format!("{filter}."))
}

// ============================================================================
// RegistrySnapshot
// ============================================================================

/// Immutable copy of the registry taken at the start of a request.
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    tools: BTreeMap<String, Arc<dyn AnalysisTool>>,
}

impl RegistrySnapshot {
    /// Build a snapshot directly from tools, without registry validation.
    ///
    /// Planning still detects cycles; this exists for callers that assemble
    /// ad-hoc tool sets.
    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn AnalysisTool>>) -> Self {
        Self {
            tools: tools
                .into_iter()
                .map(|t| (t.id().to_string(), t))
                .collect(),
        }
    }

    pub fn descriptors(&self) -> BTreeMap<String, ToolDescriptor> {
        self.tools
            .iter()
            .map(|(id, t)| (id.clone(), t.descriptor().clone()))
            .collect()
    }

    pub fn descriptor(&self, id: &str) -> CoreResult<&ToolDescriptor> {
        self.tools
            .get(id)
            .map(|t| t.descriptor())
            .ok_or_else(|| CoreError::unknown_tool(id))
    }

    pub fn tool(&self, id: &str) -> CoreResult<Arc<dyn AnalysisTool>> {
        self.tools
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::unknown_tool(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
