//! Analysis Requests
//!
//! An `AnalysisRequest` is created once per incoming job and is read-only
//! afterwards. It names the snapshot to analyze, which categories of analysis
//! are wanted, and optionally forces an execution strategy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::category::{best_match, CategoryMatch};

/// Execution strategy for a request's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Stages in order, one tool at a time
    Sequential,
    /// Stages in order, tools within a stage concurrently
    Parallel,
    /// Highest-scored ready tool first, under a cost budget
    PriorityBased,
    /// Pick one of the above from the request's shape
    Adaptive,
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStrategy::Sequential => write!(f, "sequential"),
            ExecutionStrategy::Parallel => write!(f, "parallel"),
            ExecutionStrategy::PriorityBased => write!(f, "priority_based"),
            ExecutionStrategy::Adaptive => write!(f, "adaptive"),
        }
    }
}

impl std::str::FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sequential" => Ok(ExecutionStrategy::Sequential),
            "parallel" => Ok(ExecutionStrategy::Parallel),
            "priority_based" | "priority" => Ok(ExecutionStrategy::PriorityBased),
            "adaptive" => Ok(ExecutionStrategy::Adaptive),
            other => Err(format!("unknown execution strategy: {other}")),
        }
    }
}

/// Which categories of analysis a request wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "categories")]
pub enum CategorySelection {
    All,
    Only(BTreeSet<String>),
}

impl Default for CategorySelection {
    fn default() -> Self {
        CategorySelection::All
    }
}

impl CategorySelection {
    /// Build a selection from a list; an empty list or a literal "all" means all.
    pub fn from_list<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = categories
            .into_iter()
            .map(|c| c.into().trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        if set.is_empty() || set.contains("all") {
            CategorySelection::All
        } else {
            CategorySelection::Only(set)
        }
    }

    /// Number of distinct categories requested; `None` for all.
    pub fn count(&self) -> Option<usize> {
        match self {
            CategorySelection::All => None,
            CategorySelection::Only(set) => Some(set.len()),
        }
    }

    /// How well a tool category matches this selection.
    pub fn relevance(&self, tool_category: &str) -> CategoryMatch {
        match self {
            CategorySelection::All => CategoryMatch::Exact,
            CategorySelection::Only(set) => best_match(tool_category, set),
        }
    }
}

/// Size of the code snapshot, used for adaptive strategy selection and
/// recorded alongside each execution outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSize {
    pub file_count: u64,
    pub total_bytes: u64,
}

/// One incoming analysis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Request identifier
    pub id: String,
    /// Opaque snapshot handle (a path or a knowledge-store collection id)
    pub snapshot: String,
    /// Requested analysis categories
    #[serde(default)]
    pub categories: CategorySelection,
    /// Explicit strategy override; `None` means adaptive
    #[serde(default)]
    pub strategy: Option<ExecutionStrategy>,
    /// Snapshot size
    #[serde(default)]
    pub size: RequestSize,
    /// Project languages, lowercase
    #[serde(default)]
    pub languages: Vec<String>,
    /// Tools that receive the preference bonus
    #[serde(default)]
    pub preferred_tools: BTreeSet<String>,
    /// Tools that must not run
    #[serde(default)]
    pub excluded_tools: BTreeSet<String>,
    /// Whether the caller runs under constrained resources
    #[serde(default)]
    pub constrained_resources: bool,
    /// Cumulative cost budget for priority-based execution
    #[serde(default)]
    pub resource_budget: Option<f64>,
}

impl AnalysisRequest {
    /// Create a request for all categories with an adaptive strategy.
    pub fn new(id: impl Into<String>, snapshot: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            snapshot: snapshot.into(),
            categories: CategorySelection::All,
            strategy: None,
            size: RequestSize::default(),
            languages: Vec::new(),
            preferred_tools: BTreeSet::new(),
            excluded_tools: BTreeSet::new(),
            constrained_resources: false,
            resource_budget: None,
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = CategorySelection::from_list(categories);
        self
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_size(mut self, file_count: u64, total_bytes: u64) -> Self {
        self.size = RequestSize {
            file_count,
            total_bytes,
        };
        self
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages
            .into_iter()
            .map(|l| l.into().to_lowercase())
            .collect();
        self
    }

    pub fn prefer(mut self, tool_id: impl Into<String>) -> Self {
        self.preferred_tools.insert(tool_id.into());
        self
    }

    pub fn exclude(mut self, tool_id: impl Into<String>) -> Self {
        self.excluded_tools.insert(tool_id.into());
        self
    }

    pub fn constrained(mut self) -> Self {
        self.constrained_resources = true;
        self
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.resource_budget = Some(budget);
        self
    }

    /// The strategy the caller asked for, `Adaptive` when none.
    pub fn requested_strategy(&self) -> ExecutionStrategy {
        self.strategy.unwrap_or(ExecutionStrategy::Adaptive)
    }
}
