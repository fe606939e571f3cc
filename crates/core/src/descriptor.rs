//! Tool Descriptors
//!
//! A `ToolDescriptor` is the declared contract of one analysis capability:
//! identity, category, prerequisites, cost and priority. The orchestrator never
//! looks past the descriptor into a tool's logic.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::category::normalize_tool_category;
use crate::error::{CoreError, CoreResult};

/// Longest timeout any tool may be given: one week.
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

fn default_confidence_baseline() -> f64 {
    0.8
}

fn default_schema() -> String {
    "findings/v1".to_string()
}

/// Declared contract of one analysis tool. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique identity (e.g. "static_analyzer")
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Dot-separated category path (e.g. "security.secrets")
    pub category: String,
    /// Tools that must have succeeded before this one may run
    #[serde(default)]
    pub prerequisites: BTreeSet<String>,
    /// Relative resource cost (expected CPU-seconds)
    #[serde(default)]
    pub estimated_cost: f64,
    /// Static priority weight in [0, 1]
    #[serde(default)]
    pub base_priority: f64,
    /// Input/output schema tag
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Compatible project languages; empty means any
    #[serde(default)]
    pub languages: Vec<String>,
    /// Confidence assigned to findings that do not carry one
    #[serde(default = "default_confidence_baseline")]
    pub confidence_baseline: f64,
    /// Per-tool timeout override in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Failure of an essential tool fails the whole request
    #[serde(default)]
    pub essential: bool,
}

impl ToolDescriptor {
    /// Create a descriptor with neutral defaults.
    pub fn new(id: impl Into<String>, category: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            category: normalize_tool_category(&category.into()),
            prerequisites: BTreeSet::new(),
            estimated_cost: 1.0,
            base_priority: 0.5,
            schema: default_schema(),
            languages: Vec::new(),
            confidence_baseline: default_confidence_baseline(),
            timeout_secs: None,
            essential: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_prerequisite(mut self, tool_id: impl Into<String>) -> Self {
        self.prerequisites.insert(tool_id.into());
        self
    }

    pub fn with_prerequisites<I, S>(mut self, tool_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites.extend(tool_ids.into_iter().map(Into::into));
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = cost;
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.base_priority = priority;
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
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

    pub fn with_confidence_baseline(mut self, confidence: f64) -> Self {
        self.confidence_baseline = confidence;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn essential(mut self) -> Self {
        self.essential = true;
        self
    }

    /// Check the descriptor's own fields. Prerequisite existence is the
    /// registry's concern.
    pub fn validate(&self) -> CoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(CoreError::validation("tool identity must not be empty"));
        }
        if self.schema.trim().is_empty() {
            return Err(CoreError::validation(format!(
                "tool '{}' has an empty schema tag",
                self.id
            )));
        }
        if normalize_tool_category(&self.category).is_empty() {
            return Err(CoreError::validation(format!(
                "tool '{}' has an empty category",
                self.id
            )));
        }
        if !self.estimated_cost.is_finite() || self.estimated_cost < 0.0 {
            return Err(CoreError::validation(format!(
                "tool '{}' has invalid estimated cost {}",
                self.id, self.estimated_cost
            )));
        }
        if !(0.0..=1.0).contains(&self.base_priority) {
            return Err(CoreError::validation(format!(
                "tool '{}' base priority {} is outside [0, 1]",
                self.id, self.base_priority
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_baseline) {
            return Err(CoreError::validation(format!(
                "tool '{}' confidence baseline {} is outside [0, 1]",
                self.id, self.confidence_baseline
            )));
        }
        if let Some(secs) = self.timeout_secs {
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                return Err(CoreError::validation(format!(
                    "tool '{}' timeout must be between 1 and {} seconds, got {}",
                    self.id, MAX_TIMEOUT_SECS, secs
                )));
            }
        }
        if self.prerequisites.contains(&self.id) {
            return Err(CoreError::dependency_cycle(vec![self.id.clone()]));
        }
        Ok(())
    }

    /// Whether the tool can analyze a project written in `languages`.
    ///
    /// Tools without declared languages, or requests without known languages,
    /// are always compatible.
    pub fn supports_languages(&self, languages: &[String]) -> bool {
        if self.languages.is_empty() || languages.is_empty() {
            return true;
        }
        if self.languages.iter().any(|l| l == "all") {
            return true;
        }
        languages
            .iter()
            .any(|wanted| self.languages.iter().any(|l| l.eq_ignore_ascii_case(wanted)))
    }
}
