//! Orchestrator Configuration
//!
//! `OrchestratorConfig` is loaded from TOML. Every field has a default, so an
//! empty file (or no file at all) yields a working configuration:
//!
//! ```toml
//! [scoring]
//! base_priority = 0.3
//! historical_success = 0.3
//!
//! [execution]
//! max_concurrency = 4
//! non_essential_categories = ["quality", "performance"]
//!
//! [execution.tool_timeouts]
//! security_scanner = 600
//!
//! [[tools]]
//! id = "semgrep"
//! category = "security"
//! kind = "command"
//! program = "semgrep"
//! args = ["--json", "{snapshot}"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use review_cascade_core::descriptor::MAX_TIMEOUT_SECS;
use review_cascade_llm::ProviderConfig;

use crate::utils::error::{AppError, AppResult};

// ============================================================================
// Scoring
// ============================================================================

fn default_weight_base_priority() -> f64 {
    0.3
}

fn default_weight_historical_success() -> f64 {
    0.3
}

fn default_weight_relevance() -> f64 {
    0.3
}

fn default_weight_cost() -> f64 {
    0.1
}

fn default_weight_preference() -> f64 {
    0.2
}

/// Weights of the capability score terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_weight_base_priority")]
    pub base_priority: f64,
    #[serde(default = "default_weight_historical_success")]
    pub historical_success: f64,
    #[serde(default = "default_weight_relevance")]
    pub relevance: f64,
    /// Applied only to requests with constrained resources
    #[serde(default = "default_weight_cost")]
    pub cost: f64,
    #[serde(default = "default_weight_preference")]
    pub preference: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            base_priority: default_weight_base_priority(),
            historical_success: default_weight_historical_success(),
            relevance: default_weight_relevance(),
            cost: default_weight_cost(),
            preference: default_weight_preference(),
        }
    }
}

// ============================================================================
// Planning
// ============================================================================

fn default_inclusion_threshold() -> f64 {
    0.4
}

fn default_max_selected_tools() -> Option<usize> {
    Some(8)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningConfig {
    /// Tools must score strictly above this to be selected
    #[serde(default = "default_inclusion_threshold")]
    pub inclusion_threshold: f64,
    /// Cap on selected tools, applied before prerequisite expansion
    #[serde(default = "default_max_selected_tools")]
    pub max_selected_tools: Option<usize>,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            inclusion_threshold: default_inclusion_threshold(),
            max_selected_tools: default_max_selected_tools(),
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

fn default_max_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_non_essential_categories() -> Vec<String> {
    vec![
        "quality".to_string(),
        "performance".to_string(),
        "complexity".to_string(),
    ]
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Retry policy for transient tool errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// No retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    ///
    /// A server-provided retry hint wins when it is longer than the computed
    /// backoff; both are capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32, hint_ms: Option<u64>) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let computed = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent);
        let computed = computed.min(self.max_backoff_ms as f64) as u64;
        let delay = hint_ms.map_or(computed, |hint| hint.max(computed));
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Maximum concurrently running tools
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Timeout for tools without an explicit one
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Per-tool timeout overrides in seconds
    #[serde(default)]
    pub tool_timeouts: BTreeMap<String, u64>,
    /// Categories whose failures do not abort a sequential run
    #[serde(default = "default_non_essential_categories")]
    pub non_essential_categories: Vec<String>,
    /// Resource budget for priority-based runs without their own
    #[serde(default)]
    pub default_resource_budget: Option<f64>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            default_timeout_secs: default_timeout_secs(),
            tool_timeouts: BTreeMap::new(),
            non_essential_categories: default_non_essential_categories(),
            default_resource_budget: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ExecutionConfig {
    /// Effective timeout for a tool: configured override, then the
    /// descriptor's own, then the default.
    pub fn timeout_for(&self, tool_id: &str, descriptor_timeout_secs: Option<u64>) -> Duration {
        let secs = self
            .tool_timeouts
            .get(tool_id)
            .copied()
            .or(descriptor_timeout_secs)
            .unwrap_or(self.default_timeout_secs);
        Duration::from_secs(secs)
    }

    /// Whether a failure in `category` may be tolerated by a sequential run.
    pub fn is_non_essential_category(&self, category: &str) -> bool {
        let category = category.trim().to_lowercase();
        self.non_essential_categories.iter().any(|c| {
            let c = c.trim().to_lowercase();
            category == c || category.starts_with(&format!("{}.", c))
        })
    }
}

// ============================================================================
// Adaptive strategy selection
// ============================================================================

fn default_overload_factor() -> f64 {
    2.0
}

fn default_small_request_max_files() -> u64 {
    50
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Priority-based once the tool count exceeds concurrency by this factor
    #[serde(default = "default_overload_factor")]
    pub overload_factor: f64,
    /// Requests up to this many files count as small
    #[serde(default = "default_small_request_max_files")]
    pub small_request_max_files: u64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            overload_factor: default_overload_factor(),
            small_request_max_files: default_small_request_max_files(),
        }
    }
}

// ============================================================================
// Aggregation
// ============================================================================

fn default_corroboration_bonus() -> f64 {
    0.1
}

fn default_max_corroboration_bonus() -> f64 {
    0.2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Confidence added per corroborating tool
    #[serde(default = "default_corroboration_bonus")]
    pub corroboration_bonus: f64,
    /// Cap on the total corroboration bonus
    #[serde(default = "default_max_corroboration_bonus")]
    pub max_corroboration_bonus: f64,
    /// Additional related issue-category pairs
    #[serde(default)]
    pub related_categories: Vec<[String; 2]>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            corroboration_bonus: default_corroboration_bonus(),
            max_corroboration_bonus: default_max_corroboration_bonus(),
            related_categories: Vec::new(),
        }
    }
}

// ============================================================================
// Learning
// ============================================================================

fn default_smoothing() -> f64 {
    0.3
}

fn default_history_limit() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    /// EMA smoothing factor in (0, 1]
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    /// Execution records retained per tool
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Load from and save to this file when set
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            smoothing: default_smoothing(),
            history_limit: default_history_limit(),
            store_path: None,
        }
    }
}

// ============================================================================
// Tools
// ============================================================================

/// How a configured tool is implemented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolKind {
    /// External analyzer process
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        working_dir: Option<PathBuf>,
        #[serde(default)]
        env: BTreeMap<String, String>,
        #[serde(default)]
        success_codes: Option<Vec<i32>>,
    },
    /// Analysis by the configured reasoning provider
    Reasoning {
        #[serde(default)]
        instructions: Option<String>,
    },
}

/// A `[[tools]]` entry. Unset descriptor fields fall back to the built-in
/// catalog entry with the same id, when there is one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub prerequisites: Option<Vec<String>>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub priority: Option<f64>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub confidence_baseline: Option<f64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub essential: bool,
    #[serde(flatten)]
    pub kind: ToolKind,
}

// ============================================================================
// Root
// ============================================================================

fn default_use_builtin_catalog() -> bool {
    true
}

/// Complete orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub planning: PlanningConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub adaptive: AdaptiveConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    /// Reasoning provider for reasoning tools
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    /// Register the built-in catalog as reasoning tools when a provider is set
    #[serde(default = "default_use_builtin_catalog")]
    pub use_builtin_catalog: bool,
    #[serde(default)]
    pub tools: Vec<ToolEntry>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringWeights::default(),
            planning: PlanningConfig::default(),
            execution: ExecutionConfig::default(),
            adaptive: AdaptiveConfig::default(),
            aggregation: AggregationConfig::default(),
            learning: LearningConfig::default(),
            provider: None,
            use_builtin_catalog: default_use_builtin_catalog(),
            tools: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> AppResult<Self> {
        let config: OrchestratorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), tools = config.tools.len(), "loaded configuration");
        Ok(config)
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> AppResult<()> {
        let weights = [
            ("scoring.base_priority", self.scoring.base_priority),
            ("scoring.historical_success", self.scoring.historical_success),
            ("scoring.relevance", self.scoring.relevance),
            ("scoring.cost", self.scoring.cost),
            ("scoring.preference", self.scoring.preference),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        let threshold = self.planning.inclusion_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(AppError::config(format!(
                "planning.inclusion_threshold must be non-negative, got {}",
                threshold
            )));
        }
        if self.planning.max_selected_tools == Some(0) {
            return Err(AppError::config("planning.max_selected_tools must be at least 1"));
        }

        if self.execution.max_concurrency == 0 {
            return Err(AppError::config("execution.max_concurrency must be at least 1"));
        }
        let timeouts = std::iter::once((
            "execution.default_timeout_secs".to_string(),
            self.execution.default_timeout_secs,
        ))
        .chain(
            self.execution
                .tool_timeouts
                .iter()
                .map(|(tool, secs)| (format!("execution.tool_timeouts.{}", tool), *secs)),
        );
        for (name, secs) in timeouts {
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                return Err(AppError::config(format!(
                    "{} must be between 1 and {} seconds, got {}",
                    name, MAX_TIMEOUT_SECS, secs
                )));
            }
        }
        if let Some(budget) = self.execution.default_resource_budget {
            if !budget.is_finite() || budget < 0.0 {
                return Err(AppError::config(format!(
                    "execution.default_resource_budget must be non-negative, got {}",
                    budget
                )));
            }
        }
        let retry = &self.execution.retry;
        if retry.max_attempts == 0 {
            return Err(AppError::config("execution.retry.max_attempts must be at least 1"));
        }
        if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
            return Err(AppError::config("execution.retry.multiplier must be at least 1.0"));
        }

        if !self.adaptive.overload_factor.is_finite() || self.adaptive.overload_factor < 1.0 {
            return Err(AppError::config("adaptive.overload_factor must be at least 1.0"));
        }

        let aggregation = &self.aggregation;
        for (name, value) in [
            ("aggregation.corroboration_bonus", aggregation.corroboration_bonus),
            ("aggregation.max_corroboration_bonus", aggregation.max_corroboration_bonus),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        let smoothing = self.learning.smoothing;
        if !(smoothing > 0.0 && smoothing <= 1.0) {
            return Err(AppError::config(format!(
                "learning.smoothing must be within (0, 1], got {}",
                smoothing
            )));
        }
        if self.learning.history_limit == 0 {
            return Err(AppError::config("learning.history_limit must be at least 1"));
        }

        let mut seen = std::collections::BTreeSet::new();
        for entry in &self.tools {
            if entry.id.trim().is_empty() {
                return Err(AppError::config("tools entries need a non-empty id"));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(AppError::config(format!("tool '{}' is configured twice", entry.id)));
            }
            if matches!(entry.kind, ToolKind::Reasoning { .. }) && self.provider.is_none() {
                return Err(AppError::config(format!(
                    "tool '{}' is a reasoning tool but no [provider] is configured",
                    entry.id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = OrchestratorConfig::from_toml_str("").unwrap();
        assert_eq!(config, OrchestratorConfig::default());
        assert_eq!(config.planning.inclusion_threshold, 0.4);
        assert_eq!(config.planning.max_selected_tools, Some(8));
        assert_eq!(config.execution.max_concurrency, 4);
        assert!(config.use_builtin_catalog);
    }

    #[test]
    fn test_partial_sections() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            [scoring]
            relevance = 0.5

            [execution]
            max_concurrency = 8

            [execution.tool_timeouts]
            security_scanner = 600

            [execution.retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.scoring.relevance, 0.5);
        assert_eq!(config.scoring.base_priority, 0.3);
        assert_eq!(config.execution.max_concurrency, 8);
        assert_eq!(config.execution.retry.max_attempts, 5);
        assert_eq!(config.execution.retry.initial_backoff_ms, 500);
        assert_eq!(
            config.execution.timeout_for("security_scanner", Some(30)),
            Duration::from_secs(600)
        );
        assert_eq!(
            config.execution.timeout_for("other", Some(30)),
            Duration::from_secs(30)
        );
        assert_eq!(config.execution.timeout_for("other", None), Duration::from_secs(300));
    }

    #[test]
    fn test_tool_entries() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            [provider]
            base_url = "http://localhost:11434/v1"
            model = "qwen2.5-coder"

            [[tools]]
            id = "semgrep"
            category = "security"
            kind = "command"
            program = "semgrep"
            args = ["--json", "{snapshot}"]
            essential = true

            [[tools]]
            id = "god_classes"
            kind = "reasoning"
            "#,
        )
        .unwrap();
        assert_eq!(config.tools.len(), 2);
        assert!(config.tools[0].essential);
        assert!(matches!(
            &config.tools[0].kind,
            ToolKind::Command { program, .. } if program == "semgrep"
        ));
        assert!(matches!(config.tools[1].kind, ToolKind::Reasoning { instructions: None }));
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            "[execution]\nmax_concurrency = 0",
            "[execution]\ndefault_timeout_secs = 0",
            "[execution]\ndefault_timeout_secs = 9223372036854775807",
            "[execution.tool_timeouts]\nsemgrep = 604801",
            "[learning]\nsmoothing = 0.0",
            "[learning]\nsmoothing = 1.5",
            "[scoring]\ncost = -1.0",
            "[aggregation]\nmax_corroboration_bonus = 2.0",
            "[adaptive]\noverload_factor = 0.5",
            "[execution.retry]\nmax_attempts = 0",
            "[[tools]]\nid = \"x\"\nkind = \"reasoning\"",
            concat!(
                "[[tools]]\nid = \"x\"\nkind = \"command\"\nprogram = \"a\"\n",
                "[[tools]]\nid = \"x\"\nkind = \"command\"\nprogram = \"b\"",
            ),
        ];
        for case in cases {
            match OrchestratorConfig::from_toml_str(case) {
                Err(AppError::Config(_)) => {}
                other => panic!("expected config error for {:?}, got {:?}", case, other),
            }
        }
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            OrchestratorConfig::from_toml_str("[execution\n"),
            Err(AppError::Toml(_))
        ));
    }

    #[test]
    fn test_non_essential_category_matching() {
        let exec = ExecutionConfig::default();
        assert!(exec.is_non_essential_category("quality"));
        assert!(exec.is_non_essential_category("complexity.functions"));
        assert!(!exec.is_non_essential_category("security"));
        assert!(!exec.is_non_essential_category("qualityx"));
    }

    #[test]
    fn test_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1, None), Duration::from_millis(500));
        assert_eq!(policy.backoff(2, None), Duration::from_millis(1000));
        assert_eq!(policy.backoff(10, None), Duration::from_millis(10_000));
        assert_eq!(policy.backoff(1, Some(2000)), Duration::from_millis(2000));
        assert_eq!(policy.backoff(1, Some(60_000)), Duration::from_millis(10_000));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cascade.toml");
        std::fs::write(&path, "[planning]\ninclusion_threshold = 0.5\n").unwrap();
        let config = OrchestratorConfig::load(&path).unwrap();
        assert_eq!(config.planning.inclusion_threshold, 0.5);
    }
}
