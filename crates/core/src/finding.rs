//! Findings
//!
//! `RawFinding` is what a tool hands back; `Finding` is the normalized form the
//! aggregator works with. Normalization fixes the issue category slug, fills in
//! the tool's confidence baseline, and derives the deduplication signature.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::category::normalize_issue_category;

// ============================================================================
// Severity
// ============================================================================

/// Finding severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[serde(alias = "info")]
    Low,
    #[serde(alias = "warning")]
    Medium,
    #[serde(alias = "error")]
    High,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "info" | "minor" => Ok(Severity::Low),
            "medium" | "warning" | "moderate" => Ok(Severity::Medium),
            "high" | "error" | "major" => Ok(Severity::High),
            "critical" | "blocker" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

// ============================================================================
// Location
// ============================================================================

/// Inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    /// Build a range, swapping the bounds if given in reverse.
    pub fn new(start: u32, end: u32) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    pub fn single(line: u32) -> Self {
        Self { start: line, end: line }
    }

    pub fn overlaps(&self, other: &LineRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Where a finding applies: a file with an optional line range, and/or a
/// logical entity (class, module, endpoint).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub lines: Option<LineRange>,
    #[serde(default)]
    pub entity: Option<String>,
}

impl Location {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            file: Some(normalize_path(&path.into())),
            lines: None,
            entity: None,
        }
    }

    pub fn lines(path: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            file: Some(normalize_path(&path.into())),
            lines: Some(LineRange::new(start, end)),
            entity: None,
        }
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            file: None,
            lines: None,
            entity: Some(name.into()),
        }
    }

    pub fn with_entity(mut self, name: impl Into<String>) -> Self {
        self.entity = Some(name.into());
        self
    }

    /// Stable textual key; equal keys mean the same location.
    pub fn key(&self) -> String {
        let mut key = self.file.clone().unwrap_or_default();
        if let Some(lines) = self.lines {
            key.push_str(&format!(":{}-{}", lines.start, lines.end));
        }
        if let Some(entity) = &self.entity {
            key.push('#');
            key.push_str(entity);
        }
        key
    }

    /// Whether two locations describe overlapping code.
    ///
    /// Same file with intersecting line ranges overlaps; a missing range
    /// covers the whole file. Entity-only locations overlap by entity name.
    pub fn overlaps(&self, other: &Location) -> bool {
        match (&self.file, &other.file) {
            (Some(a), Some(b)) => {
                if a != b {
                    return false;
                }
                match (self.lines, other.lines) {
                    (Some(x), Some(y)) => x.overlaps(&y),
                    _ => true,
                }
            }
            _ => match (&self.entity, &other.entity) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            },
        }
    }

    fn sort_line(&self) -> u32 {
        self.lines.map(|l| l.start).unwrap_or(0)
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    path.strip_prefix("./").map(str::to_string).unwrap_or(path)
}

// ============================================================================
// RawFinding / Finding
// ============================================================================

/// A finding exactly as a tool reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFinding {
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub location: Location,
    pub category: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl RawFinding {
    pub fn new(category: impl Into<String>, severity: Severity, location: Location) -> Self {
        Self {
            severity,
            location,
            category: category.into(),
            title: String::new(),
            detail: String::new(),
            confidence: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// A normalized finding attributed to one originating tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Location key + normalized category
    pub signature: String,
    pub severity: Severity,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub tool_id: String,
    pub location: Location,
    /// Kebab-case issue category
    pub category: String,
    pub title: String,
    pub detail: String,
    /// Starts tool-local; correlation may merge groups
    pub correlation_group: String,
    /// Other tools that reported the same issue
    #[serde(default)]
    pub corroborating_tools: BTreeSet<String>,
}

impl Finding {
    /// Normalize a raw finding from `tool_id`, using `baseline` when the tool
    /// did not supply a confidence.
    pub fn from_raw(raw: RawFinding, tool_id: &str, baseline: f64) -> Self {
        let category = normalize_issue_category(&raw.category);
        let location = Location {
            file: raw.location.file.as_deref().map(normalize_path),
            ..raw.location
        };
        let signature = format!("{}|{}", location.key(), category);
        let confidence = raw
            .confidence
            .filter(|c| c.is_finite())
            .unwrap_or(baseline)
            .clamp(0.0, 1.0);
        Self {
            correlation_group: format!("{tool_id}/{signature}"),
            signature,
            severity: raw.severity,
            confidence,
            tool_id: tool_id.to_string(),
            location,
            category,
            title: raw.title,
            detail: raw.detail,
            corroborating_tools: BTreeSet::new(),
        }
    }

    /// Every tool that reported this finding: the originator plus corroborators.
    pub fn reporting_tools(&self) -> BTreeSet<String> {
        let mut tools = self.corroborating_tools.clone();
        tools.insert(self.tool_id.clone());
        tools
    }

    /// Report ordering: severity desc, confidence desc, file asc, line asc,
    /// then signature and tool for a total order.
    pub fn report_order(&self, other: &Finding) -> Ordering {
        other
            .severity
            .cmp(&self.severity)
            .then_with(|| other.confidence.total_cmp(&self.confidence))
            .then_with(|| self.location.file.cmp(&other.location.file))
            .then_with(|| self.location.sort_line().cmp(&other.location.sort_line()))
            .then_with(|| self.signature.cmp(&other.signature))
            .then_with(|| self.tool_id.cmp(&other.tool_id))
    }
}
