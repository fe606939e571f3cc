//! Deduplication
//!
//! Findings sharing a signature (normalized location + issue category)
//! describe the same issue, whichever tool reported it. The most confident
//! report is kept; the other reporting tools become its corroborators and
//! raise its confidence by a bounded bonus.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use review_cascade_core::{CoreError, Finding, Severity};

/// Duplicates that disagreed on severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationConflict {
    pub signature: String,
    /// Tool whose report was kept
    pub kept_tool: String,
    pub kept_severity: Severity,
    /// Highest severity each reporting tool assigned
    pub severities: BTreeMap<String, Severity>,
}

impl AggregationConflict {
    fn describe(&self) -> String {
        self.severities
            .iter()
            .map(|(tool, severity)| format!("{tool}={severity}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Winner ordering: confidence desc, severity desc, tool asc, then text.
fn winner_order(a: &Finding, b: &Finding) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.severity.cmp(&a.severity))
        .then_with(|| a.tool_id.cmp(&b.tool_id))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.detail.cmp(&b.detail))
}

/// Collapse duplicates. Output is ordered by signature.
pub fn deduplicate(
    findings: Vec<Finding>,
    bonus_per_tool: f64,
    max_bonus: f64,
) -> (Vec<Finding>, Vec<AggregationConflict>) {
    let mut groups: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
    for finding in findings {
        groups
            .entry(finding.signature.clone())
            .or_default()
            .push(finding);
    }

    let mut kept = Vec::with_capacity(groups.len());
    let mut conflicts = Vec::new();

    for (signature, mut members) in groups {
        members.sort_by(winner_order);
        let mut members = members.into_iter();
        let Some(mut winner) = members.next() else {
            continue;
        };

        let mut severities: BTreeMap<String, Severity> = BTreeMap::new();
        severities.insert(winner.tool_id.clone(), winner.severity);
        let mut reporters: BTreeSet<String> = winner.corroborating_tools.clone();

        for duplicate in members {
            let severity = severities
                .entry(duplicate.tool_id.clone())
                .or_insert(duplicate.severity);
            *severity = (*severity).max(duplicate.severity);
            reporters.extend(duplicate.reporting_tools());
        }
        reporters.remove(&winner.tool_id);

        let corroborators = reporters.len();
        if corroborators > 0 {
            let bonus = (bonus_per_tool * corroborators as f64).min(max_bonus).max(0.0);
            winner.confidence = (winner.confidence + bonus).min(1.0);
        }
        winner.corroborating_tools = reporters;

        let distinct: BTreeSet<Severity> = severities.values().copied().collect();
        if distinct.len() > 1 {
            let conflict = AggregationConflict {
                signature: signature.clone(),
                kept_tool: winner.tool_id.clone(),
                kept_severity: winner.severity,
                severities,
            };
            let err = CoreError::aggregation_conflict(&signature, conflict.describe());
            tracing::warn!(
                signature = %signature,
                kept_tool = %conflict.kept_tool,
                error = %err,
                "duplicate findings disagree on severity"
            );
            conflicts.push(conflict);
        }

        kept.push(winner);
    }

    (kept, conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_cascade_core::{Location, RawFinding};

    fn finding(tool: &str, severity: Severity, confidence: f64) -> Finding {
        Finding::from_raw(
            RawFinding::new("Hardcoded Secret", severity, Location::lines("src/config.py", 12, 12))
                .with_confidence(confidence),
            tool,
            0.5,
        )
    }

    #[test]
    fn test_duplicate_collapses_with_bonus() {
        let (kept, conflicts) = deduplicate(
            vec![
                finding("security_scanner", Severity::High, 0.7),
                finding("hardcoded_secrets", Severity::High, 0.9),
            ],
            0.1,
            0.2,
        );

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].tool_id, "hardcoded_secrets");
        assert!((kept[0].confidence - 1.0).abs() < 1e-9);
        assert!(kept[0].corroborating_tools.contains("security_scanner"));
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_bonus_is_capped() {
        let (kept, _) = deduplicate(
            vec![
                finding("a", Severity::High, 0.5),
                finding("b", Severity::High, 0.4),
                finding("c", Severity::High, 0.4),
                finding("d", Severity::High, 0.4),
            ],
            0.1,
            0.2,
        );
        assert_eq!(kept[0].tool_id, "a");
        assert_eq!(kept[0].corroborating_tools.len(), 3);
        assert!((kept[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_same_tool_duplicate_earns_no_bonus() {
        let (kept, _) = deduplicate(
            vec![finding("a", Severity::Low, 0.6), finding("a", Severity::Low, 0.6)],
            0.1,
            0.2,
        );
        assert_eq!(kept.len(), 1);
        assert!(kept[0].corroborating_tools.is_empty());
        assert!((kept[0].confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_tie_prefers_severity_then_tool() {
        let (kept, conflicts) = deduplicate(
            vec![
                finding("zeta", Severity::Critical, 0.8),
                finding("alpha", Severity::Medium, 0.8),
            ],
            0.0,
            0.0,
        );
        assert_eq!(kept[0].tool_id, "zeta");

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kept_severity, Severity::Critical);
        assert_eq!(conflicts[0].severities.get("alpha"), Some(&Severity::Medium));

        let (kept, _) = deduplicate(
            vec![finding("zeta", Severity::High, 0.8), finding("alpha", Severity::High, 0.8)],
            0.0,
            0.0,
        );
        assert_eq!(kept[0].tool_id, "alpha");
    }

    #[test]
    fn test_distinct_signatures_are_kept_apart() {
        let other = Finding::from_raw(
            RawFinding::new("sql injection", Severity::High, Location::lines("src/db.py", 3, 3)),
            "security_scanner",
            0.8,
        );
        let (kept, _) = deduplicate(
            vec![finding("security_scanner", Severity::High, 0.7), other],
            0.1,
            0.2,
        );
        assert_eq!(kept.len(), 2);
        assert!(kept[0].signature < kept[1].signature);
    }
}
