//! Correlation
//!
//! Links findings from different tools that point at overlapping code with
//! related issue categories. Linked findings share one correlation group,
//! the smallest group id among them.

use std::collections::{BTreeMap, BTreeSet};

use review_cascade_core::{normalize_issue_category, Finding};

/// Issue categories that describe facets of the same underlying problem.
const BUILTIN_RELATIONS: &[(&str, &str)] = &[
    ("high-complexity", "god-class"),
    ("high-complexity", "maintainability"),
    ("god-class", "maintainability"),
    ("god-class", "single-responsibility"),
    ("circular-dependency", "coupling"),
    ("circular-dependency", "architecture"),
    ("coupling", "architecture"),
    ("outdated-dependency", "vulnerable-dependency"),
    ("vulnerable-dependency", "security"),
    ("hardcoded-secret", "exposed-secret"),
    ("hardcoded-secret", "credentials"),
    ("exposed-secret", "credentials"),
    ("sql-injection", "injection"),
    ("command-injection", "injection"),
    ("xss", "injection"),
    ("idor", "authorization"),
    ("idor", "access-control"),
    ("authorization", "access-control"),
    ("performance", "high-complexity"),
    ("code-smell", "maintainability"),
];

/// Symmetric relation over issue categories. Every category relates to
/// itself.
#[derive(Debug, Clone, Default)]
pub struct RelationTable {
    pairs: BTreeSet<(String, String)>,
}

impl RelationTable {
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for (a, b) in BUILTIN_RELATIONS {
            table.insert(a, b);
        }
        table
    }

    /// Add configured pairs; categories are normalized first.
    pub fn with_pairs(mut self, pairs: &[[String; 2]]) -> Self {
        for [a, b] in pairs {
            self.insert(a, b);
        }
        self
    }

    fn insert(&mut self, a: &str, b: &str) {
        let a = normalize_issue_category(a);
        let b = normalize_issue_category(b);
        if a.is_empty() || b.is_empty() || a == b {
            return;
        }
        self.pairs.insert(Self::key(a, b));
    }

    fn key(a: String, b: String) -> (String, String) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn related(&self, a: &str, b: &str) -> bool {
        a == b || self.pairs.contains(&Self::key(a.to_string(), b.to_string()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Disjoint-set forest over finding indices.
struct Groups {
    parent: Vec<usize>,
}

impl Groups {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

fn correlated(a: &Finding, b: &Finding, relations: &RelationTable) -> bool {
    a.tool_id != b.tool_id
        && a.location.overlaps(&b.location)
        && relations.related(&a.category, &b.category)
}

/// Merge correlation groups in place. Returns the number of groups that
/// span more than one finding.
pub fn correlate(findings: &mut [Finding], relations: &RelationTable) -> usize {
    let mut groups = Groups::new(findings.len());
    for i in 0..findings.len() {
        for j in (i + 1)..findings.len() {
            if correlated(&findings[i], &findings[j], relations) {
                groups.union(i, j);
            }
        }
    }

    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for index in 0..findings.len() {
        members.entry(groups.find(index)).or_default().push(index);
    }

    let mut merged = 0;
    for indices in members.values().filter(|m| m.len() > 1) {
        let Some(group) = indices
            .iter()
            .map(|&i| findings[i].correlation_group.clone())
            .min()
        else {
            continue;
        };
        for &i in indices {
            findings[i].correlation_group = group.clone();
        }
        merged += 1;
    }

    if merged > 0 {
        tracing::debug!(groups = merged, "correlated findings across tools");
    }
    merged
}
