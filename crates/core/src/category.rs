//! Category Matching
//!
//! Tool categories are dot-separated paths (`security`, `security.secrets`).
//! Issue categories reported by tools are free text and are normalized into
//! kebab-case slugs (`"High Complexity"` -> `high-complexity`) before they
//! take part in deduplication.

use serde::{Deserialize, Serialize};

/// How well a tool category matches a requested category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMatch {
    None,
    Partial,
    Exact,
}

impl CategoryMatch {
    /// Relevance value used by the scorer.
    pub fn relevance(&self) -> f64 {
        match self {
            CategoryMatch::Exact => 1.0,
            CategoryMatch::Partial => 0.5,
            CategoryMatch::None => 0.0,
        }
    }
}

/// Normalize a tool category path: lowercase, trimmed, `/` treated as `.`.
pub fn normalize_tool_category(category: &str) -> String {
    category
        .trim()
        .to_lowercase()
        .replace('/', ".")
        .split('.')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

fn top_level(category: &str) -> &str {
    category.split('.').next().unwrap_or(category)
}

/// Compare a tool's category with one requested category.
///
/// Exact when the normalized paths are equal. Partial when one is a dotted
/// prefix of the other, or both share the same top-level segment.
pub fn match_category(tool_category: &str, requested: &str) -> CategoryMatch {
    let tool = normalize_tool_category(tool_category);
    let wanted = normalize_tool_category(requested);

    if tool.is_empty() || wanted.is_empty() {
        return CategoryMatch::None;
    }
    if tool == wanted {
        return CategoryMatch::Exact;
    }
    let is_prefix = |a: &str, b: &str| b.starts_with(a) && b[a.len()..].starts_with('.');
    if is_prefix(&tool, &wanted)
        || is_prefix(&wanted, &tool)
        || top_level(&tool) == top_level(&wanted)
    {
        return CategoryMatch::Partial;
    }
    CategoryMatch::None
}

/// Best match of a tool category against a set of requested categories.
pub fn best_match<'a, I>(tool_category: &str, requested: I) -> CategoryMatch
where
    I: IntoIterator<Item = &'a String>,
{
    requested
        .into_iter()
        .map(|wanted| match_category(tool_category, wanted))
        .max()
        .unwrap_or(CategoryMatch::None)
}

/// Normalize a free-text issue category into a kebab-case slug.
pub fn normalize_issue_category(category: &str) -> String {
    let mut slug = String::with_capacity(category.len());
    let mut pending_dash = false;
    for ch in category.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
