//! Finding Parser
//!
//! Turns tool text output (process stdout, reasoning responses) into
//! `RawFinding`s. Accepts a bare JSON array, an object with a `findings`
//! array, either of those inside a markdown code fence, or JSON embedded in
//! surrounding prose.
//!
//! Field names are matched leniently: `file`/`path`, `line`/`start_line`,
//! `detail`/`description`/`message` and so on all map onto the same field.

use serde::Deserialize;
use serde_json::Value;

use review_cascade_core::{LineRange, Location, RawFinding, Severity};

/// Extract the JSON payload from free text.
///
/// Handles common LLM quirks like wrapping JSON in markdown code fences.
pub fn extract_json_payload(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Markdown code fences (```json ... ``` or ``` ... ```)
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        // Skip optional language identifier (e.g., "json")
        let content_start = after_fence.find('\n').map(|nl| nl + 1).unwrap_or(0);
        let content = &after_fence[content_start..];
        if let Some(end) = content.find("```") {
            let inner = content[..end].trim();
            if inner.starts_with('[') || inner.starts_with('{') {
                return Some(inner.to_string());
            }
        }
    }

    // Whichever bracket opens first decides between array and object
    let array = trimmed.find('[').zip(trimmed.rfind(']'));
    let object = trimmed.find('{').zip(trimmed.rfind('}'));
    let span = match (array, object) {
        (Some(a), Some(o)) => Some(if a.0 < o.0 { a } else { o }),
        (a, o) => a.or(o),
    };
    span.filter(|(start, end)| start <= end)
        .map(|(start, end)| trimmed[start..=end].to_string())
}

/// Parse findings from tool output text.
///
/// Empty output and the literal `[]` both mean "no findings". Items that do
/// not look like findings are skipped; an error is returned only when there
/// is no JSON at all or when no item could be read.
pub fn parse_findings(text: &str) -> Result<Vec<RawFinding>, String> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let payload = extract_json_payload(text).ok_or_else(|| {
        format!(
            "no JSON findings in tool output (output starts with: {:?})",
            text.chars().take(80).collect::<String>()
        )
    })?;

    let value: Value = serde_json::from_str(&payload)
        .map_err(|e| format!("tool output is not valid JSON: {}", e))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("findings").or_else(|| map.remove("issues")) {
            Some(Value::Array(items)) => items,
            Some(_) => return Err("'findings' is not an array".to_string()),
            None => vec![Value::Object(map)],
        },
        _ => return Err("tool output JSON is neither an array nor an object".to_string()),
    };

    if items.is_empty() {
        return Ok(Vec::new());
    }

    let total = items.len();
    let findings: Vec<RawFinding> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<WireFinding>(item).ok())
        .filter_map(WireFinding::into_raw)
        .collect();

    if findings.is_empty() {
        return Err(format!("none of the {} reported items is a finding", total));
    }
    if findings.len() < total {
        tracing::warn!(
            parsed = findings.len(),
            total,
            "skipped malformed items in tool output"
        );
    }
    Ok(findings)
}

/// Lenient wire shape of one finding.
#[derive(Debug, Deserialize)]
struct WireFinding {
    #[serde(default)]
    severity: Option<String>,
    #[serde(default, alias = "type", alias = "issue_type", alias = "issueType", alias = "rule")]
    category: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "description", alias = "message")]
    detail: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, alias = "path", alias = "file_path", alias = "filePath")]
    file: Option<String>,
    #[serde(default, alias = "start_line", alias = "startLine")]
    line: Option<u32>,
    #[serde(default, alias = "endLine")]
    end_line: Option<u32>,
    #[serde(default, alias = "symbol", alias = "class", alias = "function")]
    entity: Option<String>,
    #[serde(default)]
    location: Option<Location>,
}

impl WireFinding {
    fn into_raw(self) -> Option<RawFinding> {
        let category = self.category.filter(|c| !c.trim().is_empty())?;

        let location = match self.location {
            Some(location) => location,
            None => Location {
                file: self.file,
                lines: self
                    .line
                    .map(|start| LineRange::new(start, self.end_line.unwrap_or(start))),
                entity: self.entity,
            },
        };

        let severity = self
            .severity
            .as_deref()
            .and_then(|s| s.parse::<Severity>().ok())
            .unwrap_or_default();

        Some(RawFinding {
            severity,
            location,
            category,
            title: self.title.unwrap_or_default(),
            detail: self.detail.unwrap_or_default(),
            confidence: self.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_array() {
        let text = r#"[{"severity": "high", "category": "sql injection", "file": "app.py", "line": 12, "confidence": 0.9}]"#;
        let findings = parse_findings(text).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].location.file.as_deref(), Some("app.py"));
        assert_eq!(findings[0].location.lines, Some(LineRange::single(12)));
        assert_eq!(findings[0].confidence, Some(0.9));
    }

    #[test]
    fn test_fenced_object_with_findings_key() {
        let text = "Here is what I found:\n```json\n{\"findings\": [{\"type\": \"god_class\", \"class\": \"OrderService\", \"description\": \"too many methods\"}]}\n```\nDone.";
        let findings = parse_findings(text).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, "god_class");
        assert_eq!(findings[0].location.entity.as_deref(), Some("OrderService"));
        assert_eq!(findings[0].detail, "too many methods");
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn test_embedded_array_in_prose() {
        let text = "Analysis complete. [{\"category\": \"complexity\", \"path\": \"a.js\", \"start_line\": 3, \"end_line\": 9}] End.";
        let findings = parse_findings(text).unwrap();
        assert_eq!(findings[0].location.lines, Some(LineRange::new(3, 9)));
    }

    #[test]
    fn test_empty_output_means_no_findings() {
        assert!(parse_findings("").unwrap().is_empty());
        assert!(parse_findings("[]").unwrap().is_empty());
        assert!(parse_findings("```json\n[]\n```").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_items_skipped() {
        let text = r#"[{"category": "x", "file": "a"}, {"no_category": true}, 42]"#;
        assert_eq!(parse_findings(text).unwrap().len(), 1);
    }

    #[test]
    fn test_errors() {
        assert!(parse_findings("no json here").is_err());
        assert!(parse_findings("[{\"nothing\": 1}]").is_err());
        assert!(parse_findings("{\"findings\": 3}").is_err());
    }

    #[test]
    fn test_unknown_severity_defaults_to_medium() {
        let findings = parse_findings(r#"[{"category": "x", "severity": "spicy"}]"#).unwrap();
        assert_eq!(findings[0].severity, Severity::Medium);
    }
}
