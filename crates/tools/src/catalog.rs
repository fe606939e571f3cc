//! Built-in Tool Catalog
//!
//! Descriptors for the standard analyzers and playbooks, plus reasoning-backed
//! implementations of each. Costs are expected CPU-seconds; categories use
//! sub-paths where a playbook narrows its parent analyzer's concern.

use std::sync::Arc;

use review_cascade_core::{AnalysisTool, ToolDescriptor};
use review_cascade_llm::ReasoningProvider;

use crate::reasoning::ReasoningTool;

const COMMON_LANGUAGES: [&str; 4] = ["python", "javascript", "typescript", "java"];
const WEB_LANGUAGES: [&str; 3] = ["python", "javascript", "typescript"];

/// One catalog entry: descriptor plus the analysis instructions a reasoning
/// implementation receives.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub descriptor: ToolDescriptor,
    pub instructions: &'static str,
}

fn entry(descriptor: ToolDescriptor, instructions: &'static str) -> CatalogEntry {
    CatalogEntry {
        descriptor: descriptor.with_description(instructions),
        instructions,
    }
}

/// The built-in analyzers and playbooks.
pub fn builtin_catalog() -> Vec<CatalogEntry> {
    vec![
        // Analyzers
        entry(
            ToolDescriptor::new("static_analyzer", "quality")
                .with_name("Static Analyzer")
                .with_cost(30.0)
                .with_priority(0.7)
                .with_languages(COMMON_LANGUAGES)
                .with_confidence_baseline(0.85),
            "Assess code quality and maintainability: dead code, oversized units, unclear structure",
        ),
        entry(
            ToolDescriptor::new("dependency_analyzer", "dependencies")
                .with_name("Dependency Analyzer")
                .with_cost(15.0)
                .with_priority(0.7)
                .with_languages(COMMON_LANGUAGES)
                .with_confidence_baseline(0.90),
            "Map module dependencies and imports; report problematic coupling",
        ),
        entry(
            ToolDescriptor::new("security_scanner", "security")
                .with_name("Security Scanner")
                .with_cost(45.0)
                .with_priority(0.9)
                .with_languages(["all"])
                .with_confidence_baseline(0.88),
            "Find security vulnerabilities: injection, unsafe deserialization, weak crypto",
        ),
        entry(
            ToolDescriptor::new("complexity_analyzer", "complexity")
                .with_name("Complexity Analyzer")
                .with_cost(20.0)
                .with_priority(0.65)
                .with_languages(["python", "javascript", "typescript", "java", "c++"])
                .with_confidence_baseline(0.92),
            "Measure cyclomatic and cognitive complexity of functions and classes",
        ),
        entry(
            ToolDescriptor::new("code_quality_checker", "quality")
                .with_name("Code Quality Checker")
                .with_cost(25.0)
                .with_priority(0.6)
                .with_languages(WEB_LANGUAGES)
                .with_confidence_baseline(0.87),
            "Check style issues and departures from language best practices",
        ),
        entry(
            ToolDescriptor::new("performance_analyzer", "performance")
                .with_name("Performance Analyzer")
                .with_cost(35.0)
                .with_priority(0.6)
                .with_languages(COMMON_LANGUAGES)
                .with_confidence_baseline(0.83),
            "Find performance problems: quadratic loops, repeated I/O, N+1 queries",
        ),
        entry(
            ToolDescriptor::new("architecture_analyzer", "architecture")
                .with_name("Architecture Analyzer")
                .with_cost(40.0)
                .with_priority(0.55)
                .with_languages(["all"])
                .with_confidence_baseline(0.80),
            "Review architecture and design patterns; report layering violations",
        ),
        // Playbooks
        entry(
            ToolDescriptor::new("god_classes", "architecture.classes")
                .with_name("God Classes")
                .with_prerequisite("static_analyzer")
                .with_cost(20.0)
                .with_priority(0.6)
                .with_languages(["python", "java", "c#"])
                .with_confidence_baseline(0.90),
            "Detect oversized classes violating the single responsibility principle",
        ),
        entry(
            ToolDescriptor::new("circular_dependencies", "dependencies.cycles")
                .with_name("Circular Dependencies")
                .with_prerequisite("dependency_analyzer")
                .with_cost(15.0)
                .with_priority(0.65)
                .with_languages(WEB_LANGUAGES)
                .with_confidence_baseline(0.95),
            "Identify circular imports and dependency cycles",
        ),
        entry(
            ToolDescriptor::new("high_complexity", "complexity.functions")
                .with_name("High Complexity")
                .with_prerequisite("complexity_analyzer")
                .with_cost(18.0)
                .with_priority(0.6)
                .with_languages(["all"])
                .with_confidence_baseline(0.92),
            "Find functions and methods with excessive cyclomatic complexity",
        ),
        entry(
            ToolDescriptor::new("dependency_health", "dependencies.health")
                .with_name("Dependency Health")
                .with_cost(25.0)
                .with_priority(0.55)
                .with_languages(WEB_LANGUAGES)
                .with_confidence_baseline(0.85),
            "Analyze dependency freshness and known-vulnerable versions",
        ),
        entry(
            ToolDescriptor::new("hardcoded_secrets", "security.secrets")
                .with_name("Hardcoded Secrets")
                .with_cost(30.0)
                .with_priority(0.85)
                .with_languages(["all"])
                .with_confidence_baseline(0.95),
            "Detect exposed credentials, API keys and other sensitive literals",
        ),
        entry(
            ToolDescriptor::new("idor_vulnerabilities", "security.authorization")
                .with_name("IDOR Vulnerabilities")
                .with_cost(35.0)
                .with_priority(0.8)
                .with_languages(["python", "javascript", "typescript", "java", "php"])
                .with_confidence_baseline(0.88),
            "Check for insecure direct object references in request handlers",
        ),
    ]
}

/// Descriptors of the built-in catalog.
pub fn builtin_descriptors() -> Vec<ToolDescriptor> {
    builtin_catalog().into_iter().map(|e| e.descriptor).collect()
}

/// Look up one catalog entry.
pub fn catalog_entry(id: &str) -> Option<CatalogEntry> {
    builtin_catalog().into_iter().find(|e| e.descriptor.id == id)
}

/// Reasoning-backed implementations of the whole catalog.
pub fn builtin_reasoning_tools(provider: Arc<dyn ReasoningProvider>) -> Vec<Arc<dyn AnalysisTool>> {
    builtin_catalog()
        .into_iter()
        .map(|e| {
            Arc::new(ReasoningTool::new(e.descriptor, provider.clone(), e.instructions))
                as Arc<dyn AnalysisTool>
        })
        .collect()
}
