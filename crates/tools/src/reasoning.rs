//! Reasoning Tools
//!
//! A tool whose analysis is performed by a `ReasoningProvider`. Each
//! invocation is a single request/response exchange: the prompt is rebuilt
//! from the request, a bounded excerpt of the snapshot's source and the
//! outputs of the tool's prerequisites, and nothing carries over between
//! invocations.
//!
//! Provider failures are classified into `ToolError` kinds so the coordinator
//! can retry rate limiting and temporary outages with backoff.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use review_cascade_core::{
    CategorySelection, ExecutionContext, ToolContext, ToolDefinition, ToolDescriptor, ToolError,
    ToolExecutable, ToolOutput,
};
use review_cascade_llm::{LlmError, Message, ReasoningProvider};

use crate::finding_parser::parse_findings;
use crate::source::{source_excerpt, SourceExcerpt};

/// Upper bound on prerequisite context included in a prompt.
const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

/// Upper bound on snapshot source quoted in a prompt.
const DEFAULT_MAX_SOURCE_CHARS: usize = 48_000;

const SYSTEM_PROMPT: &str = "You are a meticulous code reviewer. Report only issues you can \
point to in the code. Respond with a JSON array of findings; each finding has the fields \
severity (low, medium, high or critical), category, title, detail, file, line, end_line and \
confidence (0 to 1). Respond with [] when there is nothing to report.";

/// An analysis tool backed by a reasoning provider.
pub struct ReasoningTool {
    descriptor: ToolDescriptor,
    provider: Arc<dyn ReasoningProvider>,
    instructions: String,
    max_context_chars: usize,
    max_source_chars: usize,
}

impl ReasoningTool {
    pub fn new(
        descriptor: ToolDescriptor,
        provider: Arc<dyn ReasoningProvider>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            descriptor,
            provider,
            instructions: instructions.into(),
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            max_source_chars: DEFAULT_MAX_SOURCE_CHARS,
        }
    }

    pub fn with_max_context_chars(mut self, max: usize) -> Self {
        self.max_context_chars = max;
        self
    }

    /// Budget for quoted snapshot source; zero leaves the source out.
    pub fn with_max_source_chars(mut self, max: usize) -> Self {
        self.max_source_chars = max;
        self
    }

    fn collect_source(&self, ctx: &ToolContext) -> SourceExcerpt {
        source_excerpt(
            &PathBuf::from(ctx.snapshot()),
            ctx.languages(),
            self.max_source_chars,
        )
    }

    /// Build the user prompt for one invocation, reading the snapshot source.
    pub fn build_prompt(&self, ctx: &ToolContext) -> String {
        let source = self.collect_source(ctx);
        self.render_prompt(ctx, &source)
    }

    fn render_prompt(&self, ctx: &ToolContext, source: &SourceExcerpt) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!("Task: {}\n", self.instructions));
        prompt.push_str(&format!("Snapshot: {}\n", ctx.snapshot()));
        if let CategorySelection::Only(categories) = ctx.categories() {
            let list: Vec<&str> = categories.iter().map(String::as_str).collect();
            prompt.push_str(&format!("Focus categories: {}\n", list.join(", ")));
        }
        if !ctx.languages().is_empty() {
            prompt.push_str(&format!("Languages: {}\n", ctx.languages().join(", ")));
        }

        if !source.is_empty() {
            prompt.push_str("\nSource files:\n");
            prompt.push_str(&source.text);
            if source.truncated {
                prompt.push_str("[source truncated]\n");
            }
        }

        if !ctx.prerequisite_outputs().is_empty() {
            let mut context = String::new();
            for (tool_id, output) in ctx.prerequisite_outputs() {
                context.push_str(&format!("\n## {}\n", tool_id));
                if !output.summary.is_empty() {
                    context.push_str(&output.summary);
                    context.push('\n');
                }
                if !output.findings.is_empty() {
                    let findings = serde_json::to_string(&output.findings).unwrap_or_default();
                    context.push_str(&findings);
                    context.push('\n');
                }
                if !output.data.is_null() {
                    context.push_str(&output.data.to_string());
                    context.push('\n');
                }
            }
            prompt.push_str("\nResults of earlier analyses:");
            prompt.push_str(&truncate_chars(&context, self.max_context_chars));
        }
        prompt
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\n[truncated]", &text[..idx]),
        None => text.to_string(),
    }
}

/// Map a provider error onto the tool error taxonomy.
pub fn classify_llm_error(err: LlmError) -> ToolError {
    match err {
        LlmError::RateLimited {
            message,
            retry_after,
        } => ToolError::rate_limited(message, retry_after.map(|secs| u64::from(secs) * 1000)),
        LlmError::ServerError { .. }
        | LlmError::NetworkError { .. }
        | LlmError::ProviderUnavailable { .. } => ToolError::unavailable(err.to_string()),
        other => ToolError::failed(other.to_string()),
    }
}

impl ToolDefinition for ReasoningTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl ToolExecutable for ReasoningTool {
    async fn execute(&self, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let snapshot = PathBuf::from(ctx.snapshot());
        let languages = ctx.languages().to_vec();
        let budget = self.max_source_chars;
        let source =
            tokio::task::spawn_blocking(move || source_excerpt(&snapshot, &languages, budget))
                .await
                .map_err(|err| ToolError::failed(format!("reading snapshot source: {err}")))?;
        let prompt = self.render_prompt(ctx, &source);

        tracing::debug!(
            tool_id = %self.descriptor.id,
            provider = self.provider.name(),
            model = %self.provider.model(),
            attempt = ctx.attempt(),
            prompt_chars = prompt.len(),
            source_files = source.files,
            "requesting reasoning analysis"
        );

        let request = self
            .provider
            .complete(vec![Message::user(prompt)], Some(SYSTEM_PROMPT.to_string()));
        let response = tokio::select! {
            result = request => result.map_err(classify_llm_error)?,
            _ = ctx.cancellation().cancelled() => return Err(ToolError::Cancelled),
        };

        let findings = parse_findings(&response.content).map_err(ToolError::failed)?;
        Ok(ToolOutput::with_findings(findings).with_summary(response.content))
    }
}
