//! Tool Set
//!
//! Builds the registry a process serves from: the built-in catalog backed by
//! the configured reasoning provider, plus every `[[tools]]` entry. A
//! configured entry replaces the built-in tool with the same id.

use std::collections::BTreeSet;
use std::sync::Arc;

use review_cascade_core::category::normalize_tool_category;
use review_cascade_core::{AnalysisTool, ToolDefinition, ToolDescriptor};
use review_cascade_llm::{OpenAICompatibleProvider, ReasoningProvider};
use review_cascade_tools::catalog::catalog_entry;
use review_cascade_tools::{
    builtin_reasoning_tools, CommandSpec, CommandTool, ReasoningTool, ToolRegistry,
};

use crate::config::{OrchestratorConfig, ToolEntry, ToolKind};
use crate::utils::error::{AppError, AppResult};

/// Descriptor of a configured tool, with unset fields taken from the catalog
/// entry of the same id.
pub fn descriptor_for(entry: &ToolEntry) -> AppResult<ToolDescriptor> {
    let mut descriptor = match (catalog_entry(&entry.id), entry.category.as_deref()) {
        (Some(base), category) => {
            let mut descriptor = base.descriptor;
            if let Some(category) = category {
                descriptor.category = normalize_tool_category(category);
            }
            descriptor
        }
        (None, Some(category)) => ToolDescriptor::new(&entry.id, category),
        (None, None) => {
            return Err(AppError::config(format!(
                "tool '{}' is not in the built-in catalog and declares no category",
                entry.id
            )))
        }
    };

    if let Some(name) = &entry.name {
        descriptor = descriptor.with_name(name);
    }
    if let Some(description) = &entry.description {
        descriptor = descriptor.with_description(description);
    }
    if let Some(prerequisites) = &entry.prerequisites {
        descriptor.prerequisites = prerequisites.iter().cloned().collect();
    }
    if let Some(cost) = entry.cost {
        descriptor = descriptor.with_cost(cost);
    }
    if let Some(priority) = entry.priority {
        descriptor = descriptor.with_priority(priority);
    }
    if let Some(languages) = &entry.languages {
        descriptor = descriptor.with_languages(languages.iter().cloned());
    }
    if let Some(confidence) = entry.confidence_baseline {
        descriptor = descriptor.with_confidence_baseline(confidence);
    }
    if let Some(secs) = entry.timeout_secs {
        descriptor = descriptor.with_timeout_secs(secs);
    }
    if entry.essential {
        descriptor = descriptor.essential();
    }

    descriptor.validate()?;
    Ok(descriptor)
}

fn build_tool(
    entry: &ToolEntry,
    provider: Option<&Arc<dyn ReasoningProvider>>,
) -> AppResult<Arc<dyn AnalysisTool>> {
    let descriptor = descriptor_for(entry)?;
    match &entry.kind {
        ToolKind::Command {
            program,
            args,
            working_dir,
            env,
            success_codes,
        } => {
            let mut spec = CommandSpec::new(program).with_args(args.iter().cloned());
            spec.working_dir = working_dir.clone();
            spec.env = env.clone();
            if let Some(codes) = success_codes {
                spec.success_codes = codes.clone();
            }
            Ok(Arc::new(CommandTool::new(descriptor, spec)))
        }
        ToolKind::Reasoning { instructions } => {
            let provider = provider.ok_or_else(|| {
                AppError::config(format!(
                    "reasoning tool '{}' requires a [provider] section",
                    entry.id
                ))
            })?;
            let instructions = instructions
                .clone()
                .or_else(|| catalog_entry(&entry.id).map(|e| e.instructions.to_string()))
                .unwrap_or_else(|| descriptor.description.clone());
            if instructions.trim().is_empty() {
                return Err(AppError::config(format!(
                    "reasoning tool '{}' needs instructions or a description",
                    entry.id
                )));
            }
            Ok(Arc::new(ReasoningTool::new(
                descriptor,
                provider.clone(),
                instructions,
            )))
        }
    }
}

/// Registry holding every tool the configuration declares.
pub fn build_registry(config: &OrchestratorConfig) -> AppResult<ToolRegistry> {
    let provider: Option<Arc<dyn ReasoningProvider>> = match &config.provider {
        Some(provider_config) => Some(Arc::new(OpenAICompatibleProvider::new(
            provider_config.clone(),
        )?)),
        None => None,
    };

    let configured: BTreeSet<&str> = config.tools.iter().map(|t| t.id.as_str()).collect();
    let mut tools: Vec<Arc<dyn AnalysisTool>> = Vec::new();

    if config.use_builtin_catalog {
        if let Some(provider) = &provider {
            tools.extend(
                builtin_reasoning_tools(provider.clone())
                    .into_iter()
                    .filter(|t| !configured.contains(t.id())),
            );
        }
    }

    for entry in &config.tools {
        tools.push(build_tool(entry, provider.as_ref())?);
    }

    let registry = ToolRegistry::new();
    registry.register_all(tools)?;

    tracing::info!(
        tools = registry.len(),
        builtin = config.use_builtin_catalog && provider.is_some(),
        configured = config.tools.len(),
        "tool registry built"
    );
    Ok(registry)
}
