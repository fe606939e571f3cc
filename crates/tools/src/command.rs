//! Command Tools
//!
//! A tool backed by an external analyzer process. The process runs against
//! the request's snapshot and prints its findings as JSON on stdout. The
//! child is killed when the invocation is cancelled or timed out.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use review_cascade_core::{
    ExecutionContext, ToolContext, ToolDefinition, ToolDescriptor, ToolError, ToolExecutable,
    ToolOutput,
};

use crate::finding_parser::parse_findings;

/// Placeholder in arguments replaced by the snapshot handle.
pub const SNAPSHOT_PLACEHOLDER: &str = "{snapshot}";

/// Characters of stderr kept in failure messages.
const STDERR_TAIL_CHARS: usize = 500;

/// Exit code conventionally used by analyzers to signal "findings present".
fn default_success_codes() -> Vec<i32> {
    vec![0, 1]
}

/// How to launch the analyzer process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Exit codes treated as success
    #[serde(default = "default_success_codes")]
    pub success_codes: Vec<i32>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            success_codes: default_success_codes(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Arguments with the snapshot placeholder substituted.
    fn resolved_args(&self, snapshot: &str) -> Vec<String> {
        if self.args.is_empty() {
            return vec![snapshot.to_string()];
        }
        self.args
            .iter()
            .map(|a| a.replace(SNAPSHOT_PLACEHOLDER, snapshot))
            .collect()
    }
}

/// An analysis tool that shells out to an external analyzer.
pub struct CommandTool {
    descriptor: ToolDescriptor,
    spec: CommandSpec,
}

impl CommandTool {
    pub fn new(descriptor: ToolDescriptor, spec: CommandSpec) -> Self {
        Self { descriptor, spec }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }
}

impl ToolDefinition for CommandTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl ToolExecutable for CommandTool {
    async fn execute(&self, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let args = self.spec.resolved_args(ctx.snapshot());

        let mut command = Command::new(&self.spec.program);
        command
            .args(&args)
            .envs(&self.spec.env)
            .env("REVIEW_CASCADE_REQUEST_ID", ctx.request_id())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.spec.working_dir {
            command.current_dir(dir);
        }

        tracing::debug!(
            tool_id = %self.descriptor.id,
            program = %self.spec.program,
            "spawning analyzer process"
        );

        let child = command.spawn().map_err(|e| {
            ToolError::failed(format!("failed to start '{}': {}", self.spec.program, e))
        })?;

        // Dropping the output future kills the child.
        let output = tokio::select! {
            result = child.wait_with_output() => result.map_err(|e| {
                let program = &self.spec.program;
                ToolError::failed(format!("failed to collect output of '{}': {}", program, e))
            })?,
            _ = ctx.cancellation().cancelled() => return Err(ToolError::Cancelled),
        };

        let code = output.status.code();
        if !code.map_or(false, |c| self.spec.success_codes.contains(&c)) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let tail = match stderr.char_indices().rev().nth(STDERR_TAIL_CHARS) {
                Some((idx, _)) => &stderr[idx..],
                None => stderr,
            };
            return Err(ToolError::failed(format!(
                "'{}' exited with {}: {}",
                self.spec.program,
                code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                tail
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let findings = parse_findings(&stdout).map_err(ToolError::failed)?;
        let summary = format!("{} reported {} finding(s)", self.descriptor.id, findings.len());
        Ok(ToolOutput::with_findings(findings).with_summary(summary))
    }
}
