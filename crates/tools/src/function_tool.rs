//! Closure-based Tools
//!
//! `FunctionTool` turns an async closure into a registered analysis tool.
//! Embedders use it for in-process analyzers; tests use it for tools with
//! scripted latency and failures.
//!
//! # Example
//! ```ignore
//! let tool = FunctionTool::new(
//!     ToolDescriptor::new("todo_scanner", "quality"),
//!     |ctx| Box::pin(async move {
//!         Ok(ToolOutput::default().with_summary(format!("scanned {}", ctx.snapshot())))
//!     }),
//! );
//! ```

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use review_cascade_core::{
    ToolContext, ToolDefinition, ToolDescriptor, ToolError, ToolExecutable, ToolOutput,
};

/// Boxed future returned by a `FunctionTool` handler.
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send>>;

type FunctionToolHandler = Box<dyn Fn(ToolContext) -> ToolFuture + Send + Sync>;

/// A tool backed by an async closure.
pub struct FunctionTool {
    descriptor: ToolDescriptor,
    handler: FunctionToolHandler,
}

impl FunctionTool {
    /// Create a new FunctionTool from an async closure.
    pub fn new<F>(descriptor: ToolDescriptor, handler: F) -> Self
    where
        F: Fn(ToolContext) -> ToolFuture + Send + Sync + 'static,
    {
        Self {
            descriptor,
            handler: Box::new(handler),
        }
    }

    /// A tool that always returns the same output.
    pub fn fixed(descriptor: ToolDescriptor, output: ToolOutput) -> Self {
        Self::new(descriptor, move |_| {
            let output = output.clone();
            Box::pin(async move { Ok(output) })
        })
    }
}

impl ToolDefinition for FunctionTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl ToolExecutable for FunctionTool {
    async fn execute(&self, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        (self.handler)(ctx.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_cascade_core::{AnalysisRequest, ExecutionContext};

    #[tokio::test]
    async fn test_function_tool_runs_handler() {
        let tool = FunctionTool::new(ToolDescriptor::new("echo", "quality"), |ctx| {
            Box::pin(async move {
                Ok(ToolOutput::default().with_summary(ctx.snapshot().to_string()))
            })
        });
        let req = AnalysisRequest::new("r", "/repo");
        let out = tool.execute(&ToolContext::new(&req, "i", "echo")).await.unwrap();
        assert_eq!(out.summary, "/repo");
    }

    #[tokio::test]
    async fn test_fixed_tool() {
        let tool = FunctionTool::fixed(
            ToolDescriptor::new("fixed", "quality"),
            ToolOutput::default().with_summary("same"),
        );
        let req = AnalysisRequest::new("r", "/repo");
        let ctx = ToolContext::new(&req, "i", "fixed");
        assert_eq!(tool.execute(&ctx).await.unwrap().summary, "same");
        assert_eq!(tool.execute(&ctx).await.unwrap().summary, "same");
    }

    #[tokio::test]
    async fn test_handler_error_passes_through() {
        let tool = FunctionTool::new(ToolDescriptor::new("bad", "quality"), |_| {
            Box::pin(async move { Err(ToolError::failed("parse error")) })
        });
        let req = AnalysisRequest::new("r", "/repo");
        let err = tool.execute(&ToolContext::new(&req, "i", "bad")).await.unwrap_err();
        assert_eq!(err, ToolError::failed("parse error"));
    }
}
