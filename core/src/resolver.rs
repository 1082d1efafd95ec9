use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use crate::catalog::Catalog;
use crate::error::LlmError;
use crate::llm::{CompletionService, SelectionRequest, ToolDefinition};

/// Sampling temperature for tool selection. Zero keeps repeated queries stable.
pub const RESOLUTION_TEMPERATURE: f32 = 0.0;

/// An operation name plus arguments, as chosen by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// Turns free text into at most one catalog tool call.
pub struct IntentResolver {
    llm: Arc<dyn CompletionService>,
    tools: Vec<ToolDefinition>,
}

impl IntentResolver {
    pub fn new(llm: Arc<dyn CompletionService>, catalog: &Catalog) -> Self {
        Self { llm, tools: catalog.tool_definitions() }
    }

    /// `Ok(None)` means the model found nothing applicable. Service errors are
    /// returned as `Err` and are not retried here.
    pub async fn resolve(&self, query: &str) -> Result<Option<ToolCall>, LlmError> {
        let request = SelectionRequest {
            prompt: query,
            tools: &self.tools,
            temperature: RESOLUTION_TEMPERATURE,
        };

        let selection = self.llm.select_tool(request).await?;
        Ok(selection.map(|s| {
            info!(tool = %s.name, "query resolved to tool");
            ToolCall { name: s.name, arguments: s.arguments }
        }))
    }
}
