//! Fakes for the two outbound boundaries, shared by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{BackendError, LlmError};
use crate::llm::{ChatMessage, CompletionService, SelectionRequest, ToolSelection};
use crate::resolver::ToolCall;
use crate::runtime::{ExecutionBackend, ExecutionRequest};

pub fn call(name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        name: name.to_string(),
        arguments: arguments.as_object().cloned().unwrap_or_default(),
    }
}

pub struct ScriptedBackend {
    reply: Result<Value, BackendError>,
    seen: Mutex<Vec<ExecutionRequest>>,
}

impl ScriptedBackend {
    pub fn ok(payload: Value) -> Arc<Self> {
        Arc::new(Self { reply: Ok(payload), seen: Mutex::new(Vec::new()) })
    }

    pub fn err(error: BackendError) -> Arc<Self> {
        Arc::new(Self { reply: Err(error), seen: Mutex::new(Vec::new()) })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    async fn execute(&self, request: &ExecutionRequest) -> Result<Value, BackendError> {
        self.seen.lock().unwrap().push(request.clone());
        self.reply.clone()
    }
}

#[derive(Default)]
pub struct FakeLlm {
    pub selection: Option<ToolSelection>,
    pub select_fails: bool,
    /// Tool call arrives with arguments that are not a JSON object.
    pub malformed_arguments: bool,
    pub answer: Option<String>,
    pub selections: Mutex<Vec<(String, usize, f32)>>,
    pub completions: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeLlm {
    pub fn selecting(name: &str, arguments: Value) -> Self {
        let call = call(name, arguments);
        Self {
            selection: Some(ToolSelection { name: call.name, arguments: call.arguments }),
            answer: Some("You have two unread messages.".to_string()),
            ..Self::default()
        }
    }

    pub fn completion_calls(&self) -> usize {
        self.completions.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for FakeLlm {
    async fn select_tool(
        &self,
        request: SelectionRequest<'_>,
    ) -> Result<Option<ToolSelection>, LlmError> {
        self.selections.lock().unwrap().push((
            request.prompt.to_string(),
            request.tools.len(),
            request.temperature,
        ));
        if self.select_fails {
            return Err(LlmError::Unavailable("connection reset".into()));
        }
        if self.malformed_arguments {
            return Err(LlmError::MalformedToolCall {
                name: "extract-sharepoint-usage".into(),
                reason: "expected an object, got \"budget\"".into(),
            });
        }
        Ok(self.selection.clone())
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.completions.lock().unwrap().push(messages.to_vec());
        self.answer.clone().ok_or(LlmError::EmptyResponse)
    }
}
