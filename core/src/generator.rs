use std::sync::Arc;

use crate::dispatcher::Payload;
use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionService};

/// Fixed for every request. Grounding is not a per-call option.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert Q&A system that is trusted around the world.\n\
Always answer the query using the provided context information, and not prior knowledge.\n\
Some rules to follow:\n\
1. Never directly reference the given context in your answer.\n\
2. Avoid statements like 'Based on the context, ...' or 'The context information ...' or anything along those lines.";

/// The two-message question-answering prompt for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedPrompt {
    pub context: String,
    pub query: String,
}

impl GroundedPrompt {
    pub fn new(query: &str, payload: &Payload) -> Self {
        Self { context: payload.as_value().to_string(), query: query.to_string() }
    }

    pub fn messages(&self) -> [ChatMessage; 2] {
        [
            ChatMessage::system(SYSTEM_INSTRUCTION),
            ChatMessage::user(format!(
                "Context information is below.\n\
                 ---------------------\n\
                 {}\n\
                 ---------------------\n\
                 Given the context information and not prior knowledge, answer the query.\n\
                 Query: {}\n\
                 Answer: ",
                self.context, self.query
            )),
        ]
    }
}

/// Writes the final answer from dispatched data only.
pub struct ResponseGenerator {
    llm: Arc<dyn CompletionService>,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    pub async fn generate(&self, query: &str, payload: &Payload) -> Result<String, LlmError> {
        let prompt = GroundedPrompt::new(query, payload);
        self.llm.complete(&prompt.messages()).await
    }
}
