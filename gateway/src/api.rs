use serde::{Deserialize, Serialize};

use graphrag_core::Outcome;

// Input: one free-text query per interaction
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

// Output: exactly one rendered outcome
#[derive(Debug, Serialize, PartialEq)]
pub struct QueryResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

impl From<Outcome> for QueryResponse {
    fn from(outcome: Outcome) -> Self {
        Self {
            status: outcome.kind().to_string(),
            message: outcome.message().to_string(),
            operation: outcome.operation().map(str::to_string),
        }
    }
}
