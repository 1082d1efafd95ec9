//! The per-request state machine:
//!
//! `Idle → Resolving → {NoMatch | ResolutionError | Resolved} → Dispatching →
//! {DispatchError | EmptyResult | HasResult} → Generating → Answered`
//!
//! Every path ends in exactly one [`Outcome`]. Failures are folded into
//! [`Outcome::Failed`] here and never bubble past the coordinator.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::dispatcher::{Dispatched, OperationDispatcher};
use crate::error::{DispatchError, Failure, FailureKind, LlmError};
use crate::generator::ResponseGenerator;
use crate::llm::CompletionService;
use crate::resolver::IntentResolver;
use crate::runtime::ExecutionBackend;

pub const EMPTY_QUERY_MESSAGE: &str = "Please enter a query.";
pub const NO_DATA_MESSAGE: &str = "No data found for the given query.";
pub const GOODBYE_MESSAGE: &str = "Goodbye...";

/// The single user-facing result of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Answered { operation: String, answer: String },
    NoData { operation: String },
    Goodbye,
    /// Rejected before any outbound call.
    EmptyQuery,
    Failed(Failure),
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Answered { .. } => "answered",
            Self::NoData { .. } => "no_data",
            Self::Goodbye => "goodbye",
            Self::EmptyQuery => "empty_query",
            Self::Failed(failure) => failure.kind.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Answered { answer, .. } => answer,
            Self::NoData { .. } => NO_DATA_MESSAGE,
            Self::Goodbye => GOODBYE_MESSAGE,
            Self::EmptyQuery => EMPTY_QUERY_MESSAGE,
            Self::Failed(failure) => failure.user_message(),
        }
    }

    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::Answered { operation, .. } | Self::NoData { operation } => Some(operation),
            _ => None,
        }
    }
}

/// Sequences resolve → dispatch → generate for one query at a time.
///
/// Holds only read-only handles, so one coordinator serves concurrent requests.
pub struct Coordinator {
    resolver: IntentResolver,
    dispatcher: OperationDispatcher,
    generator: ResponseGenerator,
}

impl Coordinator {
    pub fn new(
        catalog: Arc<Catalog>,
        llm: Arc<dyn CompletionService>,
        backend: Arc<dyn ExecutionBackend>,
    ) -> Self {
        Self {
            resolver: IntentResolver::new(llm.clone(), &catalog),
            dispatcher: OperationDispatcher::new(catalog, backend),
            generator: ResponseGenerator::new(llm),
        }
    }

    pub async fn handle(&self, query: &str) -> Outcome {
        let query = query.trim();
        if query.is_empty() {
            warn!("empty query rejected");
            return Outcome::EmptyQuery;
        }

        // STEP 1: THINK (which operation serves this query?)
        info!(stage = "resolving", "resolving query");
        let call = match self.resolver.resolve(query).await {
            Ok(Some(call)) => call,
            Ok(None) => {
                info!(stage = "no_match", "no operation matched");
                return Outcome::Failed(DispatchError::NoOperation.into());
            }
            // The model picked a tool but its arguments are unusable.
            Err(e @ LlmError::MalformedToolCall { .. }) => {
                warn!(stage = "dispatch_error", error = %e, "tool call rejected");
                return Outcome::Failed(Failure::new(FailureKind::InvalidRequest, e.to_string()));
            }
            Err(e) => {
                error!(stage = "resolution_error", error = %e, "intent resolution failed");
                return Outcome::Failed(Failure::new(FailureKind::ResolutionFailure, e.to_string()));
            }
        };

        // STEP 2: ACT (validate, then run it on the backend)
        info!(stage = "dispatching", operation = %call.name, "dispatching");
        let (operation, payload) = match self.dispatcher.dispatch(Some(&call)).await {
            Ok(Dispatched::Terminal { operation }) => {
                info!(stage = "terminal", %operation, "terminal operation");
                return Outcome::Goodbye;
            }
            Ok(Dispatched::Completed { operation, option, payload }) => {
                if payload.is_empty() {
                    info!(stage = "empty_result", %operation, option, "no data returned");
                    return Outcome::NoData { operation };
                }
                (operation, payload)
            }
            Err(e) => {
                warn!(stage = "dispatch_error", operation = %call.name, error = %e, "dispatch failed");
                return Outcome::Failed(e.into());
            }
        };

        // STEP 3: ANSWER (ground the reply in the returned data)
        info!(stage = "generating", %operation, "writing grounded answer");
        match self.generator.generate(query, &payload).await {
            Ok(answer) => {
                info!(stage = "answered", %operation, "query answered");
                Outcome::Answered { operation, answer }
            }
            Err(e) => {
                error!(stage = "generation_error", %operation, error = %e, "answer generation failed");
                Outcome::Failed(Failure::new(FailureKind::GenerationFailure, e.to_string()))
            }
        }
    }
}
