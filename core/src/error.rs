//! Failure taxonomy for the query pipeline.
//!
//! Each component owns a narrow error type. The coordinator folds all of them
//! into a single [`Failure`], which is the only thing a front end ever sees.

use thiserror::Error;

/// Violations of the catalog's id/name bijection, or lookups that miss.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("operation id {0} is declared more than once")]
    DuplicateId(u32),
    #[error("operation name '{0}' is declared more than once")]
    DuplicateName(String),
    #[error("no operation with id {0}")]
    UnknownId(u32),
    #[error("no operation named '{0}'")]
    UnknownName(String),
}

/// Errors raised by the language-model completion boundary.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion service error: {0}")]
    Api(#[from] async_openai::error::OpenAIError),
    #[error("tool call '{name}' carried malformed arguments: {reason}")]
    MalformedToolCall { name: String, reason: String },
    #[error("completion service returned no content")]
    EmptyResponse,
    #[error("completion service unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the remote-execution boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The service answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    /// The service reported a failure inside a success envelope.
    #[error("backend reported failure: {0}")]
    Reported(String),
    /// The service could not be reached, or the call timed out.
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("backend sent an unreadable body: {0}")]
    Decode(String),
}

/// Errors produced by the operation dispatcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no operation resolved")]
    NoOperation,
    /// The call failed catalog or parameter validation; the backend was not contacted.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("remote failure: {0}")]
    RemoteFailure(String),
}

impl From<BackendError> for DispatchError {
    fn from(err: BackendError) -> Self {
        Self::RemoteFailure(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ResolutionFailure,
    NoMatch,
    InvalidRequest,
    RemoteFailure,
    GenerationFailure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolutionFailure => "resolution_failure",
            Self::NoMatch => "no_match",
            Self::InvalidRequest => "invalid_request",
            Self::RemoteFailure => "remote_failure",
            Self::GenerationFailure => "generation_failure",
        }
    }
}

/// A pipeline failure, already reduced to something safe to show a user.
///
/// `detail` is for logs only. [`Failure::user_message`] never includes it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}: {detail}", .kind.as_str())]
pub struct Failure {
    pub kind: FailureKind,
    pub detail: String,
}

impl Failure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }

    pub fn user_message(&self) -> &'static str {
        match self.kind {
            FailureKind::ResolutionFailure => {
                "The assistant is temporarily unavailable. Please try again shortly."
            }
            FailureKind::NoMatch => "The query cannot be served at this time.",
            FailureKind::InvalidRequest => {
                "The request is missing details needed to run it. Please rephrase and try again."
            }
            FailureKind::RemoteFailure => {
                "The directory service could not complete the request. Please try again later."
            }
            FailureKind::GenerationFailure => {
                "The data was retrieved but an answer could not be written. Please try again."
            }
        }
    }
}

impl From<DispatchError> for Failure {
    fn from(err: DispatchError) -> Self {
        let kind = match &err {
            DispatchError::NoOperation => FailureKind::NoMatch,
            DispatchError::InvalidRequest(_) => FailureKind::InvalidRequest,
            DispatchError::RemoteFailure(_) => FailureKind::RemoteFailure,
        };
        Self::new(kind, err.to_string())
    }
}
