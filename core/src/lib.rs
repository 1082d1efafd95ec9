//! Query-to-action-to-answer pipeline.
//!
//! Free text is resolved to one catalog operation by a tool-calling model,
//! validated and dispatched to the numeric-option service, and the returned
//! data is phrased into an answer by a second, context-grounded model call.

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod generator;
pub mod llm;
pub mod pipeline;
pub mod resolver;
pub mod runtime;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{Catalog, OperationDescriptor, ParamType, ParameterSpec};
pub use pipeline::{Coordinator, Outcome};
