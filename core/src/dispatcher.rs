use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::{Catalog, OperationDescriptor};
use crate::error::DispatchError;
use crate::resolver::ToolCall;
use crate::runtime::{ExecutionBackend, ExecutionRequest};

const SEARCH_TERM: &str = "search_term";

/// Opaque data returned by a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload(pub Value);

impl Payload {
    /// True when the payload carries no records.
    ///
    /// The service wraps collections in an envelope such as
    /// `{"messages": [], "more_available": false}`; scalar fields beside the
    /// collections do not count as data.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => {
                if map.is_empty() {
                    return true;
                }
                let mut collections = map.values().filter_map(Value::as_array).peekable();
                collections.peek().is_some() && collections.all(Vec::is_empty)
            }
            Value::Bool(_) | Value::Number(_) => false,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// What a dispatch produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// A terminal operation; the backend was not contacted.
    Terminal { operation: String },
    Completed { operation: String, option: u32, payload: Payload },
}

/// Validates tool calls against the catalog and runs them on the backend.
pub struct OperationDispatcher {
    catalog: Arc<Catalog>,
    backend: Arc<dyn ExecutionBackend>,
}

impl OperationDispatcher {
    pub fn new(catalog: Arc<Catalog>, backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { catalog, backend }
    }

    /// Checks catalog membership, then every parameter, before building the
    /// wire request. Nothing reaches the backend unless both pass.
    pub fn prepare(&self, call: &ToolCall) -> Result<(&OperationDescriptor, ExecutionRequest), DispatchError> {
        let descriptor = self
            .catalog
            .resolve_by_name(&call.name)
            .map_err(|e| DispatchError::InvalidRequest(e.to_string()))?;

        for (name, spec) in &descriptor.parameters {
            match call.arguments.get(name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(DispatchError::InvalidRequest(format!(
                        "'{}' requires parameter '{}'",
                        descriptor.name, name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) if !spec.kind.accepts(value) => {
                    return Err(DispatchError::InvalidRequest(format!(
                        "parameter '{}' of '{}' must be a {}",
                        name,
                        descriptor.name,
                        spec.kind.as_str()
                    )));
                }
                Some(Value::String(s)) if spec.required && s.trim().is_empty() => {
                    return Err(DispatchError::InvalidRequest(format!(
                        "parameter '{}' of '{}' must not be blank",
                        name, descriptor.name
                    )));
                }
                Some(_) => {}
            }
        }

        let search_term = descriptor
            .parameters
            .contains_key(SEARCH_TERM)
            .then(|| call.arguments.get(SEARCH_TERM).and_then(Value::as_str))
            .flatten()
            .map(str::to_string);

        Ok((descriptor, ExecutionRequest { option: descriptor.id, search_term }))
    }

    pub async fn dispatch(&self, call: Option<&ToolCall>) -> Result<Dispatched, DispatchError> {
        let call = call.ok_or(DispatchError::NoOperation)?;
        let (descriptor, request) = self.prepare(call)?;

        if descriptor.terminal {
            info!(operation = %descriptor.name, option = descriptor.id, "terminal operation, skipping backend");
            return Ok(Dispatched::Terminal { operation: descriptor.name.clone() });
        }

        let payload = self.backend.execute(&request).await.map_err(|e| {
            warn!(operation = %descriptor.name, option = descriptor.id, error = %e, "dispatch failed");
            DispatchError::from(e)
        })?;

        Ok(Dispatched::Completed {
            operation: descriptor.name.clone(),
            option: descriptor.id,
            payload: Payload(payload),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::test_support::{call, ScriptedBackend};
    use serde_json::json;

    fn dispatcher(backend: Arc<ScriptedBackend>) -> OperationDispatcher {
        OperationDispatcher::new(Arc::new(Catalog::standard().unwrap()), backend)
    }

    #[test]
    fn payload_emptiness() {
        assert!(Payload(Value::Null).is_empty());
        assert!(Payload(json!([])).is_empty());
        assert!(Payload(json!({})).is_empty());
        assert!(Payload(json!("")).is_empty());
        assert!(Payload(json!({"messages": [], "more_available": false})).is_empty());
        assert!(Payload(json!({"calendar_events": []})).is_empty());

        assert!(!Payload(json!([{"subject": "Hi"}])).is_empty());
        assert!(!Payload(json!({"messages": [{"subject": "Hi"}], "more_available": true})).is_empty());
        assert!(!Payload(json!({"message": "Mail sent."})).is_empty());
        assert!(!Payload(json!({"app_only_token": "eyJ0"})).is_empty());
    }

    #[tokio::test]
    async fn none_is_rejected_without_backend_call() {
        let backend = ScriptedBackend::ok(json!([]));
        let err = dispatcher(backend.clone()).dispatch(None).await.unwrap_err();
        assert_eq!(err, DispatchError::NoOperation);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_operation_is_invalid() {
        let backend = ScriptedBackend::ok(json!([]));
        let err = dispatcher(backend.clone())
            .dispatch(Some(&call("get-weather", json!({}))))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRequest(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn missing_required_parameter_never_reaches_backend() {
        let backend = ScriptedBackend::ok(json!({"sharepoint_sites": []}));
        let d = dispatcher(backend.clone());

        for args in [json!({}), json!({"search_term": null}), json!({"search_term": "  "})] {
            let err = d.dispatch(Some(&call("extract-sharepoint-usage", args))).await.unwrap_err();
            assert!(matches!(err, DispatchError::InvalidRequest(_)));
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn wrongly_typed_parameter_is_invalid() {
        let backend = ScriptedBackend::ok(json!([]));
        let err = dispatcher(backend.clone())
            .dispatch(Some(&call("extract-sharepoint-usage", json!({"search_term": 7}))))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::InvalidRequest(
                "parameter 'search_term' of 'extract-sharepoint-usage' must be a string".into()
            )
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn search_term_is_forwarded_for_sharepoint() {
        let backend = ScriptedBackend::ok(json!({"sharepoint_sites": [{"display_name": "Budget"}]}));
        let out = dispatcher(backend.clone())
            .dispatch(Some(&call("extract-sharepoint-usage", json!({"search_term": "budget"}))))
            .await
            .unwrap();

        assert!(matches!(out, Dispatched::Completed { option: 7, .. }));
        assert_eq!(
            backend.requests(),
            vec![ExecutionRequest { option: 7, search_term: Some("budget".into()) }]
        );
    }

    #[tokio::test]
    async fn stray_arguments_are_not_forwarded() {
        let backend = ScriptedBackend::ok(json!({"messages": []}));
        dispatcher(backend.clone())
            .dispatch(Some(&call("list-inbox", json!({"search_term": "x", "dummy": "y"}))))
            .await
            .unwrap();
        assert_eq!(backend.requests(), vec![ExecutionRequest { option: 2, search_term: None }]);
    }

    #[tokio::test]
    async fn empty_collection_is_success() {
        let backend = ScriptedBackend::ok(json!({"contacts": []}));
        let out = dispatcher(backend).dispatch(Some(&call("extract-contacts", json!({})))).await.unwrap();
        match out {
            Dispatched::Completed { payload, .. } => assert!(payload.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn backend_error_is_remote_failure() {
        let backend = ScriptedBackend::err(BackendError::Transport("connection refused".into()));
        let err = dispatcher(backend).dispatch(Some(&call("list-inbox", json!({})))).await.unwrap_err();
        assert!(matches!(err, DispatchError::RemoteFailure(_)));
    }

    #[tokio::test]
    async fn exit_short_circuits() {
        let backend = ScriptedBackend::ok(json!({"message": "Goodbye..."}));
        let out = dispatcher(backend.clone()).dispatch(Some(&call("exit", json!({})))).await.unwrap();
        assert_eq!(out, Dispatched::Terminal { operation: "exit".into() });
        assert_eq!(backend.calls(), 0);
    }
}
