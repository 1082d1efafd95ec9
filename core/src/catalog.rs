use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::CatalogError;
use crate::llm::ToolDefinition;

// JSON-schema primitive a parameter must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(kind: ParamType, description: impl Into<String>) -> Self {
        Self { kind, description: description.into(), required: true }
    }

    pub fn optional(kind: ParamType, description: impl Into<String>) -> Self {
        Self { kind, description: description.into(), required: false }
    }
}

/// One invocable remote operation.
///
/// `id` is the numeric option code the dispatch service understands. `name` is
/// what the model sees as a tool name. Both are stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub parameters: BTreeMap<String, ParameterSpec>,
    /// Ends the interaction without contacting the backend.
    pub terminal: bool,
}

impl OperationDescriptor {
    pub fn new(id: u32, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
            terminal: false,
        }
    }

    pub fn param(mut self, name: impl Into<String>, spec: ParameterSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn required_params(&self) -> impl Iterator<Item = (&str, &ParameterSpec)> {
        self.parameters
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, spec)| (name.as_str(), spec))
    }

    /// JSON schema for the arguments object, in the shape tool-calling APIs expect.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for (name, spec) in &self.parameters {
            properties.insert(
                name.clone(),
                json!({ "type": spec.kind.as_str(), "description": spec.description }),
            );
        }
        let required: Vec<&str> = self.required_params().map(|(name, _)| name).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Entry in the public option menu.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OptionEntry {
    pub id: u32,
    pub name: String,
    pub description: String,
}

/// The fixed, read-only table of operations.
///
/// Tool schemas, the name → option-code mapping, and the option menu are all
/// derived from this one table.
#[derive(Debug, Clone)]
pub struct Catalog {
    operations: Vec<OperationDescriptor>,
    by_id: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Builds a catalog, rejecting any id or name declared twice.
    pub fn new(operations: Vec<OperationDescriptor>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(operations.len());
        let mut by_name = HashMap::with_capacity(operations.len());

        for (index, op) in operations.iter().enumerate() {
            if by_id.insert(op.id, index).is_some() {
                return Err(CatalogError::DuplicateId(op.id));
            }
            if by_name.insert(op.name.clone(), index).is_some() {
                return Err(CatalogError::DuplicateName(op.name.clone()));
            }
        }

        Ok(Self { operations, by_id, by_name })
    }

    /// The directory-and-collaboration operations exposed by the option service.
    pub fn standard() -> Result<Self, CatalogError> {
        Self::new(vec![
            OperationDescriptor::new(0, "exit", "End the session and say goodbye").terminal(),
            OperationDescriptor::new(
                1,
                "display-access-token",
                "Display the access token for the directory API",
            ),
            OperationDescriptor::new(2, "list-inbox", "List the emails in the inbox"),
            OperationDescriptor::new(3, "send-mail", "Send an email to the signed-in user"),
            OperationDescriptor::new(
                4,
                "extract-email-metadata",
                "Extract metadata from emails: sender, recipients, importance, attachments and categories",
            ),
            OperationDescriptor::new(5, "extract-calendar-events", "Extract calendar events"),
            OperationDescriptor::new(6, "extract-contacts", "Extract contacts and network information"),
            OperationDescriptor::new(
                7,
                "extract-sharepoint-usage",
                "Extract SharePoint usage information",
            )
            .param(
                "search_term",
                ParameterSpec::required(ParamType::String, "Search term to filter SharePoint sites"),
            ),
        ])
    }

    pub fn describe(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    pub fn resolve_by_id(&self, id: u32) -> Result<&OperationDescriptor, CatalogError> {
        self.by_id
            .get(&id)
            .map(|&index| &self.operations[index])
            .ok_or(CatalogError::UnknownId(id))
    }

    pub fn resolve_by_name(&self, name: &str) -> Result<&OperationDescriptor, CatalogError> {
        self.by_name
            .get(name)
            .map(|&index| &self.operations[index])
            .ok_or_else(|| CatalogError::UnknownName(name.to_string()))
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.operations.iter().map(OperationDescriptor::tool_definition).collect()
    }

    pub fn options(&self) -> Vec<OptionEntry> {
        self.operations
            .iter()
            .map(|op| OptionEntry {
                id: op.id,
                name: op.name.clone(),
                description: op.description.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
