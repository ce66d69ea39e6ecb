//! The Logic App Workflow document.
//!
//! Only the fields this crate reads are typed. Everything else the API
//! returns is kept in `extra` maps so a read-modify-write cycle sends it back
//! untouched, in its original key order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ComponentKind;
use crate::error::ProviderError;
use crate::identity::SystemUserAssignedIdentityMap;

const DEFINITION_SCHEMA: &str =
    "https://schema.management.azure.com/providers/Microsoft.Logic/schemas/2016-06-01/workflowdefinition.json#";
const DEFINITION_CONTENT_VERSION: &str = "1.0.0.0";

/// A Logic App Workflow as returned by `GET` and sent by `PUT`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Resource ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Azure region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Resource tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    /// Managed identity of the workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<SystemUserAssignedIdentityMap>,
    /// Workflow properties, including the definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<WorkflowProperties>,
    /// Keys not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `properties` object of a [`Workflow`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowProperties {
    /// The workflow definition document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<WorkflowDefinition>,
    /// `state`, `parameters`, `accessControl` and anything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Workflow {
    /// A new workflow in `location` with an empty definition.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            properties: Some(WorkflowProperties {
                definition: Some(WorkflowDefinition::new()),
                extra: Map::new(),
            }),
            ..Default::default()
        }
    }

    /// The definition, or `InvalidState` when the document has none.
    pub fn definition(&self) -> Result<&WorkflowDefinition, ProviderError> {
        self.properties
            .as_ref()
            .ok_or_else(|| ProviderError::InvalidState("`properties` was nil".to_string()))?
            .definition
            .as_ref()
            .ok_or_else(|| {
                ProviderError::InvalidState("`properties.definition` was nil".to_string())
            })
    }

    /// Mutable access to the definition, with the same errors as
    /// [`Workflow::definition`].
    pub fn definition_mut(&mut self) -> Result<&mut WorkflowDefinition, ProviderError> {
        self.properties
            .as_mut()
            .ok_or_else(|| ProviderError::InvalidState("`properties` was nil".to_string()))?
            .definition
            .as_mut()
            .ok_or_else(|| {
                ProviderError::InvalidState("`properties.definition` was nil".to_string())
            })
    }
}

/// The workflow definition: an arbitrary JSON object whose `actions` and
/// `triggers` members map component names to component bodies.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowDefinition(Map<String, Value>);

impl WorkflowDefinition {
    /// The definition a freshly created workflow carries.
    pub fn new() -> Self {
        let mut map = Map::new();
        map.insert("$schema".to_string(), Value::from(DEFINITION_SCHEMA));
        map.insert(
            "contentVersion".to_string(),
            Value::from(DEFINITION_CONTENT_VERSION),
        );
        map.insert("actions".to_string(), Value::Object(Map::new()));
        map.insert("triggers".to_string(), Value::Object(Map::new()));
        map.insert("parameters".to_string(), Value::Object(Map::new()));
        Self(map)
    }

    /// The raw document.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the wrapper, returning the raw document.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// The component map for `kind`, or `None` if the definition has none.
    pub fn components(
        &self,
        kind: ComponentKind,
    ) -> Result<Option<&Map<String, Value>>, ProviderError> {
        match self.0.get(kind.property_name()) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(not_an_object(kind.property_name(), other)),
        }
    }

    /// A single component body. Bodies must be JSON objects.
    pub fn component(
        &self,
        kind: ComponentKind,
        name: &str,
    ) -> Result<Option<&Map<String, Value>>, ProviderError> {
        let Some(components) = self.components(kind)? else {
            return Ok(None);
        };
        match components.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(body)) => Ok(Some(body)),
            Some(other) => Err(not_an_object(
                &format!("{}.{}", kind.property_name(), name),
                other,
            )),
        }
    }

    /// Whether a component named `name` exists.
    pub fn contains(&self, kind: ComponentKind, name: &str) -> Result<bool, ProviderError> {
        Ok(self
            .components(kind)?
            .is_some_and(|components| components.contains_key(name)))
    }

    /// Mutable access to the component map for `kind`, creating it if absent.
    pub fn components_mut(
        &mut self,
        kind: ComponentKind,
    ) -> Result<&mut Map<String, Value>, ProviderError> {
        let property = kind.property_name();
        let entry = self
            .0
            .entry(property)
            .or_insert_with(|| Value::Object(Map::new()));
        if entry.is_null() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(map) => Ok(map),
            other => Err(not_an_object(property, other)),
        }
    }
}

impl From<Map<String, Value>> for WorkflowDefinition {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn not_an_object(path: &str, value: &Value) -> ProviderError {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    ProviderError::InvalidState(format!(
        "expected `{}` in the workflow definition to be an object, got {}",
        path, kind
    ))
}
