//! Typed Azure resource IDs.
//!
//! Segment names (`resourceGroups`, `providers`, ...) and provider namespaces
//! are matched case-insensitively, since the API does not preserve their
//! casing consistently. `Display` always prints the canonical form.

use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;
use crate::logic::ComponentKind;

/// A key segment followed by either a fixed value or a captured one.
type Segment = (&'static str, Option<&'static str>);

const WORKFLOW_SEGMENTS: [Segment; 4] = [
    ("subscriptions", None),
    ("resourceGroups", None),
    ("providers", Some("Microsoft.Logic")),
    ("workflows", None),
];

const USER_ASSIGNED_IDENTITY_SEGMENTS: [Segment; 4] = [
    ("subscriptions", None),
    ("resourceGroups", None),
    ("providers", Some("Microsoft.ManagedIdentity")),
    ("userAssignedIdentities", None),
];

fn parse_error(input: &str, kind: &str, reason: impl fmt::Display) -> ProviderError {
    ProviderError::InvalidRequest(format!("parsing {:?} as a {} ID: {}", input, kind, reason))
}

/// Split `input` into key/value pairs and match them against `template`,
/// returning the captured values and any trailing pairs.
fn parse_segments<'a>(
    input: &'a str,
    kind: &str,
    template: &[Segment],
) -> Result<(Vec<&'a str>, Vec<(&'a str, &'a str)>), ProviderError> {
    let rest = input
        .strip_prefix('/')
        .ok_or_else(|| parse_error(input, kind, "expected a leading '/'"))?;
    let parts: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
    if parts.len() % 2 != 0 {
        return Err(parse_error(input, kind, "expected key/value segment pairs"));
    }

    let mut pairs = parts.chunks(2).map(|c| (c[0], c[1]));
    let mut captured = Vec::new();
    for (key, fixed) in template {
        let (k, v) = pairs
            .next()
            .ok_or_else(|| parse_error(input, kind, format!("missing segment {:?}", key)))?;
        if !k.eq_ignore_ascii_case(key) {
            return Err(parse_error(
                input,
                kind,
                format!("expected segment {:?}, got {:?}", key, k),
            ));
        }
        if v.is_empty() {
            return Err(parse_error(input, kind, format!("segment {:?} is empty", key)));
        }
        match fixed {
            Some(expected) if !v.eq_ignore_ascii_case(expected) => {
                return Err(parse_error(
                    input,
                    kind,
                    format!("expected {:?} to be {:?}, got {:?}", key, expected, v),
                ));
            },
            Some(_) => {},
            None => captured.push(v),
        }
    }

    Ok((captured, pairs.collect()))
}

/// The ID of a Logic App Workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowId {
    /// Subscription containing the workflow.
    pub subscription_id: String,
    /// Resource group containing the workflow.
    pub resource_group: String,
    /// Name of the workflow.
    pub name: String,
}

impl WorkflowId {
    /// Create a new workflow ID.
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }

    /// The ID of a component (action or trigger) within this workflow.
    pub fn component(&self, kind: ComponentKind, name: impl Into<String>) -> ComponentId {
        ComponentId {
            workflow: self.clone(),
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Logic/workflows/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

impl FromStr for WorkflowId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (captured, rest) = parse_segments(s, "Logic App Workflow", &WORKFLOW_SEGMENTS)?;
        if !rest.is_empty() {
            return Err(parse_error(s, "Logic App Workflow", "unexpected trailing segments"));
        }
        Ok(Self::new(captured[0], captured[1], captured[2]))
    }
}

/// The ID of an action or trigger inside a Logic App Workflow definition.
///
/// This is not an Azure resource ID; it is the workflow ID with
/// `/actions/{name}` or `/triggers/{name}` appended.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentId {
    /// The workflow holding the component.
    pub workflow: WorkflowId,
    /// Whether this is an action or a trigger.
    pub kind: ComponentKind,
    /// The component's key in the definition map.
    pub name: String,
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.workflow,
            self.kind.property_name(),
            self.name
        )
    }
}

impl FromStr for ComponentId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind_name = "Logic App Workflow component";
        let (captured, rest) = parse_segments(s, kind_name, &WORKFLOW_SEGMENTS)?;
        let (property, name) = match rest.as_slice() {
            [(property, name)] if !name.is_empty() => (*property, *name),
            _ => {
                return Err(parse_error(
                    s,
                    kind_name,
                    "expected a trailing /actions/{name} or /triggers/{name}",
                ))
            },
        };
        let kind = ComponentKind::from_property_name(property).ok_or_else(|| {
            parse_error(
                s,
                kind_name,
                format!("expected \"actions\" or \"triggers\", got {:?}", property),
            )
        })?;

        Ok(ComponentId {
            workflow: WorkflowId::new(captured[0], captured[1], captured[2]),
            kind,
            name: name.to_string(),
        })
    }
}

/// The ID of a User Assigned Managed Identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserAssignedIdentityId {
    /// Subscription containing the identity.
    pub subscription_id: String,
    /// Resource group containing the identity.
    pub resource_group: String,
    /// Name of the identity.
    pub name: String,
}

impl fmt::Display for UserAssignedIdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ManagedIdentity/userAssignedIdentities/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

impl FromStr for UserAssignedIdentityId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = "User Assigned Identity";
        let (captured, rest) = parse_segments(s, kind, &USER_ASSIGNED_IDENTITY_SEGMENTS)?;
        if !rest.is_empty() {
            return Err(parse_error(s, kind, "unexpected trailing segments"));
        }
        Ok(Self {
            subscription_id: captured[0].to_string(),
            resource_group: captured[1].to_string(),
            name: captured[2].to_string(),
        })
    }
}
