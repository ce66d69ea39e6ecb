//! The canonical in-memory identity model.

use std::fmt;
use std::str::FromStr;

use serde::de::{Error as SerdeError, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ProviderError;

/// The kind of Managed Identity assigned to a resource.
///
/// Serializes to Azure's exact strings. Deserializing from the API is lenient:
/// casing and whitespace around the comma are ignored, and a missing or null
/// `type` reads as `None`, since API versions disagree on the spelling.
/// [`FromStr`] stays strict; it parses user configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum IdentityType {
    /// No identity is assigned.
    #[default]
    None,
    /// A System Assigned identity managed by the resource.
    SystemAssigned,
    /// One or more User Assigned identities.
    UserAssigned,
    /// Both a System Assigned identity and User Assigned identities.
    #[serde(rename = "SystemAssigned, UserAssigned")]
    SystemAssignedUserAssigned,
}

impl IdentityType {
    /// The exact string used by the API and the user-facing schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::SystemAssigned => "SystemAssigned",
            Self::UserAssigned => "UserAssigned",
            Self::SystemAssignedUserAssigned => "SystemAssigned, UserAssigned",
        }
    }

    /// Whether the type carries User Assigned identities.
    pub fn includes_user_assigned(&self) -> bool {
        matches!(self, Self::UserAssigned | Self::SystemAssignedUserAssigned)
    }

    /// Whether the type carries a System Assigned identity.
    pub fn includes_system_assigned(&self) -> bool {
        matches!(self, Self::SystemAssigned | Self::SystemAssignedUserAssigned)
    }
}

impl<'de> Deserialize<'de> for IdentityType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(Self::None);
        };
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "" | "none" => Ok(Self::None),
            "systemassigned" => Ok(Self::SystemAssigned),
            "userassigned" => Ok(Self::UserAssigned),
            "systemassigned,userassigned" => Ok(Self::SystemAssignedUserAssigned),
            _ => Err(D::Error::invalid_value(
                Unexpected::Str(&raw),
                &"a Managed Identity type",
            )),
        }
    }
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "SystemAssigned" => Ok(Self::SystemAssigned),
            "UserAssigned" => Ok(Self::UserAssigned),
            "SystemAssigned, UserAssigned" | "SystemAssigned,UserAssigned" => {
                Ok(Self::SystemAssignedUserAssigned)
            },
            other => Err(ProviderError::Validation(format!(
                "unsupported identity type {:?}",
                other
            ))),
        }
    }
}

/// The canonical form every identity wire shape converts to and from.
///
/// `user_assigned_identity_ids` distinguishes `None` (the attribute was absent
/// from the API response) from `Some(vec![])` (the API returned an empty
/// collection).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpandedConfig {
    /// The identity type.
    pub identity_type: IdentityType,
    /// Principal ID of the System Assigned identity; populated by the server.
    pub principal_id: Option<String>,
    /// Tenant ID of the System Assigned identity; populated by the server.
    pub tenant_id: Option<String>,
    /// Resource IDs of the User Assigned identities.
    pub user_assigned_identity_ids: Option<Vec<String>>,
}

impl ExpandedConfig {
    /// The "no identity configured" sentinel.
    pub fn none() -> Self {
        Self {
            identity_type: IdentityType::None,
            ..Default::default()
        }
    }

    /// Whether this represents an unset identity.
    pub fn is_none(&self) -> bool {
        self.identity_type == IdentityType::None
    }
}
