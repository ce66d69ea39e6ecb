//! Expand/flatten between the user-facing `identity` block and
//! [`ExpandedConfig`].

use serde_json::{json, Map, Value};

use super::config::{ExpandedConfig, IdentityType};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, StringValidator};

/// The identity block variants a resource can expose.
///
/// Each variant decides which `type` values are allowed and whether
/// `identity_ids` / `principal_id` / `tenant_id` are part of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Only a System Assigned identity; `type` is implied.
    SystemAssigned,
    /// Only User Assigned identities.
    UserAssigned,
    /// `SystemAssigned`, `UserAssigned` or both.
    SystemAssignedUserAssigned,
    /// Exactly one of `SystemAssigned` or `UserAssigned`.
    SystemOrUserAssigned,
}

impl Identity {
    /// Expand the user's `identity` block (zero or one element) into the
    /// canonical form.
    ///
    /// An empty list or a null element yields [`ExpandedConfig::none`].
    ///
    /// # Examples
    ///
    /// ```
    /// use azurerm_provider_core::identity::{Identity, IdentityType};
    /// use serde_json::json;
    ///
    /// let config = Identity::SystemAssignedUserAssigned
    ///     .expand(&[json!({"type": "SystemAssigned"})])
    ///     .unwrap();
    /// assert_eq!(config.identity_type, IdentityType::SystemAssigned);
    /// ```
    pub fn expand(&self, input: &[Value]) -> Result<ExpandedConfig, ProviderError> {
        let raw = match input.first() {
            None | Some(Value::Null) => return Ok(ExpandedConfig::none()),
            Some(Value::Object(raw)) => raw,
            Some(_) => {
                return Err(ProviderError::Validation(
                    "expected `identity` to be a block".to_string(),
                ))
            },
        };

        match self {
            Self::SystemAssigned => Ok(ExpandedConfig {
                identity_type: IdentityType::SystemAssigned,
                ..Default::default()
            }),
            Self::UserAssigned => Ok(ExpandedConfig {
                identity_type: self.read_allowed_type(raw)?,
                user_assigned_identity_ids: Some(read_identity_ids(raw)?),
                ..Default::default()
            }),
            Self::SystemAssignedUserAssigned => {
                let identity_type = self.read_allowed_type(raw)?;
                let identity_ids = read_identity_ids(raw)?;
                if !identity_ids.is_empty() && !identity_type.includes_user_assigned() {
                    return Err(ProviderError::Validation(format!(
                        "`identity_ids` can only be specified when `type` includes `UserAssigned`; but `type` is currently {:?}",
                        identity_type.as_str()
                    )));
                }

                Ok(ExpandedConfig {
                    identity_type,
                    user_assigned_identity_ids: Some(identity_ids),
                    ..Default::default()
                })
            },
            Self::SystemOrUserAssigned => {
                let identity_type = read_type(raw)?;
                if !matches!(
                    identity_type,
                    IdentityType::SystemAssigned | IdentityType::UserAssigned
                ) {
                    return Err(ProviderError::Validation(format!(
                        "`type` must be either `SystemAssigned` or `UserAssigned`; but `type` is currently {:?}",
                        identity_type.as_str()
                    )));
                }

                let identity_ids = read_identity_ids(raw)?;
                if !identity_ids.is_empty() && identity_type != IdentityType::UserAssigned {
                    return Err(ProviderError::Validation(format!(
                        "`identity_ids` can only be specified when `type` is `UserAssigned`; but `type` is currently {:?}",
                        identity_type.as_str()
                    )));
                }

                Ok(ExpandedConfig {
                    identity_type,
                    user_assigned_identity_ids: Some(identity_ids),
                    ..Default::default()
                })
            },
        }
    }

    /// Flatten the canonical form into the user-facing `identity` block.
    ///
    /// `None` or an identity of type `None` flattens to an empty list. Absent
    /// strings are written as `""` and absent ID lists as `[]`.
    pub fn flatten(&self, input: Option<&ExpandedConfig>) -> Vec<Value> {
        let input = match input {
            Some(input) if !input.is_none() => input,
            _ => return Vec::new(),
        };

        let identity_type = input.identity_type.as_str();
        let principal_id = input.principal_id.clone().unwrap_or_default();
        let tenant_id = input.tenant_id.clone().unwrap_or_default();
        let identity_ids = input.user_assigned_identity_ids.clone().unwrap_or_default();

        let block = match self {
            Self::SystemAssigned => json!({
                "type": identity_type,
                "principal_id": principal_id,
                "tenant_id": tenant_id,
            }),
            Self::UserAssigned => json!({
                "type": identity_type,
                "identity_ids": identity_ids,
            }),
            Self::SystemAssignedUserAssigned | Self::SystemOrUserAssigned => json!({
                "type": identity_type,
                "identity_ids": identity_ids,
                "principal_id": principal_id,
                "tenant_id": tenant_id,
            }),
        };

        vec![block]
    }

    /// The optional `identity` block for a resource.
    pub fn schema(&self) -> NestedBlock {
        NestedBlock::list(self.resource_block()).with_max_items(1)
    }

    /// The `identity` block for a resource where it must be set.
    pub fn schema_required(&self) -> NestedBlock {
        self.schema().with_min_items(1)
    }

    /// The computed `identity` block for a data source.
    pub fn schema_data_source(&self) -> NestedBlock {
        let mut block = Block::new()
            .with_attribute("type", Attribute::computed_string())
            .with_description("An `identity` block as exported by the API.");
        if self.supports_user_assigned() {
            block = block.with_attribute(
                "identity_ids",
                Attribute::string_list(AttributeFlags::computed()),
            );
        }
        if self.supports_system_assigned() {
            block = block
                .with_attribute("principal_id", Attribute::computed_string())
                .with_attribute("tenant_id", Attribute::computed_string());
        }
        NestedBlock::list(block).as_computed()
    }

    fn supports_user_assigned(&self) -> bool {
        !matches!(self, Self::SystemAssigned)
    }

    fn supports_system_assigned(&self) -> bool {
        !matches!(self, Self::UserAssigned)
    }

    fn allowed_types(&self) -> &'static [&'static str] {
        match self {
            Self::SystemAssigned => &["SystemAssigned"],
            Self::UserAssigned => &["UserAssigned"],
            Self::SystemAssignedUserAssigned => {
                &["SystemAssigned", "UserAssigned", "SystemAssigned, UserAssigned"]
            },
            Self::SystemOrUserAssigned => &["SystemAssigned", "UserAssigned"],
        }
    }

    /// Read `type`, rejecting values this variant does not offer (`None`
    /// included, which would otherwise pass for the unset sentinel).
    fn read_allowed_type(&self, raw: &Map<String, Value>) -> Result<IdentityType, ProviderError> {
        let identity_type = read_type(raw)?;
        let allowed = self.allowed_types();
        if allowed.contains(&identity_type.as_str()) {
            Ok(identity_type)
        } else {
            Err(ProviderError::Validation(format!(
                "`type` must be one of [{}]; but `type` is currently {:?}",
                allowed.join(", "),
                identity_type.as_str()
            )))
        }
    }

    fn resource_block(&self) -> Block {
        let mut block = Block::new().with_attribute(
            "type",
            Attribute::required_string()
                .with_description("The type of Managed Identity which should be assigned.")
                .with_validator(StringValidator::one_of(self.allowed_types())),
        );

        if self.supports_user_assigned() {
            let flags = if matches!(self, Self::UserAssigned) {
                AttributeFlags::required()
            } else {
                AttributeFlags::optional()
            };
            block = block.with_attribute(
                "identity_ids",
                Attribute::string_set(flags)
                    .with_description("User Assigned Managed Identity IDs to assign.")
                    .with_validator(StringValidator::UserAssignedIdentityId),
            );
        }

        if self.supports_system_assigned() {
            block = block
                .with_attribute("principal_id", Attribute::computed_string())
                .with_attribute("tenant_id", Attribute::computed_string());
        }

        block
    }
}

fn read_type(raw: &Map<String, Value>) -> Result<IdentityType, ProviderError> {
    match raw.get("type") {
        Some(Value::String(s)) => s.parse(),
        _ => Err(ProviderError::Validation(
            "`type` must be set within the `identity` block".to_string(),
        )),
    }
}

/// Read the `identity_ids` set, dropping duplicates but keeping first-seen order.
fn read_identity_ids(raw: &Map<String, Value>) -> Result<Vec<String>, ProviderError> {
    let items = match raw.get("identity_ids") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ProviderError::Validation(
                "`identity_ids` must be a set of strings".to_string(),
            ))
        },
    };

    let mut ids: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let id = item.as_str().ok_or_else(|| {
            ProviderError::Validation("`identity_ids` must be a set of strings".to_string())
        })?;
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}
