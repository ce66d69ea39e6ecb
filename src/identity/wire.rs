//! Wire shapes used by different Azure APIs for the same identity concept.
//!
//! Every shape converts to and from [`ExpandedConfig`] through
//! [`ExpandedConfigCaster`]. Casting is lossless only for the fields a shape
//! carries; anything else is dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::config::{ExpandedConfig, IdentityType};

/// Conversion between a wire shape and the canonical [`ExpandedConfig`].
///
/// `Option<T>` implements this for every caster `T`: `None` casts to
/// `ExpandedConfig::default()` and ignores `cast_from_expanded_config`, so
/// callers holding an optional API field need no check of their own.
pub trait ExpandedConfigCaster {
    /// Server response to canonical form.
    fn cast_to_expanded_config(&self) -> ExpandedConfig;

    /// Canonical form to server request. Overwrites every field of `self`.
    fn cast_from_expanded_config(&mut self, config: &ExpandedConfig);
}

impl<T: ExpandedConfigCaster> ExpandedConfigCaster for Option<T> {
    fn cast_to_expanded_config(&self) -> ExpandedConfig {
        match self {
            Some(inner) => inner.cast_to_expanded_config(),
            None => ExpandedConfig::default(),
        }
    }

    fn cast_from_expanded_config(&mut self, config: &ExpandedConfig) {
        if let Some(inner) = self {
            inner.cast_from_expanded_config(config);
        }
    }
}

/// A User Assigned identity entry in the list-based shapes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentityListItem {
    /// Resource ID of the identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Client ID; returned by the server only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Principal ID; returned by the server only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
}

/// Per-identity details in the map-based shapes, keyed by resource ID.
///
/// Requests send an empty object for each identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentityDetails {
    /// Client ID; returned by the server only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Principal ID; returned by the server only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
}

/// Some APIs return `null` for the details of an identity.
fn deserialize_identity_map<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, UserAssignedIdentityDetails>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<UserAssignedIdentityDetails>>> =
        Option::deserialize(deserializer)?;
    Ok(raw.map(|entries| {
        entries
            .into_iter()
            .map(|(id, details)| (id, details.unwrap_or_default()))
            .collect()
    }))
}

fn ids_to_list_items(ids: &[String]) -> Vec<UserAssignedIdentityListItem> {
    ids.iter()
        .map(|id| UserAssignedIdentityListItem {
            resource_id: Some(id.clone()),
            ..Default::default()
        })
        .collect()
}

fn ids_to_map(ids: &[String]) -> BTreeMap<String, UserAssignedIdentityDetails> {
    ids.iter()
        .map(|id| (id.clone(), UserAssignedIdentityDetails::default()))
        .collect()
}

/// `{type, tenantId, principalId}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemAssignedIdentity {
    /// The identity type.
    #[serde(rename = "type", default)]
    pub identity_type: IdentityType,
    /// Tenant ID of the System Assigned identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Principal ID of the System Assigned identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
}

impl ExpandedConfigCaster for SystemAssignedIdentity {
    fn cast_to_expanded_config(&self) -> ExpandedConfig {
        ExpandedConfig {
            identity_type: self.identity_type,
            principal_id: self.principal_id.clone(),
            tenant_id: self.tenant_id.clone(),
            user_assigned_identity_ids: None,
        }
    }

    fn cast_from_expanded_config(&mut self, config: &ExpandedConfig) {
        self.identity_type = config.identity_type;
        self.principal_id = config.principal_id.clone();
        self.tenant_id = config.tenant_id.clone();
    }
}

/// `{type, userAssignedIdentities: [{resourceId, clientId, principalId}]}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentityList {
    /// The identity type.
    #[serde(rename = "type", default)]
    pub identity_type: IdentityType,
    /// The assigned identities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_assigned_identities: Option<Vec<UserAssignedIdentityListItem>>,
}

impl ExpandedConfigCaster for UserAssignedIdentityList {
    fn cast_to_expanded_config(&self) -> ExpandedConfig {
        // Reads principalId where SystemUserAssignedIdentityList reads
        // resourceId. Kept distinct until checked against live responses.
        let ids = self.user_assigned_identities.as_ref().map(|items| {
            items
                .iter()
                .filter_map(|item| item.principal_id.clone())
                .collect()
        });

        ExpandedConfig {
            identity_type: self.identity_type,
            user_assigned_identity_ids: ids,
            ..Default::default()
        }
    }

    fn cast_from_expanded_config(&mut self, config: &ExpandedConfig) {
        self.identity_type = config.identity_type;
        self.user_assigned_identities = config
            .user_assigned_identity_ids
            .as_deref()
            .map(ids_to_list_items);
    }
}

/// `{type, userAssignedIdentities: {resourceId: {clientId, principalId}}}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentityMap {
    /// The identity type.
    #[serde(rename = "type", default)]
    pub identity_type: IdentityType,
    /// The assigned identities keyed by resource ID.
    #[serde(
        default,
        deserialize_with = "deserialize_identity_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_assigned_identities: Option<BTreeMap<String, UserAssignedIdentityDetails>>,
}

impl ExpandedConfigCaster for UserAssignedIdentityMap {
    fn cast_to_expanded_config(&self) -> ExpandedConfig {
        ExpandedConfig {
            identity_type: self.identity_type,
            user_assigned_identity_ids: self
                .user_assigned_identities
                .as_ref()
                .map(|m| m.keys().cloned().collect()),
            ..Default::default()
        }
    }

    fn cast_from_expanded_config(&mut self, config: &ExpandedConfig) {
        self.identity_type = config.identity_type;
        self.user_assigned_identities = config.user_assigned_identity_ids.as_deref().map(ids_to_map);
    }
}

/// System Assigned fields plus the list-based User Assigned identities.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemUserAssignedIdentityList {
    /// The identity type.
    #[serde(rename = "type", default)]
    pub identity_type: IdentityType,
    /// Tenant ID of the System Assigned identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Principal ID of the System Assigned identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    /// The assigned identities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_assigned_identities: Option<Vec<UserAssignedIdentityListItem>>,
}

impl ExpandedConfigCaster for SystemUserAssignedIdentityList {
    fn cast_to_expanded_config(&self) -> ExpandedConfig {
        let ids = self.user_assigned_identities.as_ref().map(|items| {
            items
                .iter()
                .filter_map(|item| item.resource_id.clone())
                .collect()
        });

        ExpandedConfig {
            identity_type: self.identity_type,
            principal_id: self.principal_id.clone(),
            tenant_id: self.tenant_id.clone(),
            user_assigned_identity_ids: ids,
        }
    }

    fn cast_from_expanded_config(&mut self, config: &ExpandedConfig) {
        self.identity_type = config.identity_type;
        self.principal_id = config.principal_id.clone();
        self.tenant_id = config.tenant_id.clone();
        self.user_assigned_identities = config
            .user_assigned_identity_ids
            .as_deref()
            .map(ids_to_list_items);
    }
}

/// System Assigned fields plus the map-based User Assigned identities.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemUserAssignedIdentityMap {
    /// The identity type.
    #[serde(rename = "type", default)]
    pub identity_type: IdentityType,
    /// Tenant ID of the System Assigned identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Principal ID of the System Assigned identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    /// The assigned identities keyed by resource ID.
    #[serde(
        default,
        deserialize_with = "deserialize_identity_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_assigned_identities: Option<BTreeMap<String, UserAssignedIdentityDetails>>,
}

impl ExpandedConfigCaster for SystemUserAssignedIdentityMap {
    fn cast_to_expanded_config(&self) -> ExpandedConfig {
        ExpandedConfig {
            identity_type: self.identity_type,
            principal_id: self.principal_id.clone(),
            tenant_id: self.tenant_id.clone(),
            user_assigned_identity_ids: self
                .user_assigned_identities
                .as_ref()
                .map(|m| m.keys().cloned().collect()),
        }
    }

    fn cast_from_expanded_config(&mut self, config: &ExpandedConfig) {
        self.identity_type = config.identity_type;
        self.principal_id = config.principal_id.clone();
        self.tenant_id = config.tenant_id.clone();
        self.user_assigned_identities = config.user_assigned_identity_ids.as_deref().map(ids_to_map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ID1: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1/providers/Microsoft.ManagedIdentity/userAssignedIdentities/id1";

    fn user_assigned(ids: &[&str]) -> ExpandedConfig {
        ExpandedConfig {
            identity_type: IdentityType::UserAssigned,
            user_assigned_identity_ids: Some(ids.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_none_casts_to_zero_value() {
        assert_eq!(
            None::<SystemAssignedIdentity>.cast_to_expanded_config(),
            ExpandedConfig::default()
        );
        assert_eq!(
            None::<UserAssignedIdentityList>.cast_to_expanded_config(),
            ExpandedConfig::default()
        );
        assert_eq!(
            None::<UserAssignedIdentityMap>.cast_to_expanded_config(),
            ExpandedConfig::default()
        );
        assert_eq!(
            None::<SystemUserAssignedIdentityList>.cast_to_expanded_config(),
            ExpandedConfig::default()
        );
        assert_eq!(
            None::<SystemUserAssignedIdentityMap>.cast_to_expanded_config(),
            ExpandedConfig::default()
        );
    }

    #[test]
    fn test_none_cast_from_is_noop() {
        let config = user_assigned(&[ID1]);

        let mut a: Option<SystemAssignedIdentity> = None;
        a.cast_from_expanded_config(&config);
        assert!(a.is_none());

        let mut b: Option<UserAssignedIdentityList> = None;
        b.cast_from_expanded_config(&config);
        assert!(b.is_none());

        let mut c: Option<UserAssignedIdentityMap> = None;
        c.cast_from_expanded_config(&config);
        assert!(c.is_none());

        let mut d: Option<SystemUserAssignedIdentityList> = None;
        d.cast_from_expanded_config(&config);
        assert!(d.is_none());

        let mut e: Option<SystemUserAssignedIdentityMap> = None;
        e.cast_from_expanded_config(&config);
        assert!(e.is_none());
    }

    #[test]
    fn test_some_delegates_to_inner() {
        let mut wire = Some(UserAssignedIdentityMap::default());
        wire.cast_from_expanded_config(&user_assigned(&[ID1]));
        assert_eq!(wire.cast_to_expanded_config(), user_assigned(&[ID1]));
    }

    #[test]
    fn test_system_user_assigned_map_from_response() {
        let wire: SystemUserAssignedIdentityMap = serde_json::from_value(json!({
            "type": "SystemAssigned, UserAssigned",
            "tenantId": "t1",
            "principalId": "p1",
            "userAssignedIdentities": {ID1: {}}
        }))
        .unwrap();

        assert_eq!(
            wire.cast_to_expanded_config(),
            ExpandedConfig {
                identity_type: IdentityType::SystemAssignedUserAssigned,
                tenant_id: Some("t1".to_string()),
                principal_id: Some("p1".to_string()),
                user_assigned_identity_ids: Some(vec![ID1.to_string()]),
            }
        );
    }

    #[test]
    fn test_map_nil_vs_empty() {
        let absent: UserAssignedIdentityMap =
            serde_json::from_value(json!({"type": "UserAssigned"})).unwrap();
        assert_eq!(absent.cast_to_expanded_config().user_assigned_identity_ids, None);

        let null: UserAssignedIdentityMap =
            serde_json::from_value(json!({"type": "UserAssigned", "userAssignedIdentities": null}))
                .unwrap();
        assert_eq!(null.cast_to_expanded_config().user_assigned_identity_ids, None);

        let empty: UserAssignedIdentityMap =
            serde_json::from_value(json!({"type": "UserAssigned", "userAssignedIdentities": {}}))
                .unwrap();
        assert_eq!(
            empty.cast_to_expanded_config().user_assigned_identity_ids,
            Some(vec![])
        );
    }

    #[test]
    fn test_list_nil_vs_empty() {
        let absent = SystemUserAssignedIdentityList::default();
        assert_eq!(absent.cast_to_expanded_config().user_assigned_identity_ids, None);

        let empty = SystemUserAssignedIdentityList {
            user_assigned_identities: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(
            empty.cast_to_expanded_config().user_assigned_identity_ids,
            Some(vec![])
        );

        let empty = UserAssignedIdentityList {
            user_assigned_identities: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(
            empty.cast_to_expanded_config().user_assigned_identity_ids,
            Some(vec![])
        );
    }

    #[test]
    fn test_map_tolerates_null_details() {
        let wire: UserAssignedIdentityMap = serde_json::from_value(json!({
            "type": "UserAssigned",
            "userAssignedIdentities": {ID1: null}
        }))
        .unwrap();
        assert_eq!(wire.cast_to_expanded_config(), user_assigned(&[ID1]));
    }

    #[test]
    fn test_map_drops_per_identity_details() {
        let wire: UserAssignedIdentityMap = serde_json::from_value(json!({
            "type": "UserAssigned",
            "userAssignedIdentities": {ID1: {"clientId": "c1", "principalId": "p1"}}
        }))
        .unwrap();
        let config = wire.cast_to_expanded_config();
        assert_eq!(config, user_assigned(&[ID1]));
        assert!(config.principal_id.is_none());
    }

    #[test]
    fn test_map_cast_from_sends_empty_details() {
        let mut wire = SystemUserAssignedIdentityMap {
            principal_id: Some("stale".to_string()),
            ..Default::default()
        };
        wire.cast_from_expanded_config(&user_assigned(&[ID1]));

        assert!(wire.principal_id.is_none());
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({"type": "UserAssigned", "userAssignedIdentities": {ID1: {}}})
        );
    }

    #[test]
    fn test_cast_from_overwrites_identities() {
        let mut wire = UserAssignedIdentityMap {
            identity_type: IdentityType::UserAssigned,
            user_assigned_identities: Some(ids_to_map(&[ID1.to_string()])),
        };
        wire.cast_from_expanded_config(&ExpandedConfig {
            identity_type: IdentityType::SystemAssigned,
            ..Default::default()
        });
        assert_eq!(wire.identity_type, IdentityType::SystemAssigned);
        assert!(wire.user_assigned_identities.is_none());
    }

    #[test]
    fn test_list_cast_from_sets_resource_ids() {
        let mut wire = SystemUserAssignedIdentityList::default();
        let config = ExpandedConfig {
            identity_type: IdentityType::SystemAssignedUserAssigned,
            tenant_id: Some("t1".to_string()),
            principal_id: Some("p1".to_string()),
            user_assigned_identity_ids: Some(vec![ID1.to_string()]),
        };
        wire.cast_from_expanded_config(&config);

        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({
                "type": "SystemAssigned, UserAssigned",
                "tenantId": "t1",
                "principalId": "p1",
                "userAssignedIdentities": [{"resourceId": ID1}]
            })
        );
        assert_eq!(wire.cast_to_expanded_config(), config);
    }

    #[test]
    fn test_list_shapes_read_different_fields() {
        let items = vec![UserAssignedIdentityListItem {
            resource_id: Some(ID1.to_string()),
            client_id: Some("c1".to_string()),
            principal_id: Some("p1".to_string()),
        }];

        let user = UserAssignedIdentityList {
            identity_type: IdentityType::UserAssigned,
            user_assigned_identities: Some(items.clone()),
        };
        assert_eq!(
            user.cast_to_expanded_config().user_assigned_identity_ids,
            Some(vec!["p1".to_string()])
        );

        let both = SystemUserAssignedIdentityList {
            identity_type: IdentityType::SystemAssignedUserAssigned,
            user_assigned_identities: Some(items),
            ..Default::default()
        };
        assert_eq!(
            both.cast_to_expanded_config().user_assigned_identity_ids,
            Some(vec![ID1.to_string()])
        );
    }

    #[test]
    fn test_system_assigned_round_trip() {
        let wire: SystemAssignedIdentity = serde_json::from_value(json!({
            "type": "SystemAssigned",
            "tenantId": "t1",
            "principalId": "p1"
        }))
        .unwrap();

        let config = wire.cast_to_expanded_config();
        assert!(config.user_assigned_identity_ids.is_none());

        let mut back = SystemAssignedIdentity::default();
        back.cast_from_expanded_config(&config);
        assert_eq!(back, wire);
    }

    #[test]
    fn test_legacy_type_string_accepted() {
        let wire: SystemUserAssignedIdentityMap = serde_json::from_value(json!({
            "type": "SystemAssigned,UserAssigned",
            "userAssignedIdentities": {}
        }))
        .unwrap();
        assert_eq!(wire.identity_type, IdentityType::SystemAssignedUserAssigned);
    }

    #[test]
    fn test_type_spelling_variants_from_api() {
        let wire: SystemAssignedIdentity = serde_json::from_value(json!({
            "type": "systemAssigned",
            "principalId": "p1"
        }))
        .unwrap();
        assert_eq!(wire.identity_type, IdentityType::SystemAssigned);

        let wire: UserAssignedIdentityMap = serde_json::from_value(json!({
            "type": "SystemAssigned,  UserAssigned",
            "userAssignedIdentities": {"/sub/id1": {}}
        }))
        .unwrap();
        let config = wire.cast_to_expanded_config();
        assert_eq!(config.identity_type, IdentityType::SystemAssignedUserAssigned);
        assert_eq!(config.user_assigned_identity_ids, Some(vec!["/sub/id1".to_string()]));

        // requests are sent with the canonical spelling
        let mut request = UserAssignedIdentityMap::default();
        request.cast_from_expanded_config(&config);
        assert_eq!(
            serde_json::to_value(&request).unwrap()["type"],
            "SystemAssigned, UserAssigned"
        );
    }
}
