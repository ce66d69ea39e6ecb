//! Managed Identity blocks.
//!
//! Three representations of the same concept meet here:
//!
//! - the user-facing `identity` block, a zero-or-one element list of maps
//!   described by [`Identity::schema`];
//! - the canonical [`ExpandedConfig`];
//! - the wire shapes in [`wire`], one per Azure API family.
//!
//! [`Identity::expand`] and [`Identity::flatten`] convert between the first two,
//! [`ExpandedConfigCaster`] between the last two. Everything here is a pure
//! transformation and safe to call concurrently.
//!
//! ```
//! use azurerm_provider_core::identity::{
//!     ExpandedConfigCaster, Identity, SystemUserAssignedIdentityMap,
//! };
//! use serde_json::json;
//!
//! let id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/id1";
//! let config = Identity::SystemAssignedUserAssigned
//!     .expand(&[json!({"type": "UserAssigned", "identity_ids": [id]})])
//!     .unwrap();
//!
//! let mut request = SystemUserAssignedIdentityMap::default();
//! request.cast_from_expanded_config(&config);
//! assert_eq!(
//!     serde_json::to_value(&request).unwrap(),
//!     json!({"type": "UserAssigned", "userAssignedIdentities": {id: {}}}),
//! );
//! ```

mod config;
mod variant;
pub mod wire;

pub use config::{ExpandedConfig, IdentityType};
pub use variant::Identity;
pub use wire::{
    ExpandedConfigCaster, SystemAssignedIdentity, SystemUserAssignedIdentityList,
    SystemUserAssignedIdentityMap, UserAssignedIdentityDetails, UserAssignedIdentityList,
    UserAssignedIdentityListItem, UserAssignedIdentityMap,
};
