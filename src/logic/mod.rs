//! Logic App Workflow components.
//!
//! Actions and triggers are not Azure resources of their own: they are named
//! entries in the `actions` and `triggers` maps of a workflow's definition.
//! [`ComponentMutator`] inserts, removes and reads those entries by fetching
//! the whole workflow, changing one key and writing the whole workflow back,
//! all while holding the workflow's named lock.
//!
//! ```
//! # tokio_test::block_on(async {
//! use azurerm_provider_core::locks::LockManager;
//! use azurerm_provider_core::logic::{ComponentKind, ComponentMutator, UpsertMode, Workflow};
//! use azurerm_provider_core::testing::InMemoryWorkflowStore;
//! use serde_json::json;
//!
//! let store = InMemoryWorkflowStore::new();
//! store.insert("rg1", "wf1", Workflow::new("westeurope"));
//!
//! let mutator = ComponentMutator::new(store, LockManager::new());
//! let id = mutator
//!     .update(
//!         "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Logic/workflows/wf1",
//!         ComponentKind::Trigger,
//!         "manual",
//!         json!({"type": "Request", "kind": "Http"}),
//!         UpsertMode::Create,
//!         "azurerm_logic_app_trigger_http_request",
//!     )
//!     .await
//!     .unwrap();
//! assert!(id.to_string().ends_with("/workflows/wf1/triggers/manual"));
//!
//! let found = mutator
//!     .retrieve("rg1", "wf1", ComponentKind::Trigger, "manual")
//!     .await
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(found.value["kind"], "Http");
//! # });
//! ```

use std::fmt;

mod mutator;
mod store;
mod workflow;

pub use mutator::{ComponentMutator, RetrievedComponent, UpsertMode};
pub use store::WorkflowStore;
pub use workflow::{Workflow, WorkflowDefinition, WorkflowProperties};

/// Lock namespace shared by the workflow resource and its components.
pub const LOGIC_APP_RESOURCE_NAME: &str = "azurerm_logic_app";

/// Which map of the workflow definition a component lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// An entry in `actions`.
    Action,
    /// An entry in `triggers`.
    Trigger,
}

impl ComponentKind {
    /// The definition property holding this kind of component.
    pub fn property_name(&self) -> &'static str {
        match self {
            Self::Action => "actions",
            Self::Trigger => "triggers",
        }
    }

    /// Inverse of [`ComponentKind::property_name`].
    pub fn from_property_name(property: &str) -> Option<Self> {
        match property {
            "actions" => Some(Self::Action),
            "triggers" => Some(Self::Trigger),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action => f.write_str("Action"),
            Self::Trigger => f.write_str("Trigger"),
        }
    }
}
