//! AzureRM Provider Core
//!
//! Shared building blocks for AzureRM provider resources: Managed Identity
//! blocks and the Logic App Workflow component mutator.
//!
//! # Overview
//!
//! - **Identity**: converts the user-facing `identity` block to the canonical
//!   [`ExpandedConfig`](identity::ExpandedConfig) and back, and casts between
//!   that and the wire shapes the various Azure APIs use
//! - **Logic Apps**: lock-protected read-modify-write of a workflow's
//!   `actions` and `triggers`, see [`ComponentMutator`]
//! - **Locks**: an explicit, process-local named-lock registry
//! - **Schema and validation**: declarative block descriptions and validation
//!   of JSON configuration against them
//! - **Resource IDs**: typed parsing of workflow, component and user assigned
//!   identity IDs
//! - **Configuration**: provider settings and per-operation timeouts
//! - **Logging**: `tracing` integration writing to stderr
//!
//! # Quick Start
//!
//! ```
//! # tokio_test::block_on(async {
//! use azurerm_provider_core::identity::{ExpandedConfigCaster, Identity, SystemUserAssignedIdentityMap};
//! use azurerm_provider_core::testing::InMemoryWorkflowStore;
//! use azurerm_provider_core::{ComponentKind, ComponentMutator, LockManager, UpsertMode, Workflow};
//! use serde_json::json;
//!
//! // expand the user's identity block into the request body
//! let config = Identity::SystemOrUserAssigned
//!     .expand(&[json!({"type": "SystemAssigned"})])
//!     .unwrap();
//! let mut identity = SystemUserAssignedIdentityMap::default();
//! identity.cast_from_expanded_config(&config);
//!
//! let mut workflow = Workflow::new("westeurope");
//! workflow.identity = Some(identity);
//!
//! let store = InMemoryWorkflowStore::new();
//! store.insert("rg1", "wf1", workflow);
//!
//! // add an action to the workflow's definition
//! let mutator = ComponentMutator::new(store, LockManager::new());
//! mutator
//!     .update(
//!         "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Logic/workflows/wf1",
//!         ComponentKind::Action,
//!         "compose",
//!         json!({"type": "Compose", "inputs": "hello"}),
//!         UpsertMode::Create,
//!         "azurerm_logic_app_action_custom",
//!     )
//!     .await
//!     .unwrap();
//!
//! mutator.remove("rg1", "wf1", ComponentKind::Action, "compose").await.unwrap();
//! # });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod identity;
pub mod ids;
pub mod locks;
pub mod logging;
pub mod logic;
pub mod schema;
pub mod testing;
pub mod validation;

// Re-export main types at crate root
pub use config::{ProviderConfig, Timeouts};
pub use error::ProviderError;
pub use identity::{ExpandedConfig, ExpandedConfigCaster, Identity, IdentityType};
pub use ids::{ComponentId, UserAssignedIdentityId, WorkflowId};
pub use locks::{LockManager, NamedLockGuard};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use logic::{
    ComponentKind, ComponentMutator, RetrievedComponent, UpsertMode, Workflow,
    WorkflowDefinition, WorkflowStore,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for store implementations
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
