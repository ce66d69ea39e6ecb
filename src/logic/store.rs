//! The remote workflow store.

use std::sync::Arc;

use async_trait::async_trait;

use super::Workflow;
use crate::error::ProviderError;

/// Fetches and replaces whole workflow documents.
///
/// Implementations wrap the Logic Apps REST client. A workflow that does not
/// exist must be reported as [`ProviderError::NotFound`] so callers can tell
/// it apart from transport failures, which are reported as
/// [`ProviderError::Upstream`].
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Fetch the workflow `name` in `resource_group`.
    async fn get(&self, resource_group: &str, name: &str) -> Result<Workflow, ProviderError>;

    /// Replace the workflow `name` in `resource_group` with `workflow`.
    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        workflow: Workflow,
    ) -> Result<(), ProviderError>;
}

#[async_trait]
impl<S: WorkflowStore + ?Sized> WorkflowStore for Arc<S> {
    async fn get(&self, resource_group: &str, name: &str) -> Result<Workflow, ProviderError> {
        (**self).get(resource_group, name).await
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        workflow: Workflow,
    ) -> Result<(), ProviderError> {
        (**self).create_or_update(resource_group, name, workflow).await
    }
}
