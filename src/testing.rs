//! Test doubles and assertion helpers.
//!
//! [`InMemoryWorkflowStore`] stands in for the Logic Apps REST client so the
//! component mutator can be exercised without network access.
//!
//! # Example
//!
//! ```
//! # tokio_test::block_on(async {
//! use azurerm_provider_core::logic::{Workflow, WorkflowStore};
//! use azurerm_provider_core::testing::InMemoryWorkflowStore;
//! use azurerm_provider_core::ProviderError;
//!
//! let store = InMemoryWorkflowStore::new();
//! store.insert("rg1", "wf1", Workflow::new("westeurope"));
//!
//! let workflow = store.get("rg1", "wf1").await.unwrap();
//! store.create_or_update("rg1", "wf1", workflow).await.unwrap();
//! assert_eq!(store.write_count(), 1);
//!
//! store.fail_next_get(ProviderError::Upstream("503 Service Unavailable".into()));
//! assert!(store.get("rg1", "wf1").await.is_err());
//! assert!(store.get("rg1", "missing").await.unwrap_err().is_not_found());
//! # });
//! ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::logic::{Workflow, WorkflowStore};
use crate::schema::{Diagnostic, DiagnosticSeverity};

/// A [`WorkflowStore`] backed by a map, with write counting, injected
/// failures and optional latency.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: Mutex<HashMap<(String, String), Workflow>>,
    writes: Mutex<Vec<(String, String)>>,
    fail_get: Mutex<Option<ProviderError>>,
    fail_write: Mutex<Option<ProviderError>>,
    latency: Option<Duration>,
}

impl InMemoryWorkflowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` at the start of every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed a workflow without counting it as a write.
    pub fn insert(&self, resource_group: &str, name: &str, workflow: Workflow) {
        lock(&self.workflows).insert(key(resource_group, name), workflow);
    }

    /// A copy of the stored workflow.
    pub fn workflow(&self, resource_group: &str, name: &str) -> Option<Workflow> {
        lock(&self.workflows).get(&key(resource_group, name)).cloned()
    }

    /// Remove a workflow, as if it had been deleted out of band.
    pub fn delete(&self, resource_group: &str, name: &str) -> Option<Workflow> {
        lock(&self.workflows).remove(&key(resource_group, name))
    }

    /// Number of successful `create_or_update` calls.
    pub fn write_count(&self) -> usize {
        lock(&self.writes).len()
    }

    /// `(resource_group, name)` of every successful write, in order.
    pub fn writes(&self) -> Vec<(String, String)> {
        lock(&self.writes).clone()
    }

    /// Make the next `get` fail with `error`.
    pub fn fail_next_get(&self, error: ProviderError) {
        *lock(&self.fail_get) = Some(error);
    }

    /// Make the next `create_or_update` fail with `error`.
    pub fn fail_next_write(&self, error: ProviderError) {
        *lock(&self.fail_write) = Some(error);
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get(&self, resource_group: &str, name: &str) -> Result<Workflow, ProviderError> {
        self.delay().await;

        if let Some(error) = lock(&self.fail_get).take() {
            return Err(error);
        }
        self.workflow(resource_group, name).ok_or_else(|| {
            ProviderError::NotFound(format!(
                "Logic App Workflow {:?} (Resource Group {:?}) was not found",
                name, resource_group
            ))
        })
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        workflow: Workflow,
    ) -> Result<(), ProviderError> {
        self.delay().await;

        if let Some(error) = lock(&self.fail_write).take() {
            return Err(error);
        }
        self.insert(resource_group, name, workflow);
        lock(&self.writes).push(key(resource_group, name));
        Ok(())
    }
}

fn key(resource_group: &str, name: &str) -> (String, String) {
    (resource_group.to_string(), name.to_string())
}

// a panicking test must not cascade into every later assertion
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors
            .iter()
            .map(|d| (&d.summary, &d.attribute))
            .collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    let has_errors = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error));

    assert!(has_errors, "Expected at least one error, but got none");
}

/// Assert that diagnostics contain an error whose summary or detail contains
/// `substring`.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let matches = |d: &Diagnostic| {
        d.summary.contains(substring)
            || d.detail.as_deref().is_some_and(|detail| detail.contains(substring))
    };
    let has_matching_error = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && matches(d));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
