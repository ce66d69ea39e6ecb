//! Lock-protected read-modify-write of workflow components.

use std::future::Future;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::{ComponentKind, Workflow, WorkflowStore, LOGIC_APP_RESOURCE_NAME};
use crate::config::Timeouts;
use crate::error::ProviderError;
use crate::ids::{ComponentId, WorkflowId};
use crate::locks::{LockManager, NamedLockGuard};

/// Whether an upsert is the first write of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// First-time creation: an existing entry with the same name is an
    /// "import as existing" error.
    Create,
    /// Later update of an entry this caller already manages.
    Update,
}

/// A component found by [`ComponentMutator::retrieve`], with the workflow it
/// was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedComponent {
    /// The component body.
    pub value: Map<String, Value>,
    /// The whole workflow document.
    pub workflow: Workflow,
}

/// Upserts, removes and reads named entries of a workflow's `actions` and
/// `triggers` maps.
///
/// Writes hold the workflow's named lock from before the fetch until after the
/// write. The lock is process-local and no ETag is sent with the write, so two
/// processes changing the same workflow can still lose each other's updates.
#[derive(Debug, Clone)]
pub struct ComponentMutator<S> {
    store: S,
    locks: LockManager,
    timeouts: Timeouts,
}

impl<S: WorkflowStore> ComponentMutator<S> {
    /// Create a mutator with default timeouts.
    pub fn new(store: S, locks: LockManager) -> Self {
        Self {
            store,
            locks,
            timeouts: Timeouts::default(),
        }
    }

    /// Replace the timeouts.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The lock registry.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// The timeouts in effect.
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Acquire the lock a workflow's components serialize on.
    ///
    /// Whole-workflow Create/Update/Delete take the same lock so they never
    /// interleave with a component write.
    pub async fn lock_workflow(&self, workflow_name: &str) -> NamedLockGuard {
        self.locks
            .by_name(workflow_name, LOGIC_APP_RESOURCE_NAME)
            .await
    }

    /// Set the component `name` of `kind` to `value` in the workflow
    /// `logic_app_id` and write the workflow back.
    ///
    /// In [`UpsertMode::Create`] an existing entry with the same name fails
    /// with [`ProviderError::AlreadyExists`] naming `resource_name`, and the
    /// workflow is left untouched. A missing workflow is an error in both
    /// modes. Returns the component's ID.
    #[instrument(skip(self, value))]
    pub async fn update(
        &self,
        logic_app_id: &str,
        kind: ComponentKind,
        name: &str,
        value: Value,
        mode: UpsertMode,
        resource_name: &str,
    ) -> Result<ComponentId, ProviderError> {
        let workflow_id: WorkflowId = logic_app_id.parse()?;
        check_component_name(kind, name)?;
        let component_id = workflow_id.component(kind, name);
        let Value::Object(body) = value else {
            return Err(ProviderError::InvalidRequest(format!(
                "the body of {} {:?} must be a JSON object",
                kind, name
            )));
        };

        let resource_group = workflow_id.resource_group.as_str();
        let workflow_name = workflow_id.name.as_str();
        let subject = describe("updating", kind, name, workflow_name, resource_group);
        let deadline = match mode {
            UpsertMode::Create => self.timeouts.create,
            UpsertMode::Update => self.timeouts.update,
        };

        let _lock = self.lock_workflow(workflow_name).await;

        with_deadline(deadline, &subject, async {
            let ctx = |e: ProviderError| e.context(&subject);

            let mut workflow = self.store.get(resource_group, workflow_name).await.map_err(ctx)?;
            let definition = workflow.definition_mut().map_err(ctx)?;

            if mode == UpsertMode::Create && definition.contains(kind, name).map_err(ctx)? {
                return Err(ProviderError::import_as_exists(
                    resource_name,
                    component_id.to_string(),
                ));
            }

            definition
                .components_mut(kind)
                .map_err(ctx)?
                .insert(name.to_string(), Value::Object(body));

            self.store
                .create_or_update(resource_group, workflow_name, workflow)
                .await
                .map_err(ctx)
        })
        .await?;

        info!(id = %component_id, "wrote Logic App {}", kind);
        Ok(component_id)
    }

    /// Delete the component `name` of `kind` and write the workflow back.
    ///
    /// Succeeds without writing when the workflow no longer exists, and
    /// writes the workflow unchanged when the component is already gone.
    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        resource_group: &str,
        workflow_name: &str,
        kind: ComponentKind,
        name: &str,
    ) -> Result<(), ProviderError> {
        let subject = describe("removing", kind, name, workflow_name, resource_group);

        let _lock = self.lock_workflow(workflow_name).await;

        with_deadline(self.timeouts.delete, &subject, async {
            let ctx = |e: ProviderError| e.context(&subject);

            let mut workflow = match self.store.get(resource_group, workflow_name).await {
                Ok(workflow) => workflow,
                Err(e) if e.is_not_found() => {
                    warn!("Logic App Workflow is gone, nothing to remove");
                    return Ok(());
                },
                Err(e) => return Err(ctx(e)),
            };

            let components = workflow
                .definition_mut()
                .and_then(|definition| definition.components_mut(kind))
                .map_err(ctx)?;
            if components.shift_remove(name).is_none() {
                debug!("component was already absent");
            }

            self.store
                .create_or_update(resource_group, workflow_name, workflow)
                .await
                .map_err(ctx)
        })
        .await?;

        info!("removed Logic App {}", kind);
        Ok(())
    }

    /// Read the component `name` of `kind`.
    ///
    /// Returns `Ok(None)` when the workflow or the component does not exist;
    /// any other failure is an error.
    #[instrument(skip(self))]
    pub async fn retrieve(
        &self,
        resource_group: &str,
        workflow_name: &str,
        kind: ComponentKind,
        name: &str,
    ) -> Result<Option<RetrievedComponent>, ProviderError> {
        let subject = describe("retrieving", kind, name, workflow_name, resource_group);

        with_deadline(self.timeouts.read, &subject, async {
            let workflow = match self.store.get(resource_group, workflow_name).await {
                Ok(workflow) => workflow,
                Err(e) if e.is_not_found() => {
                    debug!("Logic App Workflow not found");
                    return Ok(None);
                },
                Err(e) => return Err(e.context(&subject)),
            };

            let value = match workflow
                .definition()
                .and_then(|definition| definition.component(kind, name))
                .map_err(|e| e.context(&subject))?
            {
                Some(body) => body.clone(),
                None => {
                    debug!("component not found");
                    return Ok(None);
                },
            };

            Ok(Some(RetrievedComponent { value, workflow }))
        })
        .await
    }
}

// The name becomes the last segment of the component ID, which must parse back.
fn check_component_name(kind: ComponentKind, name: &str) -> Result<(), ProviderError> {
    if name.is_empty() || name.contains('/') {
        return Err(ProviderError::InvalidRequest(format!(
            "the name of a Logic App {} must be non-empty and must not contain `/`, got {:?}",
            kind, name
        )));
    }
    Ok(())
}

fn describe(
    verb: &str,
    kind: ComponentKind,
    name: &str,
    workflow_name: &str,
    resource_group: &str,
) -> String {
    format!(
        "{} {} {:?} in Logic App Workflow {:?} (Resource Group {:?})",
        verb, kind, name, workflow_name, resource_group
    )
}

async fn with_deadline<T, F>(deadline: Duration, subject: &str, fut: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::DeadlineExceeded(format!(
            "{}: did not complete within {}",
            subject,
            humantime::format_duration(deadline)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::WorkflowDefinition;
    use crate::testing::InMemoryWorkflowStore;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    const WORKFLOW_ID: &str =
        "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Logic/workflows/wf1";
    const ACTION_RESOURCE: &str = "azurerm_logic_app_action_custom";

    fn workflow(definition: Value) -> Workflow {
        let mut workflow = Workflow::new("westeurope");
        if let Some(properties) = workflow.properties.as_mut() {
            properties.definition = Some(serde_json::from_value(definition).unwrap());
        }
        workflow
    }

    fn mutator_with(workflow: Workflow) -> ComponentMutator<InMemoryWorkflowStore> {
        let store = InMemoryWorkflowStore::new();
        store.insert("rg1", "wf1", workflow);
        ComponentMutator::new(store, LockManager::new())
    }

    fn stored_definition(mutator: &ComponentMutator<InMemoryWorkflowStore>) -> Value {
        let workflow = mutator.store().workflow("rg1", "wf1").unwrap();
        serde_json::to_value(workflow.definition().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_update_creates_component() {
        let mutator = mutator_with(workflow(json!({
            "$schema": "s",
            "actions": {},
            "triggers": {"manual": {"type": "Request"}},
            "outputs": {"result": 1}
        })));

        let id = assert_ok!(
            mutator
                .update(
                    WORKFLOW_ID,
                    ComponentKind::Action,
                    "send",
                    json!({"type": "Http", "inputs": {"method": "GET"}}),
                    UpsertMode::Create,
                    ACTION_RESOURCE,
                )
                .await
        );

        assert_eq!(id.to_string(), format!("{}/actions/send", WORKFLOW_ID));
        assert_eq!(mutator.store().write_count(), 1);
        assert_eq!(
            stored_definition(&mutator),
            json!({
                "$schema": "s",
                "actions": {"send": {"type": "Http", "inputs": {"method": "GET"}}},
                "triggers": {"manual": {"type": "Request"}},
                "outputs": {"result": 1}
            })
        );
    }

    #[tokio::test]
    async fn test_create_collision_leaves_document_unmodified() {
        let original = workflow(json!({"actions": {"send": {"type": "Http"}}, "triggers": {}}));
        let mutator = mutator_with(original.clone());

        let err = assert_err!(
            mutator
                .update(
                    WORKFLOW_ID,
                    ComponentKind::Action,
                    "send",
                    json!({"type": "Compose"}),
                    UpsertMode::Create,
                    ACTION_RESOURCE,
                )
                .await
        );

        assert!(matches!(err, ProviderError::AlreadyExists(_)));
        assert!(err.message().contains("needs to be imported into the State"));
        assert!(err.message().contains(ACTION_RESOURCE));
        assert!(err.message().contains("/workflows/wf1/actions/send"));
        assert_eq!(mutator.store().write_count(), 0);
        assert_eq!(mutator.store().workflow("rg1", "wf1"), Some(original));
    }

    #[tokio::test]
    async fn test_collision_is_per_kind() {
        let mutator = mutator_with(workflow(json!({"actions": {"manual": {}}, "triggers": {}})));

        assert_ok!(
            mutator
                .update(
                    WORKFLOW_ID,
                    ComponentKind::Trigger,
                    "manual",
                    json!({"type": "Request"}),
                    UpsertMode::Create,
                    "azurerm_logic_app_trigger_http_request",
                )
                .await
        );
        assert_eq!(
            stored_definition(&mutator),
            json!({"actions": {"manual": {}}, "triggers": {"manual": {"type": "Request"}}})
        );
    }

    #[tokio::test]
    async fn test_update_mode_overwrites_existing() {
        let mutator = mutator_with(workflow(json!({"actions": {"send": {"type": "Http"}}})));

        assert_ok!(
            mutator
                .update(
                    WORKFLOW_ID,
                    ComponentKind::Action,
                    "send",
                    json!({"type": "Compose", "inputs": "x"}),
                    UpsertMode::Update,
                    ACTION_RESOURCE,
                )
                .await
        );
        assert_eq!(
            stored_definition(&mutator),
            json!({"actions": {"send": {"type": "Compose", "inputs": "x"}}})
        );
    }

    #[tokio::test]
    async fn test_update_creates_missing_component_map() {
        let mutator = mutator_with(workflow(json!({"$schema": "s"})));

        assert_ok!(
            mutator
                .update(
                    WORKFLOW_ID,
                    ComponentKind::Trigger,
                    "every-minute",
                    json!({"type": "Recurrence"}),
                    UpsertMode::Create,
                    "azurerm_logic_app_trigger_recurrence",
                )
                .await
        );
        assert_eq!(
            stored_definition(&mutator),
            json!({"$schema": "s", "triggers": {"every-minute": {"type": "Recurrence"}}})
        );
    }

    #[tokio::test]
    async fn test_update_missing_workflow_is_error() {
        let mutator = ComponentMutator::new(InMemoryWorkflowStore::new(), LockManager::new());

        let err = mutator
            .update(
                WORKFLOW_ID,
                ComponentKind::Action,
                "send",
                json!({}),
                UpsertMode::Update,
                ACTION_RESOURCE,
            )
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(err.message().contains("Action \"send\""));
        assert!(err.message().contains("Logic App Workflow \"wf1\""));
        assert!(err.message().contains("Resource Group \"rg1\""));
        assert_eq!(mutator.store().write_count(), 0);
    }

    #[tokio::test]
    async fn test_update_rejects_bad_input() {
        let mutator = mutator_with(Workflow::new("westeurope"));

        let err = mutator
            .update(
                "/subscriptions/s1/resourceGroups/rg1",
                ComponentKind::Action,
                "send",
                json!({}),
                UpsertMode::Create,
                ACTION_RESOURCE,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));

        let err = mutator
            .update(
                WORKFLOW_ID,
                ComponentKind::Action,
                "send",
                json!("not an object"),
                UpsertMode::Create,
                ACTION_RESOURCE,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert_eq!(mutator.store().write_count(), 0);
    }

    #[tokio::test]
    async fn test_update_rejects_unaddressable_names() {
        let mutator = mutator_with(Workflow::new("westeurope"));

        for name in ["", "a/b", "/"] {
            let err = assert_err!(
                mutator
                    .update(
                        WORKFLOW_ID,
                        ComponentKind::Trigger,
                        name,
                        json!({"type": "Request"}),
                        UpsertMode::Create,
                        ACTION_RESOURCE,
                    )
                    .await
            );
            assert!(matches!(err, ProviderError::InvalidRequest(_)), "{:?}", name);
            assert!(err.message().contains("must not contain `/`"));
        }
        assert_eq!(mutator.store().write_count(), 0);

        // names that pass the check round-trip through the returned ID
        let id = assert_ok!(
            mutator
                .update(
                    WORKFLOW_ID,
                    ComponentKind::Trigger,
                    "manual trigger",
                    json!({"type": "Request"}),
                    UpsertMode::Create,
                    ACTION_RESOURCE,
                )
                .await
        );
        let parsed: ComponentId = id.to_string().parse().unwrap();
        assert_eq!(parsed.name, "manual trigger");
    }

    #[tokio::test]
    async fn test_update_malformed_definition() {
        let mutator = mutator_with(workflow(json!({"actions": "nope"})));

        let err = mutator
            .update(
                WORKFLOW_ID,
                ComponentKind::Action,
                "send",
                json!({}),
                UpsertMode::Update,
                ACTION_RESOURCE,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidState(_)));
        assert!(err.message().starts_with("updating Action \"send\""));
        assert_eq!(mutator.store().write_count(), 0);

        let mut bare = Workflow::new("westeurope");
        bare.properties = None;
        let mutator = mutator_with(bare);
        let err = mutator
            .update(
                WORKFLOW_ID,
                ComponentKind::Action,
                "send",
                json!({}),
                UpsertMode::Update,
                ACTION_RESOURCE,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_upstream_errors_propagate_with_context() {
        let mutator = mutator_with(Workflow::new("westeurope"));
        mutator
            .store()
            .fail_next_write(ProviderError::Upstream("429 Too Many Requests".to_string()));

        let err = mutator
            .update(
                WORKFLOW_ID,
                ComponentKind::Action,
                "send",
                json!({"type": "Http"}),
                UpsertMode::Create,
                ACTION_RESOURCE,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Upstream(_)));
        assert!(err.message().contains("Logic App Workflow \"wf1\""));
        assert!(err.message().ends_with("429 Too Many Requests"));
    }

    #[tokio::test]
    async fn test_lock_released_on_error() {
        let mutator = mutator_with(Workflow::new("westeurope"));
        mutator
            .store()
            .fail_next_get(ProviderError::Upstream("connection reset".to_string()));

        let first = mutator
            .update(
                WORKFLOW_ID,
                ComponentKind::Action,
                "send",
                json!({"type": "Http"}),
                UpsertMode::Create,
                ACTION_RESOURCE,
            )
            .await;
        assert!(first.is_err());
        assert!(!mutator.locks().is_locked("wf1", LOGIC_APP_RESOURCE_NAME));

        let second = tokio::time::timeout(
            Duration::from_secs(1),
            mutator.update(
                WORKFLOW_ID,
                ComponentKind::Action,
                "send",
                json!({"type": "Http"}),
                UpsertMode::Create,
                ACTION_RESOURCE,
            ),
        )
        .await;
        assert!(matches!(second, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn test_waits_for_workflow_lock() {
        let mutator = mutator_with(Workflow::new("westeurope"));
        let guard = mutator.lock_workflow("wf1").await;

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            mutator.remove("rg1", "wf1", ComponentKind::Action, "send"),
        )
        .await;
        assert!(blocked.is_err());
        assert_eq!(mutator.store().write_count(), 0);

        drop(guard);
        assert_ok!(
            mutator
                .remove("rg1", "wf1", ComponentKind::Action, "send")
                .await
        );
        assert_eq!(mutator.store().write_count(), 1);
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let store = InMemoryWorkflowStore::new().with_latency(Duration::from_millis(200));
        store.insert("rg1", "wf1", Workflow::new("westeurope"));
        let mutator = ComponentMutator::new(store, LockManager::new()).with_timeouts(Timeouts {
            update: Duration::from_millis(20),
            ..Timeouts::default()
        });

        let err = mutator
            .update(
                WORKFLOW_ID,
                ComponentKind::Action,
                "send",
                json!({}),
                UpsertMode::Update,
                ACTION_RESOURCE,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));
        assert!(err.message().contains("20ms"));
        assert!(!mutator.locks().is_locked("wf1", LOGIC_APP_RESOURCE_NAME));
        assert_eq!(mutator.store().write_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let store = InMemoryWorkflowStore::new().with_latency(Duration::from_millis(2));
        store.insert("rg1", "wf1", Workflow::new("westeurope"));
        let mutator = Arc::new(ComponentMutator::new(store, LockManager::new()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let mutator = mutator.clone();
            handles.push(tokio::spawn(async move {
                mutator
                    .update(
                        WORKFLOW_ID,
                        ComponentKind::Action,
                        &format!("step{}", i),
                        json!({"type": "Compose", "inputs": i}),
                        UpsertMode::Create,
                        ACTION_RESOURCE,
                    )
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let workflow = mutator.store().workflow("rg1", "wf1").unwrap();
        let actions = workflow
            .definition()
            .unwrap()
            .components(ComponentKind::Action)
            .unwrap()
            .unwrap();
        assert_eq!(actions.len(), 8);
        assert_eq!(mutator.store().write_count(), 8);
    }

    #[tokio::test]
    async fn test_remove_missing_workflow_is_ok() {
        let mutator = ComponentMutator::new(InMemoryWorkflowStore::new(), LockManager::new());

        assert_ok!(
            mutator
                .remove("rg1", "wf1", ComponentKind::Trigger, "manual")
                .await
        );
        assert_eq!(mutator.store().write_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_keeps_sibling_order() {
        let mutator = mutator_with(workflow(json!({
            "actions": {"a": {}, "b": {}, "c": {}, "d": {}},
            "triggers": {"manual": {}}
        })));

        assert_ok!(mutator.remove("rg1", "wf1", ComponentKind::Action, "b").await);

        let definition = stored_definition(&mutator);
        let keys: Vec<&str> = definition["actions"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["a", "c", "d"]);
        assert_eq!(definition["triggers"], json!({"manual": {}}));
    }

    #[tokio::test]
    async fn test_remove_absent_component_still_writes() {
        let mutator = mutator_with(workflow(json!({"actions": {"a": {}}})));

        assert_ok!(mutator.remove("rg1", "wf1", ComponentKind::Action, "zz").await);
        assert_eq!(mutator.store().write_count(), 1);
        assert_eq!(stored_definition(&mutator), json!({"actions": {"a": {}}}));
    }

    #[tokio::test]
    async fn test_remove_propagates_other_errors() {
        let mutator = mutator_with(Workflow::new("westeurope"));
        mutator
            .store()
            .fail_next_get(ProviderError::Upstream("503".to_string()));

        let err = mutator
            .remove("rg1", "wf1", ComponentKind::Action, "a")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Upstream(_)));
        assert!(err.message().starts_with("removing Action \"a\""));
    }

    #[tokio::test]
    async fn test_retrieve() {
        let mutator = mutator_with(workflow(json!({
            "actions": {"send": {"type": "Http"}},
            "triggers": {}
        })));

        let found = mutator
            .retrieve("rg1", "wf1", ComponentKind::Action, "send")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Value::Object(found.value), json!({"type": "Http"}));
        assert_eq!(found.workflow.location.as_deref(), Some("westeurope"));

        let missing = mutator
            .retrieve("rg1", "wf1", ComponentKind::Trigger, "send")
            .await
            .unwrap();
        assert!(missing.is_none());

        let gone = mutator
            .retrieve("rg1", "other", ComponentKind::Action, "send")
            .await
            .unwrap();
        assert!(gone.is_none());
        assert_eq!(mutator.store().write_count(), 0);
    }

    #[tokio::test]
    async fn test_retrieve_errors() {
        let mutator = mutator_with(workflow(json!({"actions": {"send": ["x"]}})));

        let err = mutator
            .retrieve("rg1", "wf1", ComponentKind::Action, "send")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidState(_)));

        mutator
            .store()
            .fail_next_get(ProviderError::Upstream("timeout".to_string()));
        let err = mutator
            .retrieve("rg1", "wf1", ComponentKind::Action, "send")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Upstream(_)));
        assert!(err.message().starts_with("retrieving Action \"send\""));
    }

    #[test]
    fn test_default_definition_is_used_for_new_workflows() {
        let workflow = Workflow::new("westeurope");
        assert_eq!(workflow.definition().unwrap(), &WorkflowDefinition::new());
    }
}
