//! Authorization and action adapter around a workflow engine.
//!
//! `GuardedWorkflowEngine` resolves each request first, asks the injected
//! `Authorizer` about the transition's guard, and only then lets the inner
//! engine execute it. A rejected guard never reaches the inner engine's
//! `transition`. After a successful transition the action hook registered
//! for `entity_type::transition_name` may append events, notifications and
//! metadata to the result.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    TransitionInput, TransitionQuery, TransitionResult, WorkflowDefinition, WorkflowTransition,
};
use crate::domain::ports::Authorizer;
use crate::services::action_registry::ActionRegistry;
use crate::services::workflow_engine::{Resolution, TransitionEngine};

pub struct GuardedWorkflowEngine<E: TransitionEngine> {
    inner: Arc<E>,
    authorizer: Arc<dyn Authorizer>,
    actions: Arc<ActionRegistry>,
}

impl<E: TransitionEngine> GuardedWorkflowEngine<E> {
    pub fn new(inner: Arc<E>, authorizer: Arc<dyn Authorizer>, actions: Arc<ActionRegistry>) -> Self {
        Self {
            inner,
            authorizer,
            actions,
        }
    }

    pub fn inner(&self) -> &Arc<E> {
        &self.inner
    }

    fn check_guard(&self, input: &TransitionInput, transition: &WorkflowTransition) -> DomainResult<()> {
        if !transition.is_guarded() {
            return Ok(());
        }

        self.authorizer
            .authorize_transition(input, &transition.guard)
            .map_err(|reason| {
                warn!(
                    entity_id = %input.entity_id,
                    entity_type = %input.entity_type,
                    transition = %transition.name,
                    guard = %transition.guard,
                    actor = %input.actor_id,
                    reason = %reason,
                    "Transition guard rejected"
                );
                DomainError::GuardRejected {
                    guard: transition.guard.clone(),
                    actor: input.actor_id.clone(),
                    reason,
                }
            })
    }

    /// Transitions reachable from a state whose guards the actor passes.
    pub fn permitted_transitions(
        &self,
        query: &TransitionQuery,
        entity_id: uuid::Uuid,
        actor_id: &str,
    ) -> DomainResult<Vec<WorkflowTransition>> {
        let candidate = TransitionInput::new(entity_id, &query.entity_type, &query.state)
            .by(actor_id)
            .normalized();

        Ok(self
            .inner
            .available_transitions(query)?
            .into_iter()
            .filter(|t| {
                !t.is_guarded() || self.authorizer.authorize_transition(&candidate, &t.guard).is_ok()
            })
            .collect())
    }
}

impl<E: TransitionEngine> TransitionEngine for GuardedWorkflowEngine<E> {
    fn register_workflow(&self, definition: WorkflowDefinition) -> DomainResult<()> {
        self.inner.register_workflow(definition)
    }

    fn resolve(&self, input: &TransitionInput) -> DomainResult<Resolution> {
        self.inner.resolve(input)
    }

    #[instrument(skip(self, input), fields(entity_id = %input.entity_id, entity_type = %input.entity_type))]
    fn transition(&self, input: &TransitionInput) -> DomainResult<TransitionResult> {
        let input = input.normalized();

        if let Resolution::Transition(transition) = self.inner.resolve(&input)? {
            self.check_guard(&input, &transition)?;
        }

        let mut result = self.inner.transition(&input)?;
        if result.is_noop() {
            return Ok(result);
        }

        if let Some(handler) = self.actions.get(&input.entity_type, &result.transition_name) {
            debug!(
                handler = handler.name(),
                transition = %result.transition_name,
                "Running action hook"
            );
            let output = handler.run(&input).map_err(|e| match e {
                DomainError::ActionFailed { .. } => e,
                other => DomainError::ActionFailed {
                    action: handler.name().to_string(),
                    reason: other.to_string(),
                },
            })?;
            result.merge_action_output(output);
        }

        Ok(result)
    }

    fn available_transitions(
        &self,
        query: &TransitionQuery,
    ) -> DomainResult<Vec<WorkflowTransition>> {
        self.inner.available_transitions(query)
    }
}
