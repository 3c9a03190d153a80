//! Deterministic workflow state machine.
//!
//! The `WorkflowEngine` holds a registry of compiled workflow definitions
//! keyed by entity type and resolves transition requests against it. It
//! holds no per-entity state: callers pass the entity's current state and
//! persist the returned target themselves.
//!
//! Identifiers are normalized (trimmed, lowercased) at every public entry
//! point and stored in canonical form.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::workflow::transition_key;
use crate::domain::models::{
    normalize_identifier, TransitionInput, TransitionQuery, TransitionResult, WorkflowDefinition,
    WorkflowState, WorkflowTransition,
};
use crate::domain::ports::{Clock, SystemClock};

/// How a transition request resolved against a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No transition name and the target equals the current state.
    NoOp { state: WorkflowState },
    /// A concrete edge of the definition.
    Transition(WorkflowTransition),
}

/// Operations every workflow engine exposes.
///
/// Implemented by `WorkflowEngine` and by decorators such as
/// `GuardedWorkflowEngine`.
pub trait TransitionEngine: Send + Sync {
    /// Compile and register a definition, replacing any previous one for
    /// the same entity type.
    fn register_workflow(&self, definition: WorkflowDefinition) -> DomainResult<()>;

    /// Resolve a request without executing it.
    fn resolve(&self, input: &TransitionInput) -> DomainResult<Resolution>;

    /// Execute a transition request.
    fn transition(&self, input: &TransitionInput) -> DomainResult<TransitionResult>;

    /// Transitions reachable from a state of an entity type.
    fn available_transitions(&self, query: &TransitionQuery)
        -> DomainResult<Vec<WorkflowTransition>>;
}

/// A definition plus its `name::from` lookup table.
#[derive(Debug, Clone)]
struct CompiledWorkflow {
    definition: WorkflowDefinition,
    index: HashMap<String, WorkflowTransition>,
}

impl CompiledWorkflow {
    fn compile(definition: WorkflowDefinition) -> Self {
        let index = definition
            .transitions
            .iter()
            .map(|t| (t.key(), t.clone()))
            .collect();
        Self { definition, index }
    }

    fn invalid(&self, from: &WorkflowState, requested: String) -> DomainError {
        DomainError::InvalidTransition {
            entity_type: self.definition.entity_type.clone(),
            from: from.to_string(),
            requested,
        }
    }

    /// Resolve a normalized request whose current state is already defaulted.
    fn resolve(&self, input: &TransitionInput, current: &WorkflowState) -> DomainResult<Resolution> {
        let target = WorkflowState::new(&input.target_state);

        if input.transition_name.is_empty() {
            if target == *current {
                return Ok(Resolution::NoOp {
                    state: current.clone(),
                });
            }
            if target.is_empty() {
                return Err(self.invalid(
                    current,
                    "no transition name or target state supplied".to_string(),
                ));
            }

            return self
                .definition
                .transitions
                .iter()
                .find(|t| t.from == *current && t.to == target)
                .cloned()
                .map(Resolution::Transition)
                .ok_or_else(|| self.invalid(current, format!("target state '{}'", target)));
        }

        let key = transition_key(&input.transition_name, current);
        let transition = self
            .index
            .get(&key)
            .ok_or_else(|| self.invalid(current, format!("transition '{}'", input.transition_name)))?;

        if !target.is_empty() && transition.to != target {
            return Err(self.invalid(
                current,
                format!(
                    "transition '{}' leads to '{}', not '{}'",
                    transition.name, transition.to, target
                ),
            ));
        }

        Ok(Resolution::Transition(transition.clone()))
    }
}

/// Workflow engine backed by an in-memory definition registry.
pub struct WorkflowEngine {
    registry: RwLock<HashMap<String, CompiledWorkflow>>,
    clock: Arc<dyn Clock>,
}

impl WorkflowEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Engine with the built-in content, page and block workflows registered.
    pub fn with_builtin_definitions(clock: Arc<dyn Clock>) -> DomainResult<Self> {
        let engine = Self::new(clock);
        engine.load_definitions(WorkflowDefinition::builtin_definitions())?;
        Ok(engine)
    }

    /// Register each definition in order. Later entries replace earlier ones
    /// for the same entity type.
    pub fn load_definitions(&self, definitions: Vec<WorkflowDefinition>) -> DomainResult<usize> {
        let count = definitions.len();
        for definition in definitions {
            self.register_workflow(definition)?;
        }
        Ok(count)
    }

    /// Load definitions from a YAML file containing a `workflows:` list.
    #[instrument(skip(self))]
    pub fn load_from_file(&self, path: &Path) -> Result<usize> {
        info!(path = ?path, "Loading workflow definitions");

        let contents =
            std::fs::read_to_string(path).context("Failed to read workflow definitions file")?;
        let file: WorkflowFile =
            serde_yaml::from_str(&contents).context("Failed to parse workflow definitions")?;

        let count = self
            .load_definitions(file.workflows)
            .context("Failed to register workflow definitions")?;
        info!(count, "Workflow definitions loaded");
        Ok(count)
    }

    /// Registered definition for an entity type, in canonical form.
    pub fn definition(&self, entity_type: &str) -> Option<WorkflowDefinition> {
        self.registry
            .read()
            .get(&normalize_identifier(entity_type))
            .map(|c| c.definition.clone())
    }

    /// Registered entity types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.registry.read().keys().cloned().collect();
        types.sort();
        types
    }

    fn noop_result(&self, input: &TransitionInput, state: WorkflowState) -> TransitionResult {
        TransitionResult {
            from_state: state.clone(),
            to_state: state,
            transition_name: String::new(),
            completed_at: self.clock.now(),
            actor_id: input.actor_id.clone(),
            metadata: input.metadata.clone(),
            events: Vec::new(),
            notifications: Vec::new(),
        }
    }
}

impl TransitionEngine for WorkflowEngine {
    #[instrument(skip(self, definition), fields(entity_type = %definition.entity_type))]
    fn register_workflow(&self, definition: WorkflowDefinition) -> DomainResult<()> {
        let definition = definition.normalized();
        if definition.entity_type.is_empty() {
            return Err(DomainError::InvalidDefinition(
                "entity type cannot be blank".to_string(),
            ));
        }
        definition.validate().map_err(DomainError::InvalidDefinition)?;

        let compiled = CompiledWorkflow::compile(definition);
        let entity_type = compiled.definition.entity_type.clone();
        let transitions = compiled.index.len();

        let replaced = self
            .registry
            .write()
            .insert(entity_type.clone(), compiled)
            .is_some();

        info!(
            entity_type = %entity_type,
            transitions,
            replaced,
            "Registered workflow"
        );
        Ok(())
    }

    fn resolve(&self, input: &TransitionInput) -> DomainResult<Resolution> {
        let input = input.normalized();

        // Decided before the registry is consulted.
        if input.is_noop() {
            return Ok(Resolution::NoOp {
                state: WorkflowState::new(&input.current_state),
            });
        }

        let registry = self.registry.read();
        let compiled = registry
            .get(&input.entity_type)
            .ok_or_else(|| DomainError::UnknownEntityType(input.entity_type.clone()))?;
        let current =
            WorkflowState::or_default_state(&input.current_state, &compiled.definition.initial_state);

        compiled.resolve(&input, &current)
    }

    #[instrument(skip(self, input), fields(entity_id = %input.entity_id, entity_type = %input.entity_type))]
    fn transition(&self, input: &TransitionInput) -> DomainResult<TransitionResult> {
        let normalized = input.normalized();

        let transition = match self.resolve(&normalized)? {
            Resolution::NoOp { state } => {
                debug!(state = %state, "No-op transition");
                return Ok(self.noop_result(&normalized, state));
            }
            Resolution::Transition(transition) => transition,
        };

        debug!(
            transition = %transition.name,
            from = %transition.from,
            to = %transition.to,
            actor = %normalized.actor_id,
            "Transition resolved"
        );

        Ok(TransitionResult {
            from_state: transition.from,
            to_state: transition.to,
            transition_name: transition.name,
            completed_at: self.clock.now(),
            actor_id: normalized.actor_id,
            metadata: normalized.metadata,
            events: Vec::new(),
            notifications: Vec::new(),
        })
    }

    fn available_transitions(
        &self,
        query: &TransitionQuery,
    ) -> DomainResult<Vec<WorkflowTransition>> {
        let entity_type = normalize_identifier(&query.entity_type);
        let registry = self.registry.read();
        let compiled = registry
            .get(&entity_type)
            .ok_or(DomainError::UnknownEntityType(entity_type))?;
        let state = WorkflowState::or_default_state(&query.state, &compiled.definition.initial_state);

        Ok(compiled
            .definition
            .transitions
            .iter()
            .filter(|t| t.from == state)
            .cloned()
            .collect())
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

/// On-disk shape of a workflow definitions file.
#[derive(Debug, Deserialize)]
struct WorkflowFile {
    #[serde(default)]
    workflows: Vec<WorkflowDefinition>,
}
