//! Transition requests and results exchanged with the workflow engine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::workflow::{normalize_identifier, WorkflowState};

/// A request to move an entity through its workflow.
///
/// Either `transition_name` or `target_state` selects the edge. Values are
/// accepted in any casing and normalized by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionInput {
    pub entity_id: Uuid,
    pub entity_type: String,
    pub current_state: String,
    #[serde(default)]
    pub transition_name: String,
    #[serde(default)]
    pub target_state: String,
    pub actor_id: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TransitionInput {
    pub fn new(entity_id: Uuid, entity_type: &str, current_state: &str) -> Self {
        Self {
            entity_id,
            entity_type: entity_type.to_string(),
            current_state: current_state.to_string(),
            ..Default::default()
        }
    }

    pub fn named(mut self, transition_name: &str) -> Self {
        self.transition_name = transition_name.to_string();
        self
    }

    pub fn towards(mut self, target_state: &str) -> Self {
        self.target_state = target_state.to_string();
        self
    }

    pub fn by(mut self, actor_id: &str) -> Self {
        self.actor_id = actor_id.to_string();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Copy with entity type, states and transition name in canonical form.
    ///
    /// `current_state` and `target_state` are normalized but not defaulted;
    /// the initial-state fallback needs the definition.
    pub fn normalized(&self) -> Self {
        Self {
            entity_id: self.entity_id,
            entity_type: normalize_identifier(&self.entity_type),
            current_state: normalize_identifier(&self.current_state),
            transition_name: normalize_identifier(&self.transition_name),
            target_state: normalize_identifier(&self.target_state),
            actor_id: self.actor_id.trim().to_string(),
            metadata: self.metadata.clone(),
        }
    }

    /// True when the request names no transition and targets the state it
    /// is already in.
    pub fn is_noop(&self) -> bool {
        self.transition_name.is_empty() && self.target_state == self.current_state
    }
}

/// Outcome of a completed (or short-circuited) transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResult {
    pub from_state: WorkflowState,
    pub to_state: WorkflowState,
    /// Empty for a no-op transition.
    pub transition_name: String,
    pub completed_at: DateTime<Utc>,
    pub actor_id: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub notifications: Vec<String>,
}

impl TransitionResult {
    pub fn is_noop(&self) -> bool {
        self.transition_name.is_empty()
    }

    /// Append the output of an action hook. Hook metadata wins on key
    /// conflict; every other entry is kept.
    pub fn merge_action_output(&mut self, output: ActionOutput) {
        self.events.extend(output.events);
        self.notifications.extend(output.notifications);
        self.metadata.extend(output.metadata);
    }
}

/// Query for the transitions reachable from a state.
#[derive(Debug, Clone, Default)]
pub struct TransitionQuery {
    pub entity_type: String,
    /// Blank means the definition's initial state.
    pub state: String,
}

impl TransitionQuery {
    pub fn new(entity_type: &str, state: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            state: state.to_string(),
        }
    }
}

/// What an action hook contributes to a transition result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionOutput {
    pub events: Vec<String>,
    pub notifications: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ActionOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    pub fn with_notification(mut self, notification: impl Into<String>) -> Self {
        self.notifications.push(notification.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
