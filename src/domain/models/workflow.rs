//! Workflow definitions: states, transitions and the built-in lifecycles.
//!
//! Every identifier in a definition is stored in canonical form (trimmed,
//! lowercased). Normalization happens once, when a value enters the domain,
//! so lookups never have to care about casing.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Initial state used when a definition leaves it blank.
pub const DEFAULT_INITIAL_STATE: &str = "draft";

/// Canonical form of a state, transition or entity-type identifier.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A case-normalized workflow state label (e.g. `draft`, `published`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct WorkflowState(String);

impl WorkflowState {
    /// Normalize `raw`; blank input yields an empty label.
    pub fn new(raw: &str) -> Self {
        Self(normalize_identifier(raw))
    }

    /// Normalize `raw`, falling back to `default` when it is blank.
    pub fn or_default_state(raw: &str, default: &WorkflowState) -> Self {
        let state = Self::new(raw);
        if state.is_empty() {
            default.clone()
        } else {
            state
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkflowState {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// A single edge of a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTransition {
    /// Transition name. Unique per `(name, from)` pair.
    pub name: String,
    pub from: WorkflowState,
    pub to: WorkflowState,
    /// Optional guard expression evaluated by an authorizer.
    #[serde(default)]
    pub guard: String,
}

impl WorkflowTransition {
    pub fn new(name: &str, from: &str, to: &str) -> Self {
        Self {
            name: normalize_identifier(name),
            from: WorkflowState::new(from),
            to: WorkflowState::new(to),
            guard: String::new(),
        }
    }

    pub fn with_guard(mut self, guard: &str) -> Self {
        self.guard = guard.trim().to_string();
        self
    }

    /// Compiled lookup key, `name::from`.
    pub fn key(&self) -> String {
        transition_key(&self.name, &self.from)
    }

    pub fn is_guarded(&self) -> bool {
        !self.guard.is_empty()
    }
}

/// Lookup key for a transition by name out of a given state.
pub fn transition_key(name: &str, from: &WorkflowState) -> String {
    format!("{}::{}", name, from)
}

/// A named state machine for one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkflowDefinition {
    pub entity_type: String,
    #[serde(default)]
    pub initial_state: WorkflowState,
    #[serde(default)]
    pub states: Vec<WorkflowState>,
    #[serde(default)]
    pub transitions: Vec<WorkflowTransition>,
}

impl WorkflowDefinition {
    pub fn new(entity_type: &str, initial_state: &str) -> Self {
        Self {
            entity_type: normalize_identifier(entity_type),
            initial_state: WorkflowState::new(initial_state),
            states: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn with_states(mut self, states: &[&str]) -> Self {
        self.states = states.iter().map(|s| WorkflowState::new(s)).collect();
        self
    }

    pub fn with_transition(mut self, transition: WorkflowTransition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Return a copy with every identifier in canonical form.
    ///
    /// Deserialized definitions (YAML, config) may carry arbitrary casing.
    pub fn normalized(&self) -> Self {
        let initial_state = {
            let state = WorkflowState::new(self.initial_state.as_str());
            if state.is_empty() {
                WorkflowState::new(DEFAULT_INITIAL_STATE)
            } else {
                state
            }
        };

        Self {
            entity_type: normalize_identifier(&self.entity_type),
            initial_state,
            states: self
                .states
                .iter()
                .map(|s| WorkflowState::new(s.as_str()))
                .collect(),
            transitions: self
                .transitions
                .iter()
                .map(|t| WorkflowTransition {
                    name: normalize_identifier(&t.name),
                    from: WorkflowState::new(t.from.as_str()),
                    to: WorkflowState::new(t.to.as_str()),
                    guard: t.guard.trim().to_string(),
                })
                .collect(),
        }
    }

    /// Structural validation of a normalized definition.
    pub fn validate(&self) -> Result<(), String> {
        if self.entity_type.is_empty() {
            return Err("Workflow entity type cannot be empty".to_string());
        }

        if self.states.is_empty() {
            return Err(format!(
                "Workflow '{}' must declare at least one state",
                self.entity_type
            ));
        }

        let declared: HashSet<&WorkflowState> = self.states.iter().collect();
        if declared.iter().any(|s| s.is_empty()) {
            return Err(format!(
                "Workflow '{}' declares an empty state",
                self.entity_type
            ));
        }

        if !declared.contains(&self.initial_state) {
            return Err(format!(
                "Workflow '{}' initial state '{}' is not declared",
                self.entity_type, self.initial_state
            ));
        }

        let mut keys = HashSet::new();
        for transition in &self.transitions {
            if transition.name.is_empty() {
                return Err(format!(
                    "Workflow '{}' has a transition with an empty name",
                    self.entity_type
                ));
            }
            for endpoint in [&transition.from, &transition.to] {
                if !declared.contains(endpoint) {
                    return Err(format!(
                        "Transition '{}' in workflow '{}' references undeclared state '{}'",
                        transition.name, self.entity_type, endpoint
                    ));
                }
            }
            if !keys.insert(transition.key()) {
                return Err(format!(
                    "Workflow '{}' declares transition '{}' from '{}' more than once",
                    self.entity_type, transition.name, transition.from
                ));
            }
        }

        Ok(())
    }

    /// The standard editorial lifecycle shared by content, pages and blocks.
    ///
    /// `publish` from `published` replaces the live version and keeps the
    /// publisher guard in force.
    pub fn editorial(entity_type: &str) -> Self {
        Self::new(entity_type, DEFAULT_INITIAL_STATE)
            .with_states(&["draft", "review", "published", "archived"])
            .with_transition(WorkflowTransition::new("submit", "draft", "review"))
            .with_transition(WorkflowTransition::new("reject", "review", "draft"))
            .with_transition(
                WorkflowTransition::new("publish", "draft", "published")
                    .with_guard("role:publisher"),
            )
            .with_transition(
                WorkflowTransition::new("publish", "review", "published")
                    .with_guard("role:publisher"),
            )
            .with_transition(
                WorkflowTransition::new("publish", "published", "published")
                    .with_guard("role:publisher"),
            )
            .with_transition(WorkflowTransition::new("unpublish", "published", "draft"))
            .with_transition(
                WorkflowTransition::new("archive", "draft", "archived").with_guard("role:editor"),
            )
            .with_transition(
                WorkflowTransition::new("archive", "published", "archived")
                    .with_guard("role:editor"),
            )
            .with_transition(WorkflowTransition::new("restore", "archived", "draft"))
    }

    /// Built-in definitions for the `content`, `page` and `block` families.
    pub fn builtin_definitions() -> Vec<Self> {
        vec![
            Self::editorial("content"),
            Self::editorial("page"),
            Self::editorial("block"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("  Published "), "published");
        assert_eq!(normalize_identifier(""), "");
    }

    #[test]
    fn test_state_falls_back_to_default() {
        let initial = WorkflowState::new("draft");
        assert_eq!(WorkflowState::or_default_state("   ", &initial), initial);
        assert_eq!(
            WorkflowState::or_default_state("REVIEW", &initial).as_str(),
            "review"
        );
    }

    #[test]
    fn test_builtin_definitions_are_valid() {
        for definition in WorkflowDefinition::builtin_definitions() {
            definition
                .validate()
                .unwrap_or_else(|e| panic!("{} should be valid: {e}", definition.entity_type));
        }
    }

    #[test]
    fn test_normalized_defaults_initial_state() {
        let definition = WorkflowDefinition {
            entity_type: " Article ".to_string(),
            initial_state: WorkflowState::default(),
            states: vec![WorkflowState::new("Draft")],
            transitions: vec![],
        }
        .normalized();

        assert_eq!(definition.entity_type, "article");
        assert_eq!(definition.initial_state.as_str(), DEFAULT_INITIAL_STATE);
        assert!(definition.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_undeclared_state() {
        let definition = WorkflowDefinition::new("content", "draft")
            .with_states(&["draft"])
            .with_transition(WorkflowTransition::new("publish", "draft", "published"));

        let err = definition.validate().unwrap_err();
        assert!(err.contains("undeclared state 'published'"));
    }

    #[test]
    fn test_validate_rejects_duplicate_name_from_pair() {
        let definition = WorkflowDefinition::new("content", "draft")
            .with_states(&["draft", "review", "published"])
            .with_transition(WorkflowTransition::new("go", "draft", "review"))
            .with_transition(WorkflowTransition::new("go", "draft", "published"));

        assert!(definition.validate().is_err());
    }

    #[test]
    fn test_same_name_from_different_states_is_allowed() {
        let definition = WorkflowDefinition::new("content", "draft")
            .with_states(&["draft", "review", "published"])
            .with_transition(WorkflowTransition::new("publish", "draft", "published"))
            .with_transition(WorkflowTransition::new("publish", "review", "published"));

        assert!(definition.validate().is_ok());
    }

    #[test]
    fn test_definition_from_yaml() {
        let yaml = r"
entity_type: Article
initial_state: Draft
states: [Draft, Live]
transitions:
  - name: Go-Live
    from: DRAFT
    to: live
    guard: role:publisher
";
        let definition: WorkflowDefinition = serde_yaml::from_str(yaml).unwrap();
        let definition = definition.normalized();

        assert_eq!(definition.transitions[0].name, "go-live");
        assert_eq!(definition.transitions[0].from.as_str(), "draft");
        assert_eq!(definition.transitions[0].guard, "role:publisher");
        assert!(definition.validate().is_ok());
    }
}
