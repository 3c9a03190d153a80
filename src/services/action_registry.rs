//! Post-transition action hooks.
//!
//! Hooks are keyed by `entity_type::transition_name` and registered once
//! through an `ActionRegistryBuilder`. The built `ActionRegistry` is
//! immutable and can be shared freely behind an `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::errors::DomainResult;
use crate::domain::models::{normalize_identifier, ActionOutput, EntityFamily, TransitionInput};

/// Compound lookup key for an action hook.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionKey {
    pub entity_type: String,
    pub transition: String,
}

impl ActionKey {
    pub fn new(entity_type: &str, transition: &str) -> Self {
        Self {
            entity_type: normalize_identifier(entity_type),
            transition: normalize_identifier(transition),
        }
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.entity_type, self.transition)
    }
}

type ActionFn = dyn Fn(&TransitionInput) -> DomainResult<ActionOutput> + Send + Sync;

/// A named hook body.
#[derive(Clone)]
pub struct ActionHandler {
    name: String,
    run: Arc<ActionFn>,
}

impl ActionHandler {
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&TransitionInput) -> DomainResult<ActionOutput> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            run: Arc::new(run),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(&self, input: &TransitionInput) -> DomainResult<ActionOutput> {
        (self.run)(input)
    }
}

impl fmt::Debug for ActionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandler")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Collects hooks before the registry is frozen.
#[derive(Debug, Default)]
pub struct ActionRegistryBuilder {
    handlers: HashMap<ActionKey, ActionHandler>,
}

impl ActionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. A later registration for the same key replaces the
    /// earlier one.
    pub fn register(mut self, entity_type: &str, transition: &str, handler: ActionHandler) -> Self {
        let key = ActionKey::new(entity_type, transition);
        debug!(key = %key, handler = handler.name(), "Registering action hook");
        self.handlers.insert(key, handler);
        self
    }

    /// Hooks that emit `<family>.<transition>` events for the editorial
    /// transitions of every built-in family, and notify on publish.
    pub fn with_standard_events(mut self) -> Self {
        for family in EntityFamily::ALL {
            for transition in ["publish", "unpublish", "archive", "restore"] {
                let event = format!("{}.{}", family.as_str(), transition);
                let notify = transition == "publish";
                let handler = ActionHandler::new(format!("emit:{event}"), move |input| {
                    let mut output = ActionOutput::new()
                        .with_event(event.clone())
                        .with_metadata("entity_id", serde_json::json!(input.entity_id));
                    if notify {
                        output = output.with_notification(format!(
                            "{} published by {}",
                            input.entity_id, input.actor_id
                        ));
                    }
                    Ok(output)
                });
                self = self.register(family.as_str(), transition, handler);
            }
        }
        self
    }

    pub fn build(self) -> ActionRegistry {
        info!(hooks = self.handlers.len(), "Action registry built");
        ActionRegistry {
            handlers: self.handlers,
        }
    }
}

/// Immutable lookup table of action hooks.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    handlers: HashMap<ActionKey, ActionHandler>,
}

impl ActionRegistry {
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::new()
    }

    /// Registry without any hooks.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_type: &str, transition: &str) -> Option<&ActionHandler> {
        self.handlers.get(&ActionKey::new(entity_type, transition))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_key_display_is_canonical() {
        assert_eq!(ActionKey::new(" Content", "PUBLISH ").to_string(), "content::publish");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = ActionRegistry::builder()
            .register(
                "Content",
                "Publish",
                ActionHandler::new("noop", |_| Ok(ActionOutput::new())),
            )
            .build();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("content", "publish").is_some());
        assert!(registry.get("CONTENT", " publish ").is_some());
        assert!(registry.get("page", "publish").is_none());
    }

    #[test]
    fn test_standard_events() {
        let registry = ActionRegistry::builder().with_standard_events().build();
        assert_eq!(registry.len(), 12);

        let input = TransitionInput::new(Uuid::new_v4(), "page", "draft").by("alice");
        let output = registry.get("page", "publish").unwrap().run(&input).unwrap();
        assert_eq!(output.events, vec!["page.publish"]);
        assert_eq!(output.notifications.len(), 1);

        let output = registry.get("block", "archive").unwrap().run(&input).unwrap();
        assert_eq!(output.events, vec!["block.archive"]);
        assert!(output.notifications.is_empty());
    }
}
