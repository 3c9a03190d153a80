//! Role-based guard evaluation.
//!
//! Guards have the form `role:<name>[,<name>...]`; an actor passes when it
//! holds any of the listed roles. `any` and the empty guard always pass.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

use crate::domain::models::{normalize_identifier, TransitionInput};
use crate::domain::ports::Authorizer;

const ROLE_PREFIX: &str = "role:";

#[derive(Debug, Default)]
pub struct RoleAuthorizer {
    roles: RwLock<HashMap<String, HashSet<String>>>,
}

impl RoleAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant roles to an actor, builder style.
    pub fn with_roles(self, actor: &str, roles: &[&str]) -> Self {
        for role in roles {
            self.grant(actor, role);
        }
        self
    }

    pub fn grant(&self, actor: &str, role: &str) {
        self.roles
            .write()
            .entry(actor.trim().to_string())
            .or_default()
            .insert(normalize_identifier(role));
    }

    pub fn revoke(&self, actor: &str, role: &str) -> bool {
        self.roles
            .write()
            .get_mut(actor.trim())
            .map(|roles| roles.remove(&normalize_identifier(role)))
            .unwrap_or(false)
    }

    pub fn has_role(&self, actor: &str, role: &str) -> bool {
        self.roles
            .read()
            .get(actor.trim())
            .is_some_and(|roles| roles.contains(&normalize_identifier(role)))
    }
}

impl Authorizer for RoleAuthorizer {
    fn authorize_transition(&self, input: &TransitionInput, guard: &str) -> Result<(), String> {
        let guard = normalize_identifier(guard);
        if guard.is_empty() || guard == "any" {
            return Ok(());
        }

        let Some(required) = guard.strip_prefix(ROLE_PREFIX) else {
            return Err(format!("unsupported guard expression '{guard}'"));
        };

        let allowed = required
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .any(|role| self.has_role(&input.actor_id, role));

        debug!(actor = %input.actor_id, guard = %guard, allowed, "Evaluated role guard");
        if allowed {
            Ok(())
        } else {
            Err(format!("actor '{}' lacks {}", input.actor_id, guard))
        }
    }
}
