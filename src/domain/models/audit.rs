//! Audit events emitted by the publish coordinators.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::EntityFamily;

/// Lifecycle operation recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    EntityCreated,
    DraftCreated,
    VersionPublished,
    VersionUnpublished,
    EntityArchived,
    VersionRestored,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityCreated => "entity_created",
            Self::DraftCreated => "draft_created",
            Self::VersionPublished => "version_published",
            Self::VersionUnpublished => "version_unpublished",
            Self::EntityArchived => "entity_archived",
            Self::VersionRestored => "version_restored",
        }
    }
}

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID.
    pub id: Uuid,
    /// When the operation completed.
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub family: EntityFamily,
    pub entity_id: Uuid,
    /// Version affected by the operation, if any.
    pub version: Option<u32>,
    /// Who triggered the operation.
    pub actor: String,
    /// Entity status before the operation.
    pub previous_state: Option<String>,
    /// Entity status after the operation.
    pub new_state: Option<String>,
    /// Additional metadata.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AuditEntry {
    /// Create a new audit entry.
    pub fn new(
        action: AuditAction,
        family: EntityFamily,
        entity_id: Uuid,
        actor: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            action,
            family,
            entity_id,
            version: None,
            actor: actor.into(),
            previous_state: None,
            new_state: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Set state transition.
    pub fn with_state_change(
        mut self,
        previous: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        self.previous_state = Some(previous.into());
        self.new_state = Some(new.into());
        self
    }

    /// Add metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
