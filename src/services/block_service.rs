//! Block service: reusable blocks, optionally shared across pages.
//!
//! A global block is one entity referenced from many pages; its lifecycle
//! pointers are reported by `global_instances`.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BlockSnapshot, EntityFilter, EntityRecord, VersionRecord};
use crate::services::publish_coordinator::{LifecycleOutcome, PublishCoordinator};

/// Lifecycle summary of a global block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalBlockInstance {
    pub entity_id: Uuid,
    pub kind: String,
    pub status: String,
    pub current_version: u32,
    pub published_version: Option<u32>,
}

pub struct BlockService {
    coordinator: Arc<PublishCoordinator<BlockSnapshot>>,
}

impl BlockService {
    pub fn new(coordinator: Arc<PublishCoordinator<BlockSnapshot>>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<PublishCoordinator<BlockSnapshot>> {
        &self.coordinator
    }

    /// Create a block instance. `global` blocks are shared across pages.
    pub fn create_instance(
        &self,
        snapshot: BlockSnapshot,
        actor: &str,
        global: bool,
    ) -> DomainResult<(EntityRecord, VersionRecord<BlockSnapshot>)> {
        snapshot.validate().map_err(DomainError::ValidationFailed)?;
        self.coordinator.create_entity(snapshot, actor, global)
    }

    pub fn save_draft(
        &self,
        id: Uuid,
        snapshot: BlockSnapshot,
        actor: &str,
        base_version: Option<u32>,
    ) -> DomainResult<VersionRecord<BlockSnapshot>> {
        snapshot.validate().map_err(DomainError::ValidationFailed)?;
        self.coordinator.create_draft(id, snapshot, actor, base_version)
    }

    pub fn publish(&self, id: Uuid, version: u32, actor: &str) -> DomainResult<LifecycleOutcome<BlockSnapshot>> {
        self.coordinator.publish(id, version, actor)
    }

    pub fn unpublish(&self, id: Uuid, actor: &str) -> DomainResult<LifecycleOutcome<BlockSnapshot>> {
        self.coordinator.unpublish(id, actor)
    }

    pub fn archive(&self, id: Uuid, actor: &str) -> DomainResult<LifecycleOutcome<BlockSnapshot>> {
        self.coordinator.archive(id, actor)
    }

    pub fn restore(&self, id: Uuid, version: u32, actor: &str) -> DomainResult<LifecycleOutcome<BlockSnapshot>> {
        self.coordinator.restore(id, version, actor)
    }

    pub fn get(&self, id: Uuid) -> DomainResult<EntityRecord> {
        self.coordinator.get_entity(id)
    }

    pub fn history(&self, id: Uuid) -> DomainResult<Vec<VersionRecord<BlockSnapshot>>> {
        self.coordinator.list_versions(id)
    }

    /// Every global block with its current and published version numbers.
    pub fn global_instances(&self) -> DomainResult<Vec<GlobalBlockInstance>> {
        let ledger = self.coordinator.ledger();
        Ok(self
            .coordinator
            .list_entities(EntityFilter::new().with_global(true))?
            .into_iter()
            .map(|entity| GlobalBlockInstance {
                kind: ledger
                    .get_version(entity.id, entity.current_version)
                    .map(|r| r.snapshot.kind)
                    .unwrap_or_default(),
                entity_id: entity.id,
                status: entity.status,
                current_version: entity.current_version,
                published_version: entity.published_version,
            })
            .collect())
    }
}
