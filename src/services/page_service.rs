//! Page service: routable pages composed of block references.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{EntityFilter, EntityRecord, PageSnapshot, VersionRecord};
use crate::services::publish_coordinator::{LifecycleOutcome, PublishCoordinator};

pub struct PageService {
    coordinator: Arc<PublishCoordinator<PageSnapshot>>,
}

impl PageService {
    pub fn new(coordinator: Arc<PublishCoordinator<PageSnapshot>>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<PublishCoordinator<PageSnapshot>> {
        &self.coordinator
    }

    pub fn create(
        &self,
        snapshot: PageSnapshot,
        actor: &str,
    ) -> DomainResult<(EntityRecord, VersionRecord<PageSnapshot>)> {
        snapshot.validate().map_err(DomainError::ValidationFailed)?;
        self.coordinator.create_entity(snapshot, actor, false)
    }

    pub fn save_draft(
        &self,
        id: Uuid,
        snapshot: PageSnapshot,
        actor: &str,
        base_version: Option<u32>,
    ) -> DomainResult<VersionRecord<PageSnapshot>> {
        snapshot.validate().map_err(DomainError::ValidationFailed)?;
        self.coordinator.create_draft(id, snapshot, actor, base_version)
    }

    pub fn publish(&self, id: Uuid, version: u32, actor: &str) -> DomainResult<LifecycleOutcome<PageSnapshot>> {
        self.coordinator.publish(id, version, actor)
    }

    pub fn unpublish(&self, id: Uuid, actor: &str) -> DomainResult<LifecycleOutcome<PageSnapshot>> {
        self.coordinator.unpublish(id, actor)
    }

    pub fn archive(&self, id: Uuid, actor: &str) -> DomainResult<LifecycleOutcome<PageSnapshot>> {
        self.coordinator.archive(id, actor)
    }

    pub fn restore(&self, id: Uuid, version: u32, actor: &str) -> DomainResult<LifecycleOutcome<PageSnapshot>> {
        self.coordinator.restore(id, version, actor)
    }

    pub fn get(&self, id: Uuid) -> DomainResult<EntityRecord> {
        self.coordinator.get_entity(id)
    }

    pub fn history(&self, id: Uuid) -> DomainResult<Vec<VersionRecord<PageSnapshot>>> {
        self.coordinator.list_versions(id)
    }

    pub fn list(&self, filter: EntityFilter) -> DomainResult<Vec<EntityRecord>> {
        self.coordinator.list_entities(filter)
    }

    /// Pages whose published version references the block.
    pub fn pages_using_block(&self, block_id: Uuid) -> DomainResult<Vec<EntityRecord>> {
        let mut pages = Vec::new();
        for page in self.list(EntityFilter::new())? {
            let uses_block = self
                .coordinator
                .published_version(page.id)?
                .is_some_and(|record| record.snapshot.blocks.contains(&block_id));
            if uses_block {
                pages.push(page);
            }
        }
        Ok(pages)
    }
}
