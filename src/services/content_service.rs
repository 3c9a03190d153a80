//! Content service: editorial content on top of the shared lifecycle.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ContentSnapshot, EntityFilter, EntityRecord, VersionRecord};
use crate::services::publish_coordinator::{LifecycleOutcome, PublishCoordinator};

pub struct ContentService {
    coordinator: Arc<PublishCoordinator<ContentSnapshot>>,
}

impl ContentService {
    pub fn new(coordinator: Arc<PublishCoordinator<ContentSnapshot>>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<PublishCoordinator<ContentSnapshot>> {
        &self.coordinator
    }

    /// Create a content entry with its first draft.
    pub fn create(
        &self,
        snapshot: ContentSnapshot,
        actor: &str,
    ) -> DomainResult<(EntityRecord, VersionRecord<ContentSnapshot>)> {
        snapshot.validate().map_err(DomainError::ValidationFailed)?;
        self.coordinator.create_entity(snapshot, actor, false)
    }

    pub fn save_draft(
        &self,
        id: Uuid,
        snapshot: ContentSnapshot,
        actor: &str,
        base_version: Option<u32>,
    ) -> DomainResult<VersionRecord<ContentSnapshot>> {
        snapshot.validate().map_err(DomainError::ValidationFailed)?;
        self.coordinator.create_draft(id, snapshot, actor, base_version)
    }

    pub fn publish(
        &self,
        id: Uuid,
        version: u32,
        actor: &str,
    ) -> DomainResult<LifecycleOutcome<ContentSnapshot>> {
        self.coordinator.publish(id, version, actor)
    }

    pub fn unpublish(&self, id: Uuid, actor: &str) -> DomainResult<LifecycleOutcome<ContentSnapshot>> {
        self.coordinator.unpublish(id, actor)
    }

    pub fn archive(&self, id: Uuid, actor: &str) -> DomainResult<LifecycleOutcome<ContentSnapshot>> {
        self.coordinator.archive(id, actor)
    }

    pub fn restore(
        &self,
        id: Uuid,
        version: u32,
        actor: &str,
    ) -> DomainResult<LifecycleOutcome<ContentSnapshot>> {
        self.coordinator.restore(id, version, actor)
    }

    pub fn get(&self, id: Uuid) -> DomainResult<EntityRecord> {
        self.coordinator.get_entity(id)
    }

    pub fn history(&self, id: Uuid) -> DomainResult<Vec<VersionRecord<ContentSnapshot>>> {
        self.coordinator.list_versions(id)
    }

    pub fn list(&self, filter: EntityFilter) -> DomainResult<Vec<EntityRecord>> {
        self.coordinator.list_entities(filter)
    }

    /// The live version of the content entry whose published slug matches.
    pub fn published_by_slug(
        &self,
        slug: &str,
    ) -> DomainResult<Option<VersionRecord<ContentSnapshot>>> {
        for entity in self.list(EntityFilter::new())? {
            if let Some(record) = self.coordinator.published_version(entity.id)? {
                if record.snapshot.slug == slug {
                    return Ok(Some(record));
                }
            }
        }
        Ok(None)
    }
}
