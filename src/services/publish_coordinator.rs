//! Publish coordinator: keeps an entity's lifecycle pointers in step with
//! its version ledger.
//!
//! Every mutating operation follows the same order: load the entity, ask
//! the workflow engine whether the lifecycle move is legal from the
//! entity's current status, apply the ledger operation, then write the
//! entity's `status`, `current_version` and `published_version` back. A
//! guard rejection or ledger error returns before the entity is written.
//!
//! Operations on the same entity are serialized by a per-entity mutex. The
//! mutex is dropped from the lock table once no caller holds it, so the table
//! only tracks entities with an operation in flight.
//!
//! If the entity write fails after the ledger changed, a later call with the
//! same intent (a scheduler retry, say) sees the ledger state and repairs the
//! entity's pointers instead of treating the call as a repeat.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AuditAction, AuditEntry, EntityFamily, EntityFilter, EntityRecord, PublishingConfig,
    TransitionInput, TransitionQuery, TransitionResult, VersionRecord, WorkflowTransition,
    DEFAULT_INITIAL_STATE,
};
use crate::domain::ports::{AuditRecorder, Clock, EntityRepository};
use crate::services::version_ledger::VersionLedger;
use crate::services::workflow_engine::TransitionEngine;

const ARCHIVED: &str = "archived";

/// Result of a lifecycle operation.
#[derive(Debug, Clone)]
pub struct LifecycleOutcome<S> {
    /// Entity as persisted after the operation.
    pub entity: EntityRecord,
    /// Version the operation acted on, if any.
    pub version: Option<VersionRecord<S>>,
    pub transition: TransitionResult,
    /// False when the call was an idempotent repeat and nothing was written.
    pub changed: bool,
}

/// Lifecycle operations a scheduler can fire without knowing the
/// snapshot type.
pub trait ScheduledLifecycle: Send + Sync {
    fn family(&self) -> EntityFamily;

    fn publish_scheduled(&self, entity_id: Uuid, version: u32, actor: &str) -> DomainResult<bool>;

    fn unpublish_scheduled(&self, entity_id: Uuid, actor: &str) -> DomainResult<bool>;
}

pub struct PublishCoordinator<S> {
    family: EntityFamily,
    engine: Arc<dyn TransitionEngine>,
    ledger: Arc<VersionLedger<S>>,
    repository: Arc<dyn EntityRepository>,
    audit: Arc<dyn AuditRecorder>,
    clock: Arc<dyn Clock>,
    config: PublishingConfig,
    entity_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl<S> PublishCoordinator<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(
        engine: Arc<dyn TransitionEngine>,
        ledger: Arc<VersionLedger<S>>,
        repository: Arc<dyn EntityRepository>,
        audit: Arc<dyn AuditRecorder>,
        clock: Arc<dyn Clock>,
        config: PublishingConfig,
    ) -> Self {
        Self {
            family: ledger.family(),
            engine,
            ledger,
            repository,
            audit,
            clock,
            config,
            entity_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn family(&self) -> EntityFamily {
        self.family
    }

    pub fn ledger(&self) -> &Arc<VersionLedger<S>> {
        &self.ledger
    }

    fn entity_lock(&self, entity_id: Uuid) -> Arc<Mutex<()>> {
        self.entity_locks
            .lock()
            .entry(entity_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `op` holding the entity's lock, then drop the lock entry if no
    /// other caller is waiting on it.
    fn with_entity_lock<T>(
        &self,
        entity_id: Uuid,
        op: impl FnOnce() -> DomainResult<T>,
    ) -> DomainResult<T> {
        let lock = self.entity_lock(entity_id);
        let result = {
            let _guard = lock.lock();
            op()
        };
        drop(lock);

        let mut locks = self.entity_locks.lock();
        if locks
            .get(&entity_id)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            locks.remove(&entity_id);
        }
        result
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.entity_locks.lock().len()
    }

    fn load(&self, entity_id: Uuid) -> DomainResult<EntityRecord> {
        match self.repository.get(entity_id)? {
            Some(entity) if entity.family == self.family => Ok(entity),
            _ => Err(DomainError::EntityNotFound(entity_id)),
        }
    }

    fn transition_input(&self, entity: &EntityRecord, actor: &str) -> TransitionInput {
        TransitionInput::new(entity.id, self.family.as_str(), &entity.status).by(actor)
    }

    /// Confirm the entity can stay where it is. Always a no-op transition.
    fn hold(&self, entity: &EntityRecord, actor: &str) -> DomainResult<TransitionResult> {
        self.engine
            .transition(&self.transition_input(entity, actor).towards(&entity.status))
    }

    /// Write the entity back. `current_version` is refreshed from the ledger
    /// so a draft allocated by an earlier failed write is picked up.
    fn save(&self, entity: &mut EntityRecord, transition: &TransitionResult) -> DomainResult<()> {
        entity.status = transition.to_state.to_string();
        entity.current_version = self.ledger.latest_version(entity.id);
        entity.updated_at = self.clock.now();
        self.repository.update(entity)
    }

    fn record_audit(&self, entry: AuditEntry) {
        let action = entry.action;
        let entity_id = entry.entity_id;
        if let Err(reason) = self.audit.record(entry) {
            warn!(
                action = action.as_str(),
                entity_id = %entity_id,
                error = %reason,
                "Failed to record audit entry"
            );
        }
    }

    fn audit_entry(
        &self,
        action: AuditAction,
        entity: &EntityRecord,
        actor: &str,
        transition: &TransitionResult,
    ) -> AuditEntry {
        let mut entry = AuditEntry::new(action, self.family, entity.id, actor, self.clock.now())
            .with_state_change(transition.from_state.as_str(), transition.to_state.as_str());
        if !transition.events.is_empty() {
            entry = entry.with_metadata("events", json!(transition.events));
        }
        entry
    }

    /// Create an entity together with its first draft.
    #[instrument(skip(self, snapshot), fields(family = %self.family))]
    pub fn create_entity(
        &self,
        snapshot: S,
        actor: &str,
        global: bool,
    ) -> DomainResult<(EntityRecord, VersionRecord<S>)> {
        let mut entity =
            EntityRecord::new(self.family, DEFAULT_INITIAL_STATE, actor, self.clock.now());
        entity.global = global;

        let draft = self.ledger.create_draft(entity.id, snapshot, actor, None)?;
        entity.current_version = draft.version;
        self.repository.insert(&entity)?;

        info!(entity_id = %entity.id, global, actor, "Entity created");
        self.record_audit(
            AuditEntry::new(AuditAction::EntityCreated, self.family, entity.id, actor, entity.created_at)
                .with_version(draft.version)
                .with_state_change("", entity.status.as_str()),
        );
        Ok((entity, draft))
    }

    /// Store a new draft. Archived entities must be restored first.
    ///
    /// A `base_version` older than the latest version is logged, or refused
    /// when `reject_stale_base` is set. A base that was never allocated is
    /// treated the same way.
    #[instrument(skip(self, snapshot), fields(family = %self.family))]
    pub fn create_draft(
        &self,
        entity_id: Uuid,
        snapshot: S,
        actor: &str,
        base_version: Option<u32>,
    ) -> DomainResult<VersionRecord<S>> {
        self.with_entity_lock(entity_id, || {
            self.create_draft_locked(entity_id, snapshot, actor, base_version)
        })
    }

    fn create_draft_locked(
        &self,
        entity_id: Uuid,
        snapshot: S,
        actor: &str,
        base_version: Option<u32>,
    ) -> DomainResult<VersionRecord<S>> {
        let mut entity = self.load(entity_id)?;
        if entity.status == ARCHIVED {
            return Err(DomainError::InvalidTransition {
                entity_type: self.family.to_string(),
                from: entity.status,
                requested: "create_draft".to_string(),
            });
        }

        if let Some(base) = base_version {
            self.check_base(entity_id, base)?;
        }

        let draft = self.ledger.create_draft(entity_id, snapshot, actor, base_version)?;
        entity.current_version = draft.version;
        entity.updated_at = self.clock.now();
        self.repository.update(&entity)?;

        let mut entry = AuditEntry::new(AuditAction::DraftCreated, self.family, entity_id, actor, draft.created_at)
            .with_version(draft.version);
        if let Some(base) = base_version {
            entry = entry.with_metadata("base_version", json!(base));
        }
        self.record_audit(entry);
        Ok(draft)
    }

    fn check_base(&self, entity_id: Uuid, base: u32) -> DomainResult<()> {
        let latest = self.ledger.latest_version(entity_id);
        if base == latest {
            return Ok(());
        }
        if self.config.reject_stale_base {
            return Err(DomainError::StaleBaseVersion {
                entity_id,
                base_version: base,
                latest_version: latest,
            });
        }
        if base < latest {
            warn!(
                entity_id = %entity_id,
                base_version = base,
                latest_version = latest,
                "Draft based on a stale version"
            );
        } else {
            warn!(
                entity_id = %entity_id,
                base_version = base,
                latest_version = latest,
                "Draft based on an unknown version"
            );
        }
        Ok(())
    }

    /// Publish a draft version.
    ///
    /// Publishing a version that is already published is a no-op with
    /// `changed == false`. If the ledger already has the version published
    /// but the entity does not point at it, the entity is brought back in
    /// line and the call reports `changed == true`.
    #[instrument(skip(self), fields(family = %self.family))]
    pub fn publish(
        &self,
        entity_id: Uuid,
        version: u32,
        actor: &str,
    ) -> DomainResult<LifecycleOutcome<S>> {
        self.with_entity_lock(entity_id, || self.publish_locked(entity_id, version, actor))
    }

    fn publish_locked(
        &self,
        entity_id: Uuid,
        version: u32,
        actor: &str,
    ) -> DomainResult<LifecycleOutcome<S>> {
        let mut entity = self.load(entity_id)?;
        let existing = self.ledger.get_version(entity_id, version)?;
        let reconcile = existing.is_published();
        if reconcile && entity.published_version == Some(version) {
            info!(entity_id = %entity_id, version, "Version already published");
            return Ok(LifecycleOutcome {
                transition: self.hold(&entity, actor)?,
                entity,
                version: Some(existing),
                changed: false,
            });
        }
        if !reconcile && !existing.is_draft() {
            return Err(DomainError::DraftRequired {
                entity_id,
                version,
                status: existing.status.to_string(),
            });
        }

        let transition = self
            .engine
            .transition(&self.transition_input(&entity, actor).named("publish"))?;
        let previous = entity.published_version;
        let published = if reconcile {
            warn!(
                entity_id = %entity_id,
                version,
                entity_published = ?previous,
                "Entity behind ledger, restoring published pointer"
            );
            existing
        } else {
            self.ledger.publish_draft(entity_id, version, actor, None)?
        };

        entity.published_version = Some(version);
        self.save(&mut entity, &transition)?;

        info!(entity_id = %entity_id, version, previous = ?previous, actor, "Published");
        let mut entry = self
            .audit_entry(AuditAction::VersionPublished, &entity, actor, &transition)
            .with_version(version);
        if let Some(previous) = previous.filter(|p| *p != version) {
            entry = entry.with_metadata("archived_version", json!(previous));
        }
        if reconcile {
            entry = entry.with_metadata("reconciled", json!(true));
        }
        self.record_audit(entry);

        Ok(LifecycleOutcome {
            entity,
            version: Some(published),
            transition,
            changed: true,
        })
    }

    /// Take the published version offline. No-op when neither the entity
    /// nor the ledger has anything published.
    #[instrument(skip(self), fields(family = %self.family))]
    pub fn unpublish(&self, entity_id: Uuid, actor: &str) -> DomainResult<LifecycleOutcome<S>> {
        self.with_entity_lock(entity_id, || self.unpublish_locked(entity_id, actor))
    }

    fn unpublish_locked(&self, entity_id: Uuid, actor: &str) -> DomainResult<LifecycleOutcome<S>> {
        let mut entity = self.load(entity_id)?;
        let live = self.ledger.published_version(entity_id);
        if !entity.is_published() && live.is_none() {
            return Ok(LifecycleOutcome {
                transition: self.hold(&entity, actor)?,
                entity,
                version: None,
                changed: false,
            });
        }

        let input = self.transition_input(&entity, actor);
        let transition = if entity.is_published() {
            self.engine.transition(&input.named("unpublish"))?
        } else {
            self.engine.transition(&input.towards(&entity.status))?
        };
        if entity.is_published() != live.is_some() {
            warn!(
                entity_id = %entity_id,
                entity_published = ?entity.published_version,
                ledger_published = ?live.as_ref().map(|r| r.version),
                "Entity out of step with ledger, clearing published pointer"
            );
        }
        let archived = self.ledger.archive_published(entity_id)?;

        entity.published_version = None;
        self.save(&mut entity, &transition)?;

        info!(entity_id = %entity_id, actor, "Unpublished");
        let mut entry = self.audit_entry(AuditAction::VersionUnpublished, &entity, actor, &transition);
        if let Some(ref record) = archived {
            entry = entry.with_version(record.version);
        }
        self.record_audit(entry);

        Ok(LifecycleOutcome {
            entity,
            version: archived,
            transition,
            changed: true,
        })
    }

    /// Archive the entity, taking any published version offline.
    #[instrument(skip(self), fields(family = %self.family))]
    pub fn archive(&self, entity_id: Uuid, actor: &str) -> DomainResult<LifecycleOutcome<S>> {
        self.with_entity_lock(entity_id, || self.archive_locked(entity_id, actor))
    }

    fn archive_locked(&self, entity_id: Uuid, actor: &str) -> DomainResult<LifecycleOutcome<S>> {
        let mut entity = self.load(entity_id)?;
        let transition = self
            .engine
            .transition(&self.transition_input(&entity, actor).named("archive"))?;
        let archived = self.ledger.archive_published(entity_id)?;

        entity.published_version = None;
        self.save(&mut entity, &transition)?;

        info!(entity_id = %entity_id, actor, "Archived");
        let mut entry = self.audit_entry(AuditAction::EntityArchived, &entity, actor, &transition);
        if let Some(ref record) = archived {
            entry = entry.with_version(record.version);
        }
        self.record_audit(entry);

        Ok(LifecycleOutcome {
            entity,
            version: archived,
            transition,
            changed: true,
        })
    }

    /// Copy a historical version into a new draft.
    ///
    /// An archived entity moves back to its initial state through the
    /// `restore` transition; otherwise the status is left as it is.
    #[instrument(skip(self), fields(family = %self.family))]
    pub fn restore(
        &self,
        entity_id: Uuid,
        version: u32,
        actor: &str,
    ) -> DomainResult<LifecycleOutcome<S>> {
        self.with_entity_lock(entity_id, || self.restore_locked(entity_id, version, actor))
    }

    fn restore_locked(
        &self,
        entity_id: Uuid,
        version: u32,
        actor: &str,
    ) -> DomainResult<LifecycleOutcome<S>> {
        let mut entity = self.load(entity_id)?;
        self.ledger.get_version(entity_id, version)?;

        let input = self.transition_input(&entity, actor);
        let input = if entity.status == ARCHIVED {
            input.named("restore")
        } else {
            input.towards(&entity.status)
        };
        let transition = self.engine.transition(&input)?;
        let draft = self.ledger.restore_version(entity_id, version, actor)?;

        entity.current_version = draft.version;
        self.save(&mut entity, &transition)?;

        info!(entity_id = %entity_id, from = version, to = draft.version, actor, "Restored");
        self.record_audit(
            self.audit_entry(AuditAction::VersionRestored, &entity, actor, &transition)
                .with_version(draft.version)
                .with_metadata("restored_from", json!(version)),
        );

        Ok(LifecycleOutcome {
            entity,
            version: Some(draft),
            transition,
            changed: true,
        })
    }

    pub fn get_entity(&self, entity_id: Uuid) -> DomainResult<EntityRecord> {
        self.load(entity_id)
    }

    pub fn list_entities(&self, filter: EntityFilter) -> DomainResult<Vec<EntityRecord>> {
        self.repository.list(&filter.with_family(self.family))
    }

    pub fn list_versions(&self, entity_id: Uuid) -> DomainResult<Vec<VersionRecord<S>>> {
        self.load(entity_id)?;
        Ok(self.ledger.list_versions(entity_id))
    }

    pub fn get_version(&self, entity_id: Uuid, version: u32) -> DomainResult<VersionRecord<S>> {
        self.load(entity_id)?;
        self.ledger.get_version(entity_id, version)
    }

    pub fn published_version(&self, entity_id: Uuid) -> DomainResult<Option<VersionRecord<S>>> {
        self.load(entity_id)?;
        Ok(self.ledger.published_version(entity_id))
    }

    /// Transitions the workflow allows from the entity's current status.
    pub fn available_actions(&self, entity_id: Uuid) -> DomainResult<Vec<WorkflowTransition>> {
        let entity = self.load(entity_id)?;
        self.engine
            .available_transitions(&TransitionQuery::new(self.family.as_str(), &entity.status))
    }
}

impl<S> ScheduledLifecycle for PublishCoordinator<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn family(&self) -> EntityFamily {
        self.family
    }

    fn publish_scheduled(&self, entity_id: Uuid, version: u32, actor: &str) -> DomainResult<bool> {
        self.publish(entity_id, version, actor).map(|o| o.changed)
    }

    fn unpublish_scheduled(&self, entity_id: Uuid, actor: &str) -> DomainResult<bool> {
        self.unpublish(entity_id, actor).map(|o| o.changed)
    }
}
