//! Per-family version ledger.
//!
//! Stores the numbered snapshots of every entity of one family and tracks
//! which version, if any, is published. Invariants held here:
//!
//! - version numbers start at 1, strictly increase and are never reused,
//!   even after eviction or restore;
//! - at most one version per entity is `published`;
//! - publishing a draft archives the previously published version and
//!   touches nothing else;
//! - restore copies a historical snapshot into a new draft; history is
//!   never rewritten.
//!
//! Every mutation holds the table's write lock for its whole
//! read-modify-write, so two publishes of the same entity cannot interleave.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    EntityFamily, FamilyRetention, RetentionPolicy, VersionRecord, VersionStatus,
};
use crate::domain::ports::Clock;

/// Retained versions of one entity.
#[derive(Debug, Clone)]
struct EntityVersions<S> {
    records: BTreeMap<u32, VersionRecord<S>>,
    /// Highest number ever allocated. Survives eviction.
    last_version: u32,
}

impl<S> Default for EntityVersions<S> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            last_version: 0,
        }
    }
}

impl<S> EntityVersions<S> {
    fn published_mut(&mut self) -> Option<&mut VersionRecord<S>> {
        self.records.values_mut().find(|r| r.is_published())
    }

    /// Versions to evict so one more fits under `limit`, oldest first.
    ///
    /// The published version and the current (latest) version are never
    /// candidates. `None` when not enough other versions exist.
    fn eviction_candidates(&self, limit: usize) -> Option<Vec<u32>> {
        let excess = (self.records.len() + 1).saturating_sub(limit);
        let candidates: Vec<u32> = self
            .records
            .values()
            .filter(|r| !r.is_published() && r.version != self.last_version)
            .map(|r| r.version)
            .take(excess)
            .collect();

        (candidates.len() == excess).then_some(candidates)
    }
}

/// Version ledger for one entity family.
pub struct VersionLedger<S> {
    family: EntityFamily,
    retention: FamilyRetention,
    clock: Arc<dyn Clock>,
    tables: RwLock<HashMap<Uuid, EntityVersions<S>>>,
}

impl<S> VersionLedger<S>
where
    S: Clone + Send + Sync,
{
    pub fn new(family: EntityFamily, retention: FamilyRetention, clock: Arc<dyn Clock>) -> Self {
        Self {
            family,
            retention,
            clock,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn family(&self) -> EntityFamily {
        self.family
    }

    pub fn retention(&self) -> FamilyRetention {
        self.retention
    }

    /// Store `snapshot` as a new draft at the next version number.
    ///
    /// `base_version` is recorded as given. The ledger does not check it
    /// against the entity's history; comparing it is up to the caller.
    #[instrument(skip(self, snapshot), fields(family = %self.family))]
    pub fn create_draft(
        &self,
        entity_id: Uuid,
        snapshot: S,
        created_by: &str,
        base_version: Option<u32>,
    ) -> DomainResult<VersionRecord<S>> {
        let mut tables = self.tables.write();
        let versions = tables.entry(entity_id).or_default();
        self.create_draft_locked(versions, entity_id, snapshot, created_by, base_version)
    }

    fn create_draft_locked(
        &self,
        versions: &mut EntityVersions<S>,
        entity_id: Uuid,
        snapshot: S,
        created_by: &str,
        base_version: Option<u32>,
    ) -> DomainResult<VersionRecord<S>> {
        let limit = self.retention.limit;
        if !self.retention.is_unlimited() && versions.records.len() >= limit {
            let evict = match self.retention.policy {
                RetentionPolicy::Reject => None,
                RetentionPolicy::EvictOldest => versions.eviction_candidates(limit),
            };

            let Some(evict) = evict else {
                warn!(
                    entity_id = %entity_id,
                    limit,
                    policy = ?self.retention.policy,
                    "Retention limit reached, draft refused"
                );
                return Err(DomainError::RetentionExceeded { entity_id, limit });
            };

            for version in evict {
                versions.records.remove(&version);
                info!(entity_id = %entity_id, version, "Evicted version under retention limit");
            }
        }

        let version = versions.last_version + 1;
        let record = VersionRecord {
            entity_id,
            version,
            status: VersionStatus::Draft,
            snapshot,
            created_by: created_by.to_string(),
            published_by: None,
            base_version,
            created_at: self.clock.now(),
            published_at: None,
        };

        versions.last_version = version;
        versions.records.insert(version, record.clone());

        info!(
            entity_id = %entity_id,
            version,
            base_version = ?base_version,
            created_by,
            "Draft created"
        );
        Ok(record)
    }

    /// Publish a draft, archiving whichever version was published before.
    #[instrument(skip(self), fields(family = %self.family))]
    pub fn publish_draft(
        &self,
        entity_id: Uuid,
        version: u32,
        published_by: &str,
        published_at: Option<DateTime<Utc>>,
    ) -> DomainResult<VersionRecord<S>> {
        let mut tables = self.tables.write();
        let versions = tables
            .get_mut(&entity_id)
            .ok_or(DomainError::VersionNotFound { entity_id, version })?;

        match versions.records.get(&version) {
            None => return Err(DomainError::VersionNotFound { entity_id, version }),
            Some(record) if !record.is_draft() => {
                return Err(DomainError::DraftRequired {
                    entity_id,
                    version,
                    status: record.status.to_string(),
                });
            }
            Some(_) => {}
        }

        if let Some(previous) = versions.published_mut() {
            previous.status = VersionStatus::Archived;
            debug!(entity_id = %entity_id, version = previous.version, "Archived previously published version");
        }

        let published_at = published_at.unwrap_or_else(|| self.clock.now());
        let record = versions
            .records
            .get_mut(&version)
            .ok_or(DomainError::VersionNotFound { entity_id, version })?;
        record.status = VersionStatus::Published;
        record.published_by = Some(published_by.to_string());
        record.published_at = Some(published_at);

        info!(entity_id = %entity_id, version, published_by, "Version published");
        Ok(record.clone())
    }

    /// Archive the published version, if there is one.
    #[instrument(skip(self), fields(family = %self.family))]
    pub fn archive_published(&self, entity_id: Uuid) -> DomainResult<Option<VersionRecord<S>>> {
        let mut tables = self.tables.write();
        let Some(versions) = tables.get_mut(&entity_id) else {
            return Ok(None);
        };

        Ok(versions.published_mut().map(|record| {
            record.status = VersionStatus::Archived;
            info!(entity_id = %entity_id, version = record.version, "Published version archived");
            record.clone()
        }))
    }

    /// Copy a historical snapshot into a new draft at the next version.
    ///
    /// The source version is left as it is; the new draft records it as
    /// its base version.
    #[instrument(skip(self), fields(family = %self.family))]
    pub fn restore_version(
        &self,
        entity_id: Uuid,
        version: u32,
        restored_by: &str,
    ) -> DomainResult<VersionRecord<S>> {
        let mut tables = self.tables.write();
        let versions = tables
            .get_mut(&entity_id)
            .ok_or(DomainError::VersionNotFound { entity_id, version })?;
        let snapshot = versions
            .records
            .get(&version)
            .map(|r| r.snapshot.clone())
            .ok_or(DomainError::VersionNotFound { entity_id, version })?;

        let record = self.create_draft_locked(versions, entity_id, snapshot, restored_by, Some(version))?;
        info!(entity_id = %entity_id, from = version, to = record.version, "Version restored");
        Ok(record)
    }

    /// All retained versions, ascending by version number.
    pub fn list_versions(&self, entity_id: Uuid) -> Vec<VersionRecord<S>> {
        self.tables
            .read()
            .get(&entity_id)
            .map(|v| v.records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_version(&self, entity_id: Uuid, version: u32) -> DomainResult<VersionRecord<S>> {
        self.tables
            .read()
            .get(&entity_id)
            .and_then(|v| v.records.get(&version))
            .cloned()
            .ok_or(DomainError::VersionNotFound { entity_id, version })
    }

    pub fn published_version(&self, entity_id: Uuid) -> Option<VersionRecord<S>> {
        self.tables
            .read()
            .get(&entity_id)
            .and_then(|v| v.records.values().find(|r| r.is_published()))
            .cloned()
    }

    /// Highest version number allocated for the entity, 0 if none.
    pub fn latest_version(&self, entity_id: Uuid) -> u32 {
        self.tables
            .read()
            .get(&entity_id)
            .map(|v| v.last_version)
            .unwrap_or(0)
    }
}
