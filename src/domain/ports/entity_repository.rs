//! Repository port for entity persistence.

use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EntityFilter, EntityRecord};

/// Durable storage for entity lifecycle pointers.
///
/// Implementations must make `update` an all-or-nothing write: the publish
/// coordinator relies on a failed update leaving the stored record as it was.
pub trait EntityRepository: Send + Sync {
    /// Insert a new entity. Fails if the ID already exists.
    fn insert(&self, entity: &EntityRecord) -> DomainResult<()>;

    /// Get an entity by ID.
    fn get(&self, id: Uuid) -> DomainResult<Option<EntityRecord>>;

    /// Replace an existing entity.
    fn update(&self, entity: &EntityRecord) -> DomainResult<()>;

    /// List entities matching a filter, ordered by creation time.
    fn list(&self, filter: &EntityFilter) -> DomainResult<Vec<EntityRecord>>;
}
