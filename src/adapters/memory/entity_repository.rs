//! In-memory implementation of `EntityRepository`.

use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{EntityFilter, EntityRecord};
use crate::domain::ports::EntityRepository;

#[derive(Debug, Default)]
pub struct InMemoryEntityRepository {
    entities: RwLock<HashMap<Uuid, EntityRecord>>,
}

impl InMemoryEntityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }
}

impl EntityRepository for InMemoryEntityRepository {
    fn insert(&self, entity: &EntityRecord) -> DomainResult<()> {
        let mut entities = self.entities.write();
        if entities.contains_key(&entity.id) {
            return Err(DomainError::RepositoryError(format!(
                "Entity {} already exists",
                entity.id
            )));
        }
        entities.insert(entity.id, entity.clone());
        Ok(())
    }

    fn get(&self, id: Uuid) -> DomainResult<Option<EntityRecord>> {
        Ok(self.entities.read().get(&id).cloned())
    }

    fn update(&self, entity: &EntityRecord) -> DomainResult<()> {
        match self.entities.write().get_mut(&entity.id) {
            Some(stored) => {
                *stored = entity.clone();
                Ok(())
            }
            None => Err(DomainError::EntityNotFound(entity.id)),
        }
    }

    fn list(&self, filter: &EntityFilter) -> DomainResult<Vec<EntityRecord>> {
        let mut entities: Vec<EntityRecord> = self
            .entities
            .read()
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(entities)
    }
}
