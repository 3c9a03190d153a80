//! Domain errors for the Folio lifecycle engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors raised by the workflow engine, version ledgers and
/// publish coordinators.
///
/// None of these are retried internally. Retry decisions belong to the
/// caller (domain service or scheduler).
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Invalid transition for {entity_type} from '{from}': {requested}")]
    InvalidTransition {
        entity_type: String,
        from: String,
        requested: String,
    },

    #[error("Guard '{guard}' rejected actor '{actor}': {reason}")]
    GuardRejected {
        guard: String,
        actor: String,
        reason: String,
    },

    #[error("Version {version} not found for entity {entity_id}")]
    VersionNotFound { entity_id: Uuid, version: u32 },

    #[error("Version {version} of entity {entity_id} is {status}, expected draft")]
    DraftRequired {
        entity_id: Uuid,
        version: u32,
        status: String,
    },

    #[error("Retention limit of {limit} versions reached for entity {entity_id}")]
    RetentionExceeded { entity_id: Uuid, limit: usize },

    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(Uuid),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Draft of entity {entity_id} is based on version {base_version}, latest is {latest_version}")]
    StaleBaseVersion {
        entity_id: Uuid,
        base_version: u32,
        latest_version: u32,
    },

    #[error("Action '{action}' failed: {reason}")]
    ActionFailed { action: String, reason: String },

    #[error("Repository error: {0}")]
    RepositoryError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DomainError {
    /// Whether retrying the same request could succeed without the caller
    /// changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RepositoryError(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
