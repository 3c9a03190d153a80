pub mod audit;
pub mod config;
pub mod entity;
pub mod snapshot;
pub mod transition;
pub mod version;
pub mod workflow;

pub use audit::{AuditAction, AuditEntry};
pub use config::{
    AuditConfig, Config, FamilyRetention, LoggingConfig, PublishingConfig, RetentionConfig,
    RetentionPolicy, SchedulerConfig,
};
pub use entity::{EntityFamily, EntityFilter, EntityRecord};
pub use snapshot::{BlockSnapshot, ContentSnapshot, PageSnapshot};
pub use transition::{ActionOutput, TransitionInput, TransitionQuery, TransitionResult};
pub use version::{VersionRecord, VersionStatus};
pub use workflow::{
    normalize_identifier, WorkflowDefinition, WorkflowState, WorkflowTransition,
    DEFAULT_INITIAL_STATE,
};
