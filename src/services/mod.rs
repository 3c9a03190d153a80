pub mod action_registry;
pub mod audit_log;
pub mod block_service;
pub mod content_service;
pub mod guarded_engine;
pub mod page_service;
pub mod publish_coordinator;
pub mod publish_scheduler;
pub mod role_authorizer;
pub mod version_ledger;
pub mod workflow_engine;

pub use action_registry::{ActionHandler, ActionKey, ActionRegistry, ActionRegistryBuilder};
pub use audit_log::{AuditFilter, AuditLogService, AuditStats};
pub use block_service::{BlockService, GlobalBlockInstance};
pub use content_service::ContentService;
pub use guarded_engine::GuardedWorkflowEngine;
pub use page_service::PageService;
pub use publish_coordinator::{LifecycleOutcome, PublishCoordinator, ScheduledLifecycle};
pub use publish_scheduler::{JobState, PublishScheduler, RunReport, ScheduledAction, ScheduledJob};
pub use role_authorizer::RoleAuthorizer;
pub use version_ledger::VersionLedger;
pub use workflow_engine::{Resolution, TransitionEngine, WorkflowEngine};
