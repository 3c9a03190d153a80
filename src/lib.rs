//! Folio - Entity Lifecycle Engine
//!
//! Folio tracks versioned content, pages and reusable blocks through
//! configurable workflows: drafts are created, reviewed, published,
//! unpublished, archived and restored, with every step guarded, audited and
//! recorded in a per-entity version ledger.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Service Layer** (`services`): Workflow engine, version ledger, publish coordination
//! - **Adapter Layer** (`adapters`): In-memory port implementations
//! - **Application Layer** (`application`): Composition root
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//!
//! # Example
//!
//! ```ignore
//! use folio::application::Lifecycle;
//! use folio::domain::models::{Config, ContentSnapshot};
//!
//! let lifecycle = Lifecycle::builder(Config::default()).build()?;
//! let (entity, draft) = lifecycle
//!     .content
//!     .create(ContentSnapshot::new("Hello", "hello", "First post"), "alice")?;
//! lifecycle.content.publish(entity.id, draft.version, "alice")?;
//! ```

pub mod adapters;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{Lifecycle, LifecycleBuilder};
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    BlockSnapshot, Config, ContentSnapshot, EntityFamily, EntityRecord, PageSnapshot,
    TransitionInput, TransitionResult, VersionRecord, VersionStatus, WorkflowDefinition,
    WorkflowTransition,
};
pub use domain::ports::{AuditRecorder, Authorizer, Clock, EntityRepository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    PublishCoordinator, PublishScheduler, RoleAuthorizer, TransitionEngine, VersionLedger,
    WorkflowEngine,
};
