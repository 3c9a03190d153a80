//! Port trait definitions (Hexagonal Architecture)
//!
//! Interfaces the lifecycle engine calls out to:
//! - EntityRepository: durable storage for entity lifecycle pointers
//! - Authorizer: guard evaluation for transitions
//! - AuditRecorder: fire-and-forget audit trail
//! - Clock: injectable time source
//!
//! All ports are synchronous; nothing inside the engine blocks on I/O.

pub mod audit_recorder;
pub mod authorizer;
pub mod clock;
pub mod entity_repository;

pub use audit_recorder::{AuditRecorder, NullAuditRecorder};
pub use authorizer::{AllowAll, Authorizer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entity_repository::EntityRepository;
