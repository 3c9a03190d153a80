//! Audit recording port.

use crate::domain::models::AuditEntry;

/// Receives audit entries after successful lifecycle operations.
///
/// Recording is fire-and-forget for callers: an `Err` is logged and never
/// undoes the operation that produced the entry.
pub trait AuditRecorder: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), String>;
}

/// Recorder that drops every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditRecorder;

impl AuditRecorder for NullAuditRecorder {
    fn record(&self, _entry: AuditEntry) -> Result<(), String> {
        Ok(())
    }
}
