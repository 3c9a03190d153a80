//! In-memory audit trail of lifecycle operations.
//!
//! Bounded: once `max_entries` is reached the oldest entry is dropped for
//! each new one. Implements `AuditRecorder`, so coordinators can write to it
//! directly.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AuditAction, AuditConfig, AuditEntry, EntityFamily};
use crate::domain::ports::AuditRecorder;

/// Filter for querying audit logs.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub family: Option<EntityFamily>,
    pub entity_id: Option<Uuid>,
    pub actor: Option<String>,
    /// Filter by time range start.
    pub from: Option<DateTime<Utc>>,
    /// Filter by time range end.
    pub to: Option<DateTime<Utc>>,
    /// Limit results.
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_family(mut self, family: EntityFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn with_entity(mut self, id: Uuid) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = Some(actor.to_string());
        self
    }

    pub fn with_time_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if an entry matches this filter.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }

        if let Some(family) = self.family {
            if entry.family != family {
                return false;
            }
        }

        if let Some(entity_id) = self.entity_id {
            if entry.entity_id != entity_id {
                return false;
            }
        }

        if let Some(ref actor) = self.actor {
            if &entry.actor != actor {
                return false;
            }
        }

        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }

        if let Some(to) = self.to {
            if entry.timestamp > to {
                return false;
            }
        }

        true
    }
}

/// Statistics about the audit log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditStats {
    pub total_entries: usize,
    pub by_action: HashMap<String, usize>,
    pub by_family: HashMap<String, usize>,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    /// Entries dropped to stay under `max_entries`.
    pub evicted: u64,
}

#[derive(Debug, Default)]
struct AuditBuffer {
    entries: VecDeque<AuditEntry>,
    evicted: u64,
}

/// In-memory audit log service.
#[derive(Debug)]
pub struct AuditLogService {
    max_entries: usize,
    buffer: RwLock<AuditBuffer>,
}

impl AuditLogService {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            buffer: RwLock::new(AuditBuffer::default()),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.max_entries)
    }

    /// Log an audit entry.
    pub fn log(&self, entry: AuditEntry) {
        let mut buffer = self.buffer.write();

        while buffer.entries.len() >= self.max_entries {
            buffer.entries.pop_front();
            buffer.evicted += 1;
        }

        buffer.entries.push_back(entry);
    }

    /// All retained entries in the order they were logged.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer.read().entries.iter().cloned().collect()
    }

    /// Query audit entries, newest first.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        let buffer = self.buffer.read();
        let mut results: Vec<AuditEntry> = buffer
            .entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }

        results
    }

    /// Get entries for a specific entity.
    pub fn entity_history(&self, entity_id: Uuid) -> Vec<AuditEntry> {
        self.query(&AuditFilter::new().with_entity(entity_id))
    }

    pub fn stats(&self) -> AuditStats {
        let buffer = self.buffer.read();

        let mut by_action: HashMap<String, usize> = HashMap::new();
        let mut by_family: HashMap<String, usize> = HashMap::new();
        for entry in &buffer.entries {
            *by_action.entry(entry.action.as_str().to_string()).or_default() += 1;
            *by_family.entry(entry.family.as_str().to_string()).or_default() += 1;
        }

        AuditStats {
            total_entries: buffer.entries.len(),
            by_action,
            by_family,
            oldest_entry: buffer.entries.front().map(|e| e.timestamp),
            newest_entry: buffer.entries.back().map(|e| e.timestamp),
            evicted: buffer.evicted,
        }
    }

    pub fn clear(&self) {
        self.buffer.write().entries.clear();
    }

    /// Export matching entries as pretty JSON.
    pub fn export_json(&self, filter: &AuditFilter) -> DomainResult<String> {
        Ok(serde_json::to_string_pretty(&self.query(filter))?)
    }
}

impl Default for AuditLogService {
    fn default() -> Self {
        Self::from_config(&AuditConfig::default())
    }
}

impl AuditRecorder for AuditLogService {
    fn record(&self, entry: AuditEntry) -> Result<(), String> {
        self.log(entry);
        Ok(())
    }
}
