use serde::{Deserialize, Serialize};

use super::entity::EntityFamily;
use super::workflow::WorkflowDefinition;

/// Main configuration structure for Folio
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Version retention per entity family
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Publish coordinator behaviour
    #[serde(default)]
    pub publishing: PublishingConfig,

    /// In-memory audit log configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Publish scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Extra workflow definitions, registered after the built-in ones
    #[serde(default)]
    pub workflows: Vec<WorkflowDefinition>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rotated log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// What a ledger does when a new draft would exceed the retention limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Refuse the new draft.
    #[default]
    Reject,
    /// Evict the oldest version that is neither published nor current.
    EvictOldest,
}

/// Retention settings for one entity family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FamilyRetention {
    /// Maximum retained versions per entity; 0 means unlimited
    #[serde(default)]
    pub limit: usize,

    #[serde(default)]
    pub policy: RetentionPolicy,
}

impl FamilyRetention {
    pub const UNLIMITED: FamilyRetention = FamilyRetention {
        limit: 0,
        policy: RetentionPolicy::Reject,
    };

    pub fn new(limit: usize, policy: RetentionPolicy) -> Self {
        Self { limit, policy }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit == 0
    }
}

impl Default for FamilyRetention {
    fn default() -> Self {
        Self::UNLIMITED
    }
}

/// Version retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetentionConfig {
    #[serde(default = "default_content_retention")]
    pub content: FamilyRetention,

    #[serde(default = "default_page_retention")]
    pub page: FamilyRetention,

    #[serde(default = "default_block_retention")]
    pub block: FamilyRetention,
}

fn default_content_retention() -> FamilyRetention {
    FamilyRetention::new(50, RetentionPolicy::EvictOldest)
}

fn default_page_retention() -> FamilyRetention {
    FamilyRetention::new(50, RetentionPolicy::EvictOldest)
}

fn default_block_retention() -> FamilyRetention {
    FamilyRetention::new(20, RetentionPolicy::EvictOldest)
}

impl RetentionConfig {
    pub fn for_family(&self, family: EntityFamily) -> FamilyRetention {
        match family {
            EntityFamily::Content => self.content,
            EntityFamily::Page => self.page,
            EntityFamily::Block => self.block,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            content: default_content_retention(),
            page: default_page_retention(),
            block: default_block_retention(),
        }
    }
}

/// Publish coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct PublishingConfig {
    /// Refuse drafts whose base version is older than the latest version
    /// (a warning is logged otherwise)
    #[serde(default)]
    pub reject_stale_base: bool,
}

/// Audit log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuditConfig {
    /// Maximum entries kept in memory
    #[serde(default = "default_audit_max_entries")]
    pub max_entries: usize,
}

const fn default_audit_max_entries() -> usize {
    10_000
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_entries: default_audit_max_entries(),
        }
    }
}

/// Publish scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Tick interval in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Maximum number of pending jobs
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_max_jobs() -> usize {
    1000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_jobs: default_max_jobs(),
        }
    }
}
