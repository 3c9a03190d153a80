//! Immutable version snapshots kept by the version ledgers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a single version record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Draft,
    Published,
    Archived,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One numbered snapshot of an entity.
///
/// Only `status`, `published_by` and `published_at` ever change after the
/// record is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord<S> {
    pub entity_id: Uuid,
    /// Starts at 1, strictly increasing per entity, never reused.
    pub version: u32,
    pub status: VersionStatus,
    pub snapshot: S,
    pub created_by: String,
    pub published_by: Option<String>,
    /// Version the author branched from. Advisory only.
    pub base_version: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl<S> VersionRecord<S> {
    pub fn is_draft(&self) -> bool {
        self.status == VersionStatus::Draft
    }

    pub fn is_published(&self) -> bool {
        self.status == VersionStatus::Published
    }
}
