//! Versioned entities and the families they belong to.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The entity families that share the lifecycle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityFamily {
    Content,
    Page,
    Block,
}

impl EntityFamily {
    pub const ALL: [EntityFamily; 3] = [Self::Content, Self::Page, Self::Block];

    /// Workflow entity type registered for this family.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Page => "page",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for EntityFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "content" => Ok(Self::Content),
            "page" => Ok(Self::Page),
            "block" => Ok(Self::Block),
            other => Err(format!("Unknown entity family: {other}")),
        }
    }
}

/// The persisted lifecycle pointers of an entity.
///
/// The version ledger is the source of truth for version statuses; the
/// publish coordinator keeps these fields in step with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: Uuid,
    pub family: EntityFamily,
    /// External workflow status (`draft`, `published`, `archived`, ...).
    pub status: String,
    /// Highest version number allocated, 0 before the first draft.
    pub current_version: u32,
    pub published_version: Option<u32>,
    /// Shared across pages. Only meaningful for blocks.
    #[serde(default)]
    pub global: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn new(
        family: EntityFamily,
        initial_status: &str,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            family,
            status: initial_status.to_string(),
            current_version: 0,
            published_version: None,
            global: false,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_published(&self) -> bool {
        self.published_version.is_some()
    }
}

/// Filter for listing entities.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub family: Option<EntityFamily>,
    pub status: Option<String>,
    pub global: Option<bool>,
}

impl EntityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_family(mut self, family: EntityFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.trim().to_lowercase());
        self
    }

    pub fn with_global(mut self, global: bool) -> Self {
        self.global = Some(global);
        self
    }

    pub fn matches(&self, entity: &EntityRecord) -> bool {
        if let Some(family) = self.family {
            if entity.family != family {
                return false;
            }
        }

        if let Some(ref status) = self.status {
            if &entity.status != status {
                return false;
            }
        }

        if let Some(global) = self.global {
            if entity.global != global {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_parse() {
        assert_eq!("Page".parse::<EntityFamily>(), Ok(EntityFamily::Page));
        assert!("widget".parse::<EntityFamily>().is_err());
    }

    #[test]
    fn test_filter_matches() {
        let mut block = EntityRecord::new(EntityFamily::Block, "draft", "alice", Utc::now());
        block.global = true;

        assert!(EntityFilter::new().matches(&block));
        assert!(EntityFilter::new()
            .with_family(EntityFamily::Block)
            .with_global(true)
            .matches(&block));
        assert!(!EntityFilter::new()
            .with_family(EntityFamily::Page)
            .matches(&block));
        assert!(!EntityFilter::new().with_status("Published").matches(&block));
    }
}
