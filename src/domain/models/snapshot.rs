//! Snapshot payloads stored by each entity family's ledger.
//!
//! The ledger treats snapshots as opaque; the only rules here are the
//! intent checks each domain service runs before it writes a draft.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Editorial content (articles, posts).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentSnapshot {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl ContentSnapshot {
    pub fn new(title: &str, slug: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            slug: slug.to_string(),
            body: body.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Content title cannot be empty".to_string());
        }
        if self.slug.trim().is_empty() {
            return Err("Content slug cannot be empty".to_string());
        }
        if self.slug.chars().any(char::is_whitespace) {
            return Err(format!("Content slug '{}' cannot contain whitespace", self.slug));
        }
        Ok(())
    }
}

/// A routable page composed of block references.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub blocks: Vec<Uuid>,
}

impl PageSnapshot {
    pub fn new(title: &str, path: &str) -> Self {
        Self {
            title: title.to_string(),
            path: path.to_string(),
            template: String::new(),
            blocks: Vec::new(),
        }
    }

    pub fn with_block(mut self, block_id: Uuid) -> Self {
        self.blocks.push(block_id);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Page title cannot be empty".to_string());
        }
        if !self.path.starts_with('/') {
            return Err(format!("Page path '{}' must start with '/'", self.path));
        }
        Ok(())
    }
}

/// A reusable block of structured data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl BlockSnapshot {
    pub fn new(kind: &str, data: serde_json::Value) -> Self {
        Self {
            kind: kind.to_string(),
            data,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.kind.trim().is_empty() {
            return Err("Block kind cannot be empty".to_string());
        }
        Ok(())
    }
}
