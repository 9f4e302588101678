//! Descriptor properties: the `key=value` file clients poll to resume.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDateTime, TimeZone, Utc};

use repoindex_core::error::Result;

use crate::fsutil::write_atomic;

/// Common prefix of every publication file.
pub const INDEX_FILE_PREFIX: &str = "nexus-maven-repository-index";

/// Descriptor as published into the target directory.
pub const INDEX_REMOTE_PROPERTIES_FILE: &str = "nexus-maven-repository-index.properties";

/// Authoritative sidecar kept next to the index directory.
pub const INDEX_PACKER_PROPERTIES_FILE: &str = "nexus-maven-repository-index-packer.properties";

pub const INDEX_ID: &str = "nexus.index.id";
pub const INDEX_TIMESTAMP: &str = "nexus.index.timestamp";
pub const INDEX_LEGACY_TIMESTAMP: &str = "nexus.index.legacy-timestamp";
pub const INDEX_CHAIN_ID: &str = "nexus.index.chain-id";
pub const INDEX_CHUNK_COUNTER: &str = "nexus.index.chunk-counter";
pub const INDEX_CHUNK_PREFIX: &str = "nexus.index.incremental-chunk-";
pub const INDEX_CREATORS: &str = "nexus.index.creators";

/// GMT timestamp layout used throughout the descriptor.
pub const INDEX_TIME_FORMAT: &str = "%Y%m%d%H%M%S%.3f";

pub fn format_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format(INDEX_TIME_FORMAT).to_string())
        .unwrap_or_default()
}

pub fn parse_timestamp(value: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(value, INDEX_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexProperties {
    entries: BTreeMap<String, String>,
}

impl IndexProperties {
    pub fn new() -> IndexProperties {
        IndexProperties::default()
    }

    /// Read UTF-8 `key=value` lines; `#` comments and blanks are ignored.
    pub fn load(path: &Path) -> Result<IndexProperties> {
        let contents = std::fs::read_to_string(path)?;
        let mut entries = BTreeMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                entries.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Ok(IndexProperties { entries })
    }

    /// Atomic store: temp sibling plus rename, never a partial descriptor.
    pub fn store(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        write_atomic(path, out.as_bytes())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn timestamp_millis(&self) -> Option<i64> {
        parse_timestamp(self.get(INDEX_TIMESTAMP)?)
    }

    pub fn chunk_counter(&self) -> u32 {
        self.get(INDEX_CHUNK_COUNTER)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn set_chunk_counter(&mut self, counter: u32) {
        self.set(INDEX_CHUNK_COUNTER, counter.to_string());
    }

    /// Historical chunk markers, keyed by chunk number.
    pub fn chunk_markers(&self) -> BTreeMap<u32, String> {
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                let number = key.strip_prefix(INDEX_CHUNK_PREFIX)?.parse().ok()?;
                Some((number, value.clone()))
            })
            .collect()
    }
}
