//! Row models for the two collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored blob and its metadata. Never mutated after insert.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VaultFile {
    pub id: String,
    /// Original filename, display-only and not unique.
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Byte length of `data`.
    pub size: i64,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Unix epoch milliseconds, used for newest-first ordering.
    pub created_at: i64,
}

impl VaultFile {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.created_at)
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary::from(self)
    }
}

// Payloads can be large; keep them out of logs.
impl std::fmt::Debug for VaultFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultFile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Metadata view of a [`VaultFile`] without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: i64,
    pub created_at: i64,
}

impl From<&VaultFile> for FileSummary {
    fn from(file: &VaultFile) -> Self {
        Self {
            id: file.id.clone(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size,
            created_at: file.created_at,
        }
    }
}

/// Upload input. `id`, `size` and `created_at` are filled in by the store.
#[derive(Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl NewFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

impl std::fmt::Debug for NewFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A keyed singleton setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: serde_json::Value,
}
