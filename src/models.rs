use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IndexError;

/// Default embedding dimension shared by the text and vision models.
pub const DEFAULT_DIMENSION: usize = 768;

/// A file offered for indexing, as reported by a picker or the folder scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub locator: String,
    pub declared_type: Option<String>,
    pub name: String,
    pub size_bytes: Option<u64>,
}

impl FileDescriptor {
    pub fn new(locator: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            declared_type: None,
            name: name.into(),
            size_bytes: None,
        }
    }

    pub fn with_declared_type(mut self, declared_type: impl Into<String>) -> Self {
        self.declared_type = Some(declared_type.into());
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    /// Describes a directly selected file, guessing its MIME type from the
    /// extension the way a document picker reports one.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Self {
            locator: path.to_string_lossy().to_string(),
            declared_type: mime_guess::from_path(path).first().map(|m| m.to_string()),
            name,
            size_bytes: std::fs::metadata(path).ok().map(|m| m.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Video,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Video => "video",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub path: String,
    pub modality: Modality,
    pub embedding: Vec<f32>,
    pub indexed_at: DateTime<Utc>,
}

impl IndexRecord {
    /// Builds a record whose id is derived from the locator, so indexing the
    /// same path again replaces the earlier entry.
    pub fn new(path: impl Into<String>, modality: Modality, embedding: Vec<f32>) -> Self {
        let path = path.into();
        Self {
            id: record_id_for(&path),
            path,
            modality,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// Stable record id for a locator.
pub fn record_id_for(locator: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, locator.as_bytes())
        .simple()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub record: IndexRecord,
    pub distance: f32,
    pub score: Option<f32>,
}

/// Result of indexing one descriptor inside a batch.
#[derive(Debug)]
pub enum BatchOutcome {
    Success(IndexRecord),
    Failure { locator: String, error: IndexError },
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Success(_))
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            BatchOutcome::Success(_) => None,
            BatchOutcome::Failure { error, .. } => Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_are_stable_per_locator() {
        assert_eq!(record_id_for("/a/b.txt"), record_id_for("/a/b.txt"));
        assert_ne!(record_id_for("/a/b.txt"), record_id_for("/a/c.txt"));

        let first = IndexRecord::new("/a/b.txt", Modality::Text, vec![1.0]);
        let second = IndexRecord::new("/a/b.txt", Modality::Text, vec![2.0]);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = IndexRecord::new("/photos/cat.png", Modality::Image, vec![0.25, -0.5, 1.0]);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"modality\":\"image\""));
        let back: IndexRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn from_path_guesses_declared_type() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# hello").unwrap();

        let descriptor = FileDescriptor::from_path(&path);
        assert_eq!(descriptor.name, "notes.md");
        assert!(descriptor
            .declared_type
            .as_deref()
            .is_some_and(|t| t.starts_with("text/")));
        assert_eq!(descriptor.size_bytes, Some(7));
    }
}
