//! Embedding persistence and nearest-neighbor search.
//!
//! Two backends implement [`IndexStore`]:
//! - [`MemoryStore`]: in-process, for tests and throwaway sessions
//! - [`SurrealStore`]: SurrealDB on RocksDB (or its in-memory engine)
//!
//! Both rank in Rust with [`rank_by_distance`], so results are identical
//! regardless of backend.

use async_trait::async_trait;

use crate::error::{IndexError, Result};
use crate::models::{IndexRecord, SearchResult};

mod memory;
mod surreal;

pub use memory::MemoryStore;
pub use surreal::SurrealStore;

/// Default maximum Euclidean distance for a match.
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 0.5;

#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Prepare the backend. Every other operation fails with
    /// `NotInitialized` until this has succeeded.
    async fn init(&self) -> Result<()>;

    fn dimension(&self) -> usize;

    /// Insert `record`, or replace the embedding and timestamp of the record
    /// already stored under its id. Returns the stored record.
    async fn upsert(&self, record: IndexRecord) -> Result<IndexRecord>;

    /// Records within `threshold` of `query`, closest first, at most `limit`.
    async fn search(&self, query: &[f32], limit: usize, threshold: f32)
        -> Result<Vec<SearchResult>>;

    /// All records in insertion order.
    async fn list_all(&self) -> Result<Vec<IndexRecord>>;

    async fn get(&self, id: &str) -> Result<Option<IndexRecord>>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn count(&self) -> Result<usize>;
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Maps a distance within `threshold` onto `[0, 1]`, 1 being identical.
/// No score exists when the threshold is not a positive finite number.
pub fn normalize_score(distance: f32, threshold: f32) -> Option<f32> {
    (threshold.is_finite() && threshold > 0.0).then(|| (1.0 - distance / threshold).max(0.0))
}

pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(IndexError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Ranks `candidates`, given in insertion order, against `query`. Ties in
/// distance keep insertion order.
pub fn rank_by_distance(
    query: &[f32],
    candidates: impl IntoIterator<Item = IndexRecord>,
    limit: usize,
    threshold: f32,
) -> Vec<SearchResult> {
    let mut matches: Vec<(f32, IndexRecord)> = candidates
        .into_iter()
        .map(|record| (euclidean_distance(query, &record.embedding), record))
        .filter(|(distance, _)| *distance <= threshold)
        .collect();

    // Stable sort, so equal distances stay in insertion order.
    matches.sort_by(|a, b| a.0.total_cmp(&b.0));
    matches.truncate(limit);

    matches
        .into_iter()
        .map(|(distance, record)| SearchResult {
            record,
            distance,
            score: normalize_score(distance, threshold),
        })
        .collect()
}
