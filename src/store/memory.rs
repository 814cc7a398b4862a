use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{check_dimension, rank_by_distance, IndexStore};
use crate::error::{IndexError, Result};
use crate::models::{IndexRecord, SearchResult};

#[derive(Default)]
struct Entries {
    next_seq: u64,
    by_id: HashMap<String, (u64, IndexRecord)>,
}

impl Entries {
    fn in_insertion_order(&self) -> Vec<IndexRecord> {
        let mut entries: Vec<&(u64, IndexRecord)> = self.by_id.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, record)| record.clone()).collect()
    }
}

/// In-memory store. Brute-force search; nothing survives the process.
pub struct MemoryStore {
    dimension: usize,
    entries: RwLock<Entries>,
    initialized: AtomicBool,
}

impl MemoryStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(Entries::default()),
            initialized: AtomicBool::new(false),
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(IndexError::NotInitialized)
        }
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn init(&self) -> Result<()> {
        self.initialized.store(true, Ordering::Release);
        debug!("MemoryStore initialized (dimension: {})", self.dimension);
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, record: IndexRecord) -> Result<IndexRecord> {
        self.ensure_initialized()?;
        check_dimension(self.dimension, record.embedding.len())?;

        // One write lock covers lookup and write, so same-id upserts cannot tear.
        let mut entries = self.entries.write().await;
        if let Some((_, existing)) = entries.by_id.get_mut(&record.id) {
            existing.embedding = record.embedding;
            existing.indexed_at = record.indexed_at;
            debug!("Updated record {} ({})", existing.id, existing.path);
            return Ok(existing.clone());
        }

        let seq = entries.next_seq;
        entries.next_seq += 1;
        debug!("Inserted record {} ({})", record.id, record.path);
        entries
            .by_id
            .insert(record.id.clone(), (seq, record.clone()));
        Ok(record)
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        self.ensure_initialized()?;
        check_dimension(self.dimension, query.len())?;

        let entries = self.entries.read().await;
        Ok(rank_by_distance(
            query,
            entries.in_insertion_order(),
            limit,
            threshold,
        ))
    }

    async fn list_all(&self) -> Result<Vec<IndexRecord>> {
        self.ensure_initialized()?;
        Ok(self.entries.read().await.in_insertion_order())
    }

    async fn get(&self, id: &str) -> Result<Option<IndexRecord>> {
        self.ensure_initialized()?;
        let entries = self.entries.read().await;
        Ok(entries.by_id.get(id).map(|(_, record)| record.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.ensure_initialized()?;
        let removed = self.entries.write().await.by_id.remove(id).is_some();
        debug!("Delete {}: {}", id, removed);
        Ok(removed)
    }

    async fn count(&self) -> Result<usize> {
        self.ensure_initialized()?;
        Ok(self.entries.read().await.by_id.len())
    }
}
