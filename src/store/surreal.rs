//! SurrealDB-backed store.
//!
//! Records live in one SCHEMAFULL table keyed by record id. Distances are
//! computed in Rust over the fetched rows rather than with SurrealDB's vector
//! functions, so ranking matches [`super::MemoryStore`] exactly.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{check_dimension, rank_by_distance, IndexStore};
use crate::error::{Component, IndexError, Result};
use crate::models::{IndexRecord, Modality, SearchResult};

const TABLE: &str = "records";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordRow {
    key: String,
    path: String,
    modality: Modality,
    embedding: Vec<f32>,
    indexed_at: String,
    seq: u64,
}

impl RecordRow {
    fn new(record: &IndexRecord, seq: u64) -> Self {
        Self {
            key: record.id.clone(),
            path: record.path.clone(),
            modality: record.modality,
            embedding: record.embedding.clone(),
            indexed_at: format_timestamp(&record.indexed_at),
            seq,
        }
    }

    fn into_record(self) -> Result<IndexRecord> {
        let indexed_at = DateTime::parse_from_rfc3339(&self.indexed_at)
            .map_err(|e| IndexError::processing(Component::Store, e))?
            .with_timezone(&Utc);
        Ok(IndexRecord {
            id: self.key,
            path: self.path,
            modality: self.modality,
            embedding: self.embedding,
            indexed_at,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[derive(Debug, Deserialize)]
struct SeqRow {
    seq: u64,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: usize,
}

pub struct SurrealStore {
    db: Surreal<Db>,
    dimension: usize,
    initialized: AtomicBool,
    next_seq: AtomicU64,
    // Serializes lookup-then-write in upsert and delete.
    write_lock: Mutex<()>,
}

impl SurrealStore {
    /// Opens (or creates) a RocksDB-backed database at `path`.
    pub async fn open(path: &str, namespace: &str, database: &str, dimension: usize) -> Result<Self> {
        let db = Surreal::new::<RocksDb>(path).await?;
        db.use_ns(namespace).use_db(database).await?;
        info!("Opened SurrealDB at {}", path);
        Ok(Self::with_db(db, dimension))
    }

    /// Non-persistent database, mainly for tests.
    pub async fn in_memory(dimension: usize) -> Result<Self> {
        let db = Surreal::new::<Mem>(()).await?;
        db.use_ns("media").use_db("embeddings").await?;
        Ok(Self::with_db(db, dimension))
    }

    fn with_db(db: Surreal<Db>, dimension: usize) -> Self {
        Self {
            db,
            dimension,
            initialized: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(IndexError::NotInitialized)
        }
    }

    async fn get_row(&self, id: &str) -> Result<Option<RecordRow>> {
        let row: Option<RecordRow> = self.db.select((TABLE, id)).await?;
        Ok(row)
    }

    async fn rows_in_insertion_order(&self) -> Result<Vec<RecordRow>> {
        let rows: Vec<RecordRow> = self
            .db
            .query(format!("SELECT * FROM {TABLE} ORDER BY seq ASC"))
            .await?
            .take(0)?;
        Ok(rows)
    }
}

#[async_trait]
impl IndexStore for SurrealStore {
    async fn init(&self) -> Result<()> {
        self.db
            .query(format!(
                "
                DEFINE TABLE {TABLE} SCHEMAFULL;
                DEFINE FIELD key ON {TABLE} TYPE string;
                DEFINE FIELD path ON {TABLE} TYPE string;
                DEFINE FIELD modality ON {TABLE} TYPE string;
                DEFINE FIELD embedding ON {TABLE} TYPE array<float>;
                DEFINE FIELD indexed_at ON {TABLE} TYPE string;
                DEFINE FIELD seq ON {TABLE} TYPE int;

                DEFINE INDEX idx_path ON {TABLE} FIELDS path;
                DEFINE INDEX idx_seq ON {TABLE} FIELDS seq;
            "
            ))
            .await?
            .check()?;

        let last: Vec<SeqRow> = self
            .db
            .query(format!("SELECT seq FROM {TABLE} ORDER BY seq DESC LIMIT 1"))
            .await?
            .take(0)?;
        let next = last.first().map_or(0, |row| row.seq + 1);
        self.next_seq.store(next, Ordering::SeqCst);

        self.initialized.store(true, Ordering::Release);
        debug!(
            "SurrealStore initialized (dimension: {}, next seq: {})",
            self.dimension, next
        );
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, record: IndexRecord) -> Result<IndexRecord> {
        self.ensure_initialized()?;
        check_dimension(self.dimension, record.embedding.len())?;

        let _guard = self.write_lock.lock().await;
        let stored: Option<RecordRow> = match self.get_row(&record.id).await? {
            Some(mut row) => {
                row.embedding = record.embedding;
                row.indexed_at = format_timestamp(&record.indexed_at);
                debug!("Updating record {} ({})", row.key, row.path);
                self.db.update((TABLE, record.id.as_str())).content(row).await?
            }
            None => {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                debug!("Inserting record {} ({})", record.id, record.path);
                self.db
                    .create((TABLE, record.id.as_str()))
                    .content(RecordRow::new(&record, seq))
                    .await?
            }
        };

        stored
            .ok_or_else(|| {
                IndexError::processing(Component::Store, format!("no row returned for {}", record.id))
            })?
            .into_record()
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        self.ensure_initialized()?;
        check_dimension(self.dimension, query.len())?;

        let records = self
            .rows_in_insertion_order()
            .await?
            .into_iter()
            .map(RecordRow::into_record)
            .collect::<Result<Vec<_>>>()?;
        debug!("Scanning {} records", records.len());
        Ok(rank_by_distance(query, records, limit, threshold))
    }

    async fn list_all(&self) -> Result<Vec<IndexRecord>> {
        self.ensure_initialized()?;
        self.rows_in_insertion_order()
            .await?
            .into_iter()
            .map(RecordRow::into_record)
            .collect()
    }

    async fn get(&self, id: &str) -> Result<Option<IndexRecord>> {
        self.ensure_initialized()?;
        self.get_row(id).await?.map(RecordRow::into_record).transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.ensure_initialized()?;
        let _guard = self.write_lock.lock().await;
        if self.get_row(id).await?.is_none() {
            return Ok(false);
        }
        let _: Option<RecordRow> = self.db.delete((TABLE, id)).await?;
        debug!("Deleted record {}", id);
        Ok(true)
    }

    async fn count(&self) -> Result<usize> {
        self.ensure_initialized()?;
        let rows: Vec<CountRow> = self
            .db
            .query(format!("SELECT count() AS count FROM {TABLE} GROUP ALL"))
            .await?
            .take(0)?;
        Ok(rows.first().map_or(0, |row| row.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ready_store(dimension: usize) -> SurrealStore {
        let store = SurrealStore::in_memory(dimension).await.unwrap();
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn requires_init() {
        let store = SurrealStore::in_memory(2).await.unwrap();
        let record = IndexRecord::new("/a.txt", Modality::Text, vec![0.0, 1.0]);
        assert!(matches!(
            store.upsert(record).await,
            Err(IndexError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn upsert_replaces_embedding_under_same_id() {
        let store = ready_store(2).await;
        let first = store
            .upsert(IndexRecord::new("/a.txt", Modality::Text, vec![1.0, 0.0]))
            .await
            .unwrap();
        let second = store
            .upsert(IndexRecord::new("/a.txt", Modality::Text, vec![0.0, 1.0]))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get(&first.id).await.unwrap().unwrap();
        assert_eq!(stored.embedding, vec![0.0, 1.0]);
        assert_eq!(stored.indexed_at, second.indexed_at);
    }

    #[tokio::test]
    async fn search_ranks_and_normalizes() {
        let store = ready_store(2).await;
        store
            .upsert(IndexRecord::new("/far.png", Modality::Image, vec![3.0, 3.0]))
            .await
            .unwrap();
        store
            .upsert(IndexRecord::new("/exact.txt", Modality::Text, vec![0.5, 0.25]))
            .await
            .unwrap();

        let results = store.search(&[0.5, 0.25], 5, 0.5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.path, "/exact.txt");
        assert_eq!(results[0].record.modality, Modality::Text);
        assert_eq!(results[0].score, Some(1.0));
    }

    #[tokio::test]
    async fn delete_and_dimension_checks() {
        let store = ready_store(2).await;
        let stored = store
            .upsert(IndexRecord::new("/clip.mp4", Modality::Video, vec![0.1, 0.2]))
            .await
            .unwrap();

        assert!(matches!(
            store
                .upsert(IndexRecord::new("/bad.txt", Modality::Text, vec![0.1]))
                .await,
            Err(IndexError::DimensionMismatch { .. })
        ));

        assert!(store.delete(&stored.id).await.unwrap());
        assert!(!store.delete(&stored.id).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
