use std::sync::Arc;

use tracing::debug;

use crate::embedder::ModalityEmbedder;
use crate::error::Result;
use crate::models::SearchResult;
use crate::store::{IndexStore, DEFAULT_DISTANCE_THRESHOLD};

pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Answers free-text queries against the index.
pub struct Searcher {
    embedder: Arc<ModalityEmbedder>,
    store: Arc<dyn IndexStore>,
    threshold: f32,
}

impl Searcher {
    pub fn new(embedder: Arc<ModalityEmbedder>, store: Arc<dyn IndexStore>) -> Self {
        Self {
            embedder,
            store,
            threshold: DEFAULT_DISTANCE_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Either the complete ranked set (possibly empty) or an error.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let embedding = self.embedder.embed_query(query).await?;
        let results = self.store.search(&embedding, limit, self.threshold).await?;
        debug!("Query {:?} matched {} records", query, results.len());
        Ok(results)
    }
}
