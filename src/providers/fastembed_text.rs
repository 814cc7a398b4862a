//! Text embeddings through fastembed.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use super::{run_blocking, TextEmbedder};
use crate::error::{Component, IndexError, Result};

/// Default model; its 768-dimension space is shared with nomic-embed-vision.
pub const DEFAULT_TEXT_MODEL: &str = "nomic-embed-text-v1.5";

pub struct FastEmbedText {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedText {
    /// Loads `model_name`, downloading it into `cache_dir` on first use.
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
        let model_enum = parse_model_name(model_name)?;

        let mut options = InitOptions::new(model_enum).with_show_download_progress(true);
        if let Some(dir) = cache_dir {
            std::fs::create_dir_all(&dir)?;
            options = options.with_cache_dir(dir);
        }

        let model = TextEmbedding::try_new(options)
            .map_err(|e| IndexError::processing(Component::Embedder, e))?;

        let probe = model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| IndexError::processing(Component::Embedder, e))?;
        let dimension = probe.first().map(Vec::len).ok_or_else(|| {
            IndexError::processing(Component::Embedder, "model returned no embedding")
        })?;

        info!("Loaded text model {} ({} dimensions)", model_name, dimension);

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

fn parse_model_name(name: &str) -> Result<EmbeddingModel> {
    match name.to_lowercase().as_str() {
        "nomic-embed-text-v1.5" | "nomic-ai/nomic-embed-text-v1.5" => {
            Ok(EmbeddingModel::NomicEmbedTextV15)
        }
        "bge-base-en-v1.5" | "baai/bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            Ok(EmbeddingModel::AllMiniLML6V2)
        }
        other => Err(IndexError::processing(
            Component::Embedder,
            format!("unknown text model: {other}"),
        )),
    }
}

#[async_trait]
impl TextEmbedder for FastEmbedText {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        // ONNX inference is CPU-bound.
        run_blocking(Component::Embedder, move || {
            let mut embeddings = model
                .embed(vec![text], None)
                .map_err(|e| IndexError::processing(Component::Embedder, e))?;
            embeddings.pop().ok_or_else(|| {
                IndexError::processing(Component::Embedder, "empty embedding result")
            })
        })
        .await
    }
}
