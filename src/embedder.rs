//! Per-modality embedding.
//!
//! Text is chunked and each non-blank chunk embedded, then the chunk vectors
//! are averaged. Images go through the preprocessor and the vision model once.
//! Videos are sampled at evenly spaced timestamps; every frame attempt is kept
//! as a `Result`, and only the successful ones are averaged.

use std::sync::Arc;

use tracing::debug;

use crate::aggregate::mean_embedding;
use crate::chunker::{ContentChunker, DEFAULT_MAX_CHUNK_LEN};
use crate::error::{IndexError, Result};
use crate::models::{FileDescriptor, Modality};
use crate::providers::{
    ClipPreprocessor, ContentAccess, FrameExtractor, ImagePreprocessor, TextEmbedder,
    VisionEmbedder,
};

pub const DEFAULT_VIDEO_FRAMES: usize = 10;
pub const DEFAULT_FALLBACK_DURATION_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedOptions {
    pub max_chunk_len: usize,
    pub video_frames: usize,
    pub fallback_duration_ms: u64,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            video_frames: DEFAULT_VIDEO_FRAMES,
            fallback_duration_ms: DEFAULT_FALLBACK_DURATION_MS,
        }
    }
}

pub struct ModalityEmbedder {
    access: Arc<dyn ContentAccess>,
    text: Arc<dyn TextEmbedder>,
    vision: Option<Arc<dyn VisionEmbedder>>,
    preprocessor: Arc<dyn ImagePreprocessor>,
    frames: Option<Arc<dyn FrameExtractor>>,
    options: EmbedOptions,
}

impl ModalityEmbedder {
    /// Text-only embedder. Image and video need [`Self::with_vision`], and
    /// video also [`Self::with_frame_extractor`].
    pub fn new(access: Arc<dyn ContentAccess>, text: Arc<dyn TextEmbedder>) -> Self {
        Self {
            access,
            text,
            vision: None,
            preprocessor: Arc::new(ClipPreprocessor::new()),
            frames: None,
            options: EmbedOptions::default(),
        }
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionEmbedder>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn ImagePreprocessor>) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_frame_extractor(mut self, frames: Arc<dyn FrameExtractor>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn with_options(mut self, options: EmbedOptions) -> Self {
        self.options = options;
        self
    }

    /// Dimension of every vector this embedder produces.
    pub fn dimension(&self) -> usize {
        self.text.dimension()
    }

    pub async fn embed(&self, descriptor: &FileDescriptor, modality: Modality) -> Result<Vec<f32>> {
        let locator = descriptor.locator.as_str();
        debug!("Embedding {} as {}", locator, modality);

        match modality {
            Modality::Text => {
                let text = self.access.read_text(locator).await?;
                self.embed_text(locator, &text).await
            }
            Modality::Image => self.embed_image(locator).await,
            Modality::Video => self.embed_video(locator).await,
        }
    }

    /// Embeds free text (a search query) through the text path.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed_text("query", query).await
    }

    async fn embed_text(&self, label: &str, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = Vec::new();
        for chunk in ContentChunker::new(text, self.options.max_chunk_len) {
            if chunk.trim().is_empty() {
                continue;
            }
            let embedding = self.text.embed(chunk).await?;
            embeddings.push(self.checked(embedding)?);
        }

        if embeddings.is_empty() {
            return Err(IndexError::NoContent(label.to_string()));
        }

        debug!("Embedded {} text chunk(s) for {}", embeddings.len(), label);
        mean_embedding(embeddings)
    }

    async fn embed_image(&self, locator: &str) -> Result<Vec<f32>> {
        let vision = self
            .vision
            .as_ref()
            .ok_or(IndexError::ModalityUnavailable(Modality::Image))?;

        let pixels = self.preprocessor.preprocess(locator).await?;
        let embedding = vision.embed(&pixels).await?;
        self.checked(embedding)
    }

    async fn embed_video(&self, locator: &str) -> Result<Vec<f32>> {
        let unavailable = || IndexError::ModalityUnavailable(Modality::Video);
        let vision = self.vision.as_ref().ok_or_else(unavailable)?;
        let frames = self.frames.as_ref().ok_or_else(unavailable)?;

        let duration_ms = match frames.duration_ms(locator).await {
            Some(ms) if ms > 0 => ms,
            _ => self.options.fallback_duration_ms,
        };

        let mut attempts = Vec::with_capacity(self.options.video_frames);
        for timestamp_ms in frame_timestamps(duration_ms, self.options.video_frames) {
            let attempt = self
                .embed_frame(frames.as_ref(), vision.as_ref(), locator, timestamp_ms)
                .await;
            if let Err(e) = &attempt {
                debug!("Skipping frame at {} ms of {}: {}", timestamp_ms, locator, e);
            }
            attempts.push(attempt);
        }

        let attempted = attempts.len();
        let embedded: Vec<Vec<f32>> = attempts.into_iter().filter_map(Result::ok).collect();
        if embedded.is_empty() {
            return Err(IndexError::NoFramesProcessed {
                locator: locator.to_string(),
                attempted,
            });
        }

        debug!(
            "Embedded {}/{} frames of {}",
            embedded.len(),
            attempted,
            locator
        );
        mean_embedding(embedded)
    }

    async fn embed_frame(
        &self,
        frames: &dyn FrameExtractor,
        vision: &dyn VisionEmbedder,
        locator: &str,
        timestamp_ms: u64,
    ) -> Result<Vec<f32>> {
        let frame = frames.extract_frame(locator, timestamp_ms).await?;
        let result = match self.preprocessor.preprocess(&frame).await {
            Ok(pixels) => vision.embed(&pixels).await,
            Err(e) => Err(e),
        };
        frames.release(&frame).await;
        self.checked(result?)
    }

    fn checked(&self, embedding: Vec<f32>) -> Result<Vec<f32>> {
        let expected = self.dimension();
        if embedding.len() != expected {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }
}

/// `count` timestamps spread evenly from the start of the video.
pub fn frame_timestamps(duration_ms: u64, count: usize) -> Vec<u64> {
    let count = count as u128;
    let duration = u128::from(duration_ms);
    // i < count, so each result is below duration_ms and fits back into u64.
    (0..count).map(|i| (duration * i / count) as u64).collect()
}
