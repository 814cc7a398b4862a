//! Deterministic collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::embedder::ModalityEmbedder;
use crate::error::{Component, IndexError, Result};
use crate::providers::{
    ContentAccess, FrameExtractor, ImagePreprocessor, PixelTensor, TextEmbedder, VisionEmbedder,
};

/// Text content keyed by locator.
#[derive(Default)]
pub struct MemoryContent {
    files: HashMap<String, String>,
}

impl MemoryContent {
    pub fn with(mut self, locator: &str, text: &str) -> Self {
        self.files.insert(locator.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl ContentAccess for MemoryContent {
    async fn read_text(&self, locator: &str) -> Result<String> {
        self.files
            .get(locator)
            .cloned()
            .ok_or_else(|| IndexError::NotFound(locator.to_string()))
    }

    async fn read_bytes(&self, locator: &str) -> Result<Vec<u8>> {
        self.read_text(locator).await.map(String::into_bytes)
    }
}

/// Embeds a text as `[char count, 0, 0, ...]` and counts calls.
pub struct LengthEmbedder {
    pub dimension: usize,
    pub calls: AtomicUsize,
}

impl LengthEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextEmbedder for LengthEmbedder {
    fn model_name(&self) -> &str {
        "length"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut vector = vec![0.0; self.dimension];
        vector[0] = text.chars().count() as f32;
        Ok(vector)
    }
}

/// Turns a locator ending in `@<number>` into a 1×1×1 tensor holding that
/// number; fails for locators containing `corrupt`.
pub struct StubPreprocessor;

#[async_trait]
impl ImagePreprocessor for StubPreprocessor {
    async fn preprocess(&self, locator: &str) -> Result<PixelTensor> {
        if locator.contains("corrupt") {
            return Err(IndexError::processing(
                Component::Preprocessor,
                "cannot decode image",
            ));
        }
        let value = locator
            .rsplit_once('@')
            .and_then(|(_, n)| n.parse::<f32>().ok())
            .unwrap_or(1.0);
        Ok(PixelTensor {
            channels: 1,
            height: 1,
            width: 1,
            data: vec![value],
        })
    }
}

/// Returns the first tensor value repeated across every dimension.
pub struct EchoVision {
    pub dimension: usize,
}

#[async_trait]
impl VisionEmbedder for EchoVision {
    fn model_name(&self) -> &str {
        "echo"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, pixels: &PixelTensor) -> Result<Vec<f32>> {
        Ok(vec![pixels.data[0]; self.dimension])
    }
}

/// Frame extractor whose frames are `<locator>@<timestamp>`; extraction fails
/// at the listed timestamps.
pub struct ScriptedFrames {
    pub duration_ms: Option<u64>,
    pub failing_at: Vec<u64>,
    pub requested: Mutex<Vec<u64>>,
    pub released: Mutex<Vec<String>>,
}

impl ScriptedFrames {
    pub fn new(duration_ms: Option<u64>, failing_at: Vec<u64>) -> Self {
        Self {
            duration_ms,
            failing_at,
            requested: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FrameExtractor for ScriptedFrames {
    async fn duration_ms(&self, _locator: &str) -> Option<u64> {
        self.duration_ms
    }

    async fn extract_frame(&self, locator: &str, timestamp_ms: u64) -> Result<String> {
        self.requested.lock().unwrap().push(timestamp_ms);
        if self.failing_at.contains(&timestamp_ms) {
            return Err(IndexError::processing(
                Component::FrameExtractor,
                format!("no frame at {timestamp_ms}"),
            ));
        }
        Ok(format!("{locator}@{timestamp_ms}"))
    }

    async fn release(&self, frame: &str) {
        self.released.lock().unwrap().push(frame.to_string());
    }
}

/// Embedder wired with all-stub collaborators over the given text files.
pub fn stub_embedder(content: MemoryContent, dimension: usize) -> ModalityEmbedder {
    ModalityEmbedder::new(Arc::new(content), Arc::new(LengthEmbedder::new(dimension)))
        .with_vision(Arc::new(EchoVision { dimension }))
        .with_preprocessor(Arc::new(StubPreprocessor))
        .with_frame_extractor(Arc::new(ScriptedFrames::new(Some(10_000), vec![])))
}
