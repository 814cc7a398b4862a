//! Collaborator interfaces the pipeline depends on, plus the bundled
//! implementations.
//!
//! - [`ContentAccess`]: read file content by locator
//! - [`TextEmbedder`] / [`VisionEmbedder`]: the embedding functions
//! - [`ImagePreprocessor`]: decode an image into a normalized pixel tensor
//! - [`FrameExtractor`]: pull still frames out of a video
//!
//! Embedders are constructed once and shared through `Arc`, never through
//! process-wide state.

use async_trait::async_trait;

use crate::error::{Component, IndexError, Result};

mod clip;
mod fastembed_text;
mod ffmpeg;
mod fs;
mod hashing;

pub use self::clip::{ClipPreprocessor, IMAGE_SIZE};
pub use self::fastembed_text::{FastEmbedText, DEFAULT_TEXT_MODEL};
pub use self::ffmpeg::FfmpegFrameExtractor;
pub use self::fs::FsContentAccess;
pub use self::hashing::HashingEmbedder;

/// Runs CPU-bound work on tokio's blocking pool. A panic inside `work` comes
/// back as a `Processing` error tagged with `component`.
pub(crate) async fn run_blocking<T, F>(component: Component, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| IndexError::processing(component, e))?
}

/// A channels-first (CHW) float image ready for a vision model.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTensor {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl PixelTensor {
    pub fn shape(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

#[async_trait]
pub trait ContentAccess: Send + Sync {
    /// Full text content. Fails with `NotFound` for an invalid locator.
    async fn read_text(&self, locator: &str) -> Result<String>;

    async fn read_bytes(&self, locator: &str) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait TextEmbedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait VisionEmbedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed(&self, pixels: &PixelTensor) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait ImagePreprocessor: Send + Sync {
    /// Decode and normalize the image at `locator` into a 3×224×224 tensor.
    async fn preprocess(&self, locator: &str) -> Result<PixelTensor>;
}

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Length of the video in milliseconds, when it can be determined.
    async fn duration_ms(&self, locator: &str) -> Option<u64>;

    /// Extracts the frame nearest `timestamp_ms` and returns an image locator.
    async fn extract_frame(&self, locator: &str, timestamp_ms: u64) -> Result<String>;

    /// Called once the caller is done with an extracted frame.
    async fn release(&self, _frame: &str) {}
}
