use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use super::FrameExtractor;
use crate::error::{Component, IndexError, Result};

/// Extracts frames by shelling out to `ffmpeg`; durations come from `ffprobe`.
/// Frames are written into a private temporary directory that lives as long
/// as the extractor.
pub struct FfmpegFrameExtractor {
    ffmpeg: String,
    ffprobe: String,
    frames_dir: TempDir,
    next_frame: AtomicU64,
}

impl FfmpegFrameExtractor {
    pub fn new() -> Result<Self> {
        Self::with_binaries("ffmpeg", "ffprobe")
    }

    pub fn with_binaries(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Result<Self> {
        Ok(Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            frames_dir: TempDir::new()?,
            next_frame: AtomicU64::new(0),
        })
    }

    fn next_frame_path(&self) -> PathBuf {
        let n = self.next_frame.fetch_add(1, Ordering::Relaxed);
        self.frames_dir.path().join(format!("frame-{n}.jpg"))
    }
}

/// Longest duration taken at face value; corrupt containers can report
/// absurd lengths.
const MAX_DURATION_MS: u64 = 7 * 24 * 60 * 60 * 1000;

fn duration_from_seconds(seconds: f64) -> Option<u64> {
    if !(seconds.is_finite() && seconds > 0.0) {
        return None;
    }
    let ms = (seconds * 1000.0).min(MAX_DURATION_MS as f64);
    Some(ms as u64)
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn duration_ms(&self, locator: &str) -> Option<u64> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                locator,
            ])
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let seconds: f64 = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
        duration_from_seconds(seconds)
    }

    async fn extract_frame(&self, locator: &str, timestamp_ms: u64) -> Result<String> {
        let frame_path = self.next_frame_path();
        let seek = format!("{:.3}", timestamp_ms as f64 / 1000.0);

        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-y", "-ss", &seek, "-i", locator])
            .args(["-frames:v", "1", "-q:v", "2"])
            .arg(&frame_path)
            .output()
            .await
            .map_err(|e| IndexError::processing(Component::FrameExtractor, e))?;

        if !output.status.success() {
            return Err(IndexError::processing(
                Component::FrameExtractor,
                format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        // Seeking past the end exits cleanly without writing a frame.
        if !tokio::fs::try_exists(&frame_path).await.unwrap_or(false) {
            return Err(IndexError::processing(
                Component::FrameExtractor,
                format!("no frame at {timestamp_ms} ms"),
            ));
        }

        debug!("Extracted frame at {} ms from {}", timestamp_ms, locator);
        Ok(frame_path.to_string_lossy().to_string())
    }

    async fn release(&self, frame: &str) {
        let _ = tokio::fs::remove_file(frame).await;
    }
}
