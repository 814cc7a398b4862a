//! Configuration loading.
//!
//! Read from `~/.config/media-embeddings/config.toml` unless a path is given;
//! a missing file means defaults. Every section and field is optional.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::chunker::DEFAULT_MAX_CHUNK_LEN;
use crate::embedder::{EmbedOptions, DEFAULT_FALLBACK_DURATION_MS, DEFAULT_VIDEO_FRAMES};
use crate::models::DEFAULT_DIMENSION;
use crate::providers::DEFAULT_TEXT_MODEL;
use crate::search::DEFAULT_SEARCH_LIMIT;
use crate::store::DEFAULT_DISTANCE_THRESHOLD;

const APP_DIR: &str = "media-embeddings";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub video: VideoConfig,
    pub search: SearchConfig,
    pub indexing: IndexingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// RocksDB directory
    pub path: PathBuf,
    pub namespace: String,
    pub database: String,
    /// Keep everything in memory; nothing is persisted
    pub in_memory: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("db"),
            namespace: "media".to_string(),
            database: "embeddings".to_string(),
            in_memory: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// fastembed model name, or "hashing" for the offline embedder
    pub text_model: String,
    pub dimension: usize,
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chunk_len: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub frames: usize,
    pub fallback_duration_ms: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frames: DEFAULT_VIDEO_FRAMES,
            fallback_duration_ms: DEFAULT_FALLBACK_DURATION_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub limit: usize,
    pub distance_threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Files embedded concurrently; 1 keeps batches strictly sequential
    pub workers: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads `path`, or the default location when `None`. Only an explicit
    /// path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_path(), false),
        };

        if !path.exists() {
            if required {
                bail!("config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            bail!("embedding.dimension must be greater than 0");
        }
        let threshold = self.search.distance_threshold;
        if !(threshold.is_finite() && threshold > 0.0) {
            bail!("search.distance_threshold must be a positive number, got {threshold}");
        }
        if self.video.frames == 0 {
            bail!("video.frames must be greater than 0");
        }
        if self.indexing.workers == 0 {
            bail!("indexing.workers must be greater than 0");
        }
        if self.chunking.max_chunk_len == 0 {
            bail!("chunking.max_chunk_len must be greater than 0");
        }
        Ok(())
    }

    pub fn embed_options(&self) -> EmbedOptions {
        EmbedOptions {
            max_chunk_len: self.chunking.max_chunk_len,
            video_frames: self.video.frames,
            fallback_duration_ms: self.video.fallback_duration_ms,
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
