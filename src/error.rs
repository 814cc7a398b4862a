use std::fmt;

use thiserror::Error;

use crate::models::Modality;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Classifier,
    Chunker,
    Aggregator,
    ContentAccess,
    Embedder,
    Preprocessor,
    FrameExtractor,
    Scanner,
    Store,
    Indexer,
    Search,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::Classifier => "classifier",
            Component::Chunker => "chunker",
            Component::Aggregator => "aggregator",
            Component::ContentAccess => "content access",
            Component::Embedder => "embedder",
            Component::Preprocessor => "image preprocessor",
            Component::FrameExtractor => "frame extractor",
            Component::Scanner => "folder scanner",
            Component::Store => "index store",
            Component::Indexer => "indexer",
            Component::Search => "search",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("No usable text content in {0}")]
    NoContent(String),
    #[error("No video frames could be processed for {locator} ({attempted} attempted)")]
    NoFramesProcessed { locator: String, attempted: usize },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Index store is not initialized")]
    NotInitialized,
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Cannot aggregate an empty set of embeddings")]
    EmptyInput,
    #[error("No {0} embedding path is configured")]
    ModalityUnavailable(Modality),
    #[error("{component} failed: {source}")]
    Processing {
        component: Component,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// Wraps a lower-layer failure, tagging it with the stage it came from.
    pub fn processing(
        component: Component,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        IndexError::Processing {
            component,
            source: source.into(),
        }
    }

    pub fn component(&self) -> Component {
        match self {
            IndexError::UnsupportedType(_) => Component::Classifier,
            IndexError::NoContent(_) | IndexError::NoFramesProcessed { .. } => {
                Component::Embedder
            }
            IndexError::ModalityUnavailable(_) => Component::Embedder,
            IndexError::NotFound(_) | IndexError::Io(_) => Component::ContentAccess,
            IndexError::NotInitialized
            | IndexError::DimensionMismatch { .. }
            | IndexError::Database(_) => Component::Store,
            IndexError::EmptyInput => Component::Aggregator,
            IndexError::Processing { component, .. } => *component,
        }
    }
}
