use std::io::ErrorKind;

use async_trait::async_trait;
use tracing::debug;

use super::ContentAccess;
use crate::error::{IndexError, Result};

/// Reads content straight from the local filesystem; locators are paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsContentAccess;

impl FsContentAccess {
    pub fn new() -> Self {
        Self
    }
}

fn map_io(locator: &str, err: std::io::Error) -> IndexError {
    match err.kind() {
        ErrorKind::NotFound => IndexError::NotFound(locator.to_string()),
        _ => IndexError::Io(err),
    }
}

#[async_trait]
impl ContentAccess for FsContentAccess {
    async fn read_text(&self, locator: &str) -> Result<String> {
        let bytes = self.read_bytes(locator).await?;
        // Stray invalid bytes should not make a whole document unindexable.
        Ok(String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
    }

    async fn read_bytes(&self, locator: &str) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(locator)
            .await
            .map_err(|e| map_io(locator, e))?;
        debug!("Read {} bytes from {}", bytes.len(), locator);
        Ok(bytes)
    }
}
