use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::classify::classify;
use crate::models::FileDescriptor;

/// Progress is reported after this many newly found files.
pub const PROGRESS_EVERY: usize = 10;

/// Walks a directory tree depth-first and collects every supported file.
///
/// Unreadable directories are logged and skipped along with their subtree;
/// the walk always carries on with the siblings.
#[derive(Debug, Clone, Default)]
pub struct FolderScanner {
    follow_links: bool,
}

impl FolderScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// `progress` receives the running count of supported files: after every
    /// [`PROGRESS_EVERY`]th one, and once more when the walk finishes.
    pub fn scan(
        &self,
        root: &Path,
        progress: Option<&mut dyn FnMut(usize)>,
    ) -> Vec<FileDescriptor> {
        self.walk(root, progress).found
    }

    fn walk(&self, root: &Path, mut progress: Option<&mut dyn FnMut(usize)>) -> Walk {
        info!("Scanning {}", root.display());
        let mut found = Vec::new();
        let mut skipped = 0;

        let walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| root.display().to_string(), |p| p.display().to_string());
                    warn!("Skipping unreadable entry {}: {}", path, e);
                    skipped += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let descriptor = FileDescriptor {
                locator: entry.path().to_string_lossy().to_string(),
                declared_type: None,
                name: entry.file_name().to_string_lossy().to_string(),
                size_bytes: entry.metadata().ok().map(|m| m.len()),
            };

            if classify(&descriptor).is_none() {
                debug!("Ignoring unsupported file {}", descriptor.locator);
                continue;
            }

            found.push(descriptor);
            if found.len() % PROGRESS_EVERY == 0 {
                if let Some(report) = progress.as_deref_mut() {
                    report(found.len());
                }
            }
        }

        if let Some(report) = progress.as_deref_mut() {
            report(found.len());
        }

        info!(
            "Found {} supported files under {} ({} entries skipped)",
            found.len(),
            root.display(),
            skipped
        );
        Walk { found, skipped }
    }
}

struct Walk {
    found: Vec<FileDescriptor>,
    skipped: usize,
}
