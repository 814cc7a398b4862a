use std::path::Path;

use crate::models::{FileDescriptor, Modality};

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "rtf"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];

/// Picks the embedding path for a file. The declared content type wins when it
/// names a supported family; otherwise the extension decides. `None` means the
/// file must be rejected.
pub fn classify(descriptor: &FileDescriptor) -> Option<Modality> {
    descriptor
        .declared_type
        .as_deref()
        .and_then(modality_for_content_type)
        .or_else(|| modality_for_name(&descriptor.name))
}

pub fn modality_for_content_type(content_type: &str) -> Option<Modality> {
    let content_type = content_type.trim().to_ascii_lowercase();
    if content_type.starts_with("text/") {
        Some(Modality::Text)
    } else if content_type.starts_with("image/") {
        Some(Modality::Image)
    } else if content_type.starts_with("video/") {
        Some(Modality::Video)
    } else {
        None
    }
}

pub fn modality_for_name(name: &str) -> Option<Modality> {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())?
        .to_lowercase();

    match extension.as_str() {
        ext if TEXT_EXTENSIONS.contains(&ext) => Some(Modality::Text),
        ext if IMAGE_EXTENSIONS.contains(&ext) => Some(Modality::Image),
        ext if VIDEO_EXTENSIONS.contains(&ext) => Some(Modality::Video),
        _ => None,
    }
}
