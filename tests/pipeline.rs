use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use media_embeddings::providers::{FsContentAccess, HashingEmbedder, PixelTensor, VisionEmbedder};
use media_embeddings::{
    BatchOutcome, FileDescriptor, FolderScanner, IndexError, IndexStore, Indexer, MemoryStore,
    Modality, ModalityEmbedder, Searcher, SurrealStore,
};

const DIM: usize = 64;

/// Per-channel means of the tensor, zero-padded.
struct ChannelMeans;

#[async_trait]
impl VisionEmbedder for ChannelMeans {
    fn model_name(&self) -> &str {
        "channel-means"
    }

    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed(&self, pixels: &PixelTensor) -> media_embeddings::Result<Vec<f32>> {
        let plane = pixels.height * pixels.width;
        let mut vector = vec![0.0; DIM];
        for (c, channel) in pixels.data.chunks(plane).enumerate().take(DIM) {
            vector[c] = channel.iter().sum::<f32>() / plane as f32;
        }
        Ok(vector)
    }
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn write_png(root: &Path, relative: &str, color: [u8; 3]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::RgbImage::from_pixel(32, 16, image::Rgb(color))
        .save(path)
        .unwrap();
}

fn corpus() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "notes/rust.md", "Ownership and borrowing in Rust");
    write(dir.path(), "notes/cooking.txt", "Slow roasted tomatoes with garlic");
    write(dir.path(), "notes/empty.txt", "   \n\n  ");
    write(dir.path(), "bin/blob.exe", "MZ");
    write_png(dir.path(), "photos/red.png", [255, 0, 0]);
    dir
}

fn embedder() -> Arc<ModalityEmbedder> {
    Arc::new(
        ModalityEmbedder::new(Arc::new(FsContentAccess::new()), Arc::new(HashingEmbedder::new(DIM)))
            .with_vision(Arc::new(ChannelMeans)),
    )
}

async fn index_and_search(store: Arc<dyn IndexStore>) {
    let dir = corpus();
    let embedder = embedder();

    let mut scan_reports = Vec::new();
    let mut report = |n: usize| scan_reports.push(n);
    let files = FolderScanner::new().scan(dir.path(), Some(&mut report));
    assert_eq!(files.len(), 4);
    assert_eq!(scan_reports, vec![4]);

    let indexer = Indexer::new(embedder.clone(), store.clone());
    let outcomes = indexer.index_batch(&files, &mut |_, _| {}).await;
    assert_eq!(outcomes.len(), 4);

    let failures: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            BatchOutcome::Failure { locator, error } => Some((locator.as_str(), error)),
            BatchOutcome::Success(_) => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].0.ends_with("empty.txt"));
    assert!(matches!(failures[0].1, IndexError::NoContent(_)));
    assert_eq!(store.count().await.unwrap(), 3);

    let image = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.modality == Modality::Image)
        .unwrap();
    assert!(image.path.ends_with("red.png"));
    assert_eq!(image.embedding.len(), DIM);

    let searcher = Searcher::new(embedder, store.clone());
    let results = searcher
        .search("ownership and BORROWING in rust", 10)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].record.path.ends_with("rust.md"));
    assert_eq!(results[0].score, Some(1.0));

    assert!(searcher.search("quantum chromodynamics", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn memory_store_pipeline() {
    let store = Arc::new(MemoryStore::new(DIM));
    store.init().await.unwrap();
    index_and_search(store).await;
}

#[tokio::test]
async fn surreal_store_pipeline() {
    let store = Arc::new(SurrealStore::in_memory(DIM).await.unwrap());
    store.init().await.unwrap();
    index_and_search(store).await;
}

#[tokio::test]
async fn reindexing_a_changed_file_replaces_its_embedding() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "doc.txt", "first draft about sailing");
    let store = Arc::new(MemoryStore::new(DIM));
    store.init().await.unwrap();
    let indexer = Indexer::new(embedder(), store.clone());

    let descriptor = FileDescriptor::from_path(&dir.path().join("doc.txt"));
    let first = indexer.index_one(&descriptor).await.unwrap();
    write(dir.path(), "doc.txt", "final version about mountains");
    let second = indexer.index_one(&descriptor).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_ne!(first.embedding, second.embedding);
    let all = store.list_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].embedding, second.embedding);
}

#[tokio::test]
async fn batch_with_unsupported_and_missing_files() {
    let dir = corpus();
    let store = Arc::new(MemoryStore::new(DIM));
    store.init().await.unwrap();
    let indexer = Indexer::new(embedder(), store.clone());

    let descriptors = vec![
        FileDescriptor::from_path(&dir.path().join("notes/rust.md")),
        FileDescriptor::from_path(&dir.path().join("bin/blob.exe")),
        FileDescriptor::from_path(&dir.path().join("notes/gone.txt")),
        FileDescriptor::from_path(&dir.path().join("notes/cooking.txt")),
    ];

    let mut progress = Vec::new();
    let outcomes = indexer
        .index_batch_concurrent(&descriptors, 3, &mut |done, total| progress.push((done, total)))
        .await;

    assert!(outcomes[0].is_success());
    assert!(matches!(
        &outcomes[1],
        BatchOutcome::Failure {
            error: IndexError::UnsupportedType(_),
            ..
        }
    ));
    assert!(matches!(
        &outcomes[2],
        BatchOutcome::Failure {
            error: IndexError::NotFound(_),
            ..
        }
    ));
    assert!(outcomes[3].is_success());
    assert_eq!(progress, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    assert_eq!(store.count().await.unwrap(), 2);
}
