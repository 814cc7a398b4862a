use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use media_embeddings::config::{config_path, Config};
use media_embeddings::models::record_id_for;
use media_embeddings::providers::{FastEmbedText, FsContentAccess, HashingEmbedder, TextEmbedder};
use media_embeddings::{
    BatchOutcome, FileDescriptor, FolderScanner, IndexStore, Indexer, ModalityEmbedder,
    SearchResult, Searcher, SurrealStore,
};

/// Offline text model name; needs no download.
const HASHING_MODEL: &str = "hashing";

#[derive(Parser)]
#[command(name = "media-embeddings")]
#[command(about = "Index text, images and videos and search them with free text")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/media-embeddings/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index files; directories are scanned recursively
    Index {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Files embedded concurrently
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Search the index with free text
    Search {
        query: String,

        /// Maximum results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Maximum Euclidean distance for a match
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every indexed record
    List,

    /// Remove a record by id or by the path it was indexed from
    Delete { id: String },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default config file location
    Path,
}

#[derive(Serialize)]
struct SearchHit<'a> {
    id: &'a str,
    path: &'a str,
    modality: String,
    distance: f32,
    score: Option<f32>,
}

impl<'a> From<&'a SearchResult> for SearchHit<'a> {
    fn from(result: &'a SearchResult) -> Self {
        Self {
            id: &result.record.id,
            path: &result.record.path,
            modality: result.record.modality.to_string(),
            distance: result.distance,
            score: result.score,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Index { paths, workers } => {
            let workers = workers.unwrap_or(config.indexing.workers);
            if workers == 0 {
                bail!("--workers must be greater than 0");
            }
            index(&config, &paths, workers).await
        }
        Commands::Search {
            query,
            limit,
            threshold,
            json,
        } => {
            let limit = limit.unwrap_or(config.search.limit);
            let threshold = threshold.unwrap_or(config.search.distance_threshold);
            search(&config, &query, limit, threshold, json).await
        }
        Commands::List => list(&config).await,
        Commands::Delete { id } => delete(&config, &id).await,
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => print!("{}", config.to_toml()?),
                ConfigAction::Path => println!("{}", config_path().display()),
            }
            Ok(())
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_store(config: &Config) -> Result<Arc<dyn IndexStore>> {
    let dimension = config.embedding.dimension;
    let store = if config.database.in_memory {
        warn!("Using an in-memory database; nothing will be persisted");
        SurrealStore::in_memory(dimension).await?
    } else {
        let path = &config.database.path;
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create database directory {}", path.display()))?;
        SurrealStore::open(
            &path.to_string_lossy(),
            &config.database.namespace,
            &config.database.database,
            dimension,
        )
        .await
        .context("Failed to open database")?
    };
    store.init().await.context("Failed to initialize database")?;
    Ok(Arc::new(store))
}

fn build_embedder(config: &Config) -> Result<Arc<ModalityEmbedder>> {
    let text: Arc<dyn TextEmbedder> = if config.embedding.text_model == HASHING_MODEL {
        Arc::new(HashingEmbedder::new(config.embedding.dimension))
    } else {
        Arc::new(
            FastEmbedText::new(
                &config.embedding.text_model,
                config.embedding.cache_dir.clone(),
            )
            .context("Failed to load text model")?,
        )
    };

    if text.dimension() != config.embedding.dimension {
        bail!(
            "model {} produces {}-dimension vectors but embedding.dimension is {}",
            text.model_name(),
            text.dimension(),
            config.embedding.dimension
        );
    }

    // No vision model ships with the binary, so image and video files are
    // reported as unavailable per item and no frame extractor is needed.
    let embedder = ModalityEmbedder::new(Arc::new(FsContentAccess::new()), text)
        .with_options(config.embed_options());
    Ok(Arc::new(embedder))
}

fn collect_descriptors(paths: &[PathBuf]) -> Vec<FileDescriptor> {
    let scanner = FolderScanner::new();
    let mut descriptors = Vec::new();

    for path in paths.iter().map(|p| absolute(p)) {
        if path.is_dir() {
            let mut report = |found: usize| debug!("{} supported files found so far", found);
            descriptors.extend(scanner.scan(&path, Some(&mut report)));
        } else if path.is_file() {
            descriptors.push(FileDescriptor::from_path(&path));
        } else {
            warn!("Skipping {}: no such file or directory", path.display());
        }
    }
    descriptors
}

async fn index(config: &Config, paths: &[PathBuf], workers: usize) -> Result<()> {
    let descriptors = collect_descriptors(paths);
    if descriptors.is_empty() {
        println!("Nothing to index.");
        return Ok(());
    }

    let embedder = build_embedder(config)?;
    let store = open_store(config).await?;
    let indexer = Indexer::new(embedder, store);

    info!("Indexing {} files with {} workers", descriptors.len(), workers);
    let mut progress = |done: usize, total: usize| eprint!("\rIndexed {done}/{total}");
    let outcomes = if workers > 1 {
        indexer
            .index_batch_concurrent(&descriptors, workers, &mut progress)
            .await
    } else {
        indexer.index_batch(&descriptors, &mut progress).await
    };
    eprintln!();

    let mut failed = 0;
    for outcome in &outcomes {
        if let BatchOutcome::Failure { locator, error } = outcome {
            failed += 1;
            println!("FAILED {locator}: {error}");
        }
    }
    println!(
        "Indexed {} of {} files ({} failed).",
        outcomes.len() - failed,
        outcomes.len(),
        failed
    );
    Ok(())
}

async fn search(
    config: &Config,
    query: &str,
    limit: usize,
    threshold: f32,
    json: bool,
) -> Result<()> {
    let embedder = build_embedder(config)?;
    let store = open_store(config).await?;
    let searcher = Searcher::new(embedder, store).with_threshold(threshold);
    debug!(
        "Searching for {:?} (limit {}, distance threshold {})",
        query,
        limit,
        searcher.threshold()
    );

    let results = searcher.search(query, limit).await?;

    if json {
        let hits: Vec<SearchHit> = results.iter().map(SearchHit::from).collect();
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let score = result
            .score
            .map_or_else(|| "-".to_string(), |s| format!("{s:.4}"));
        println!("{}. [{}] {}", i + 1, result.record.modality, result.record.path);
        println!("   Distance: {:.4}  Score: {}", result.distance, score);
    }
    Ok(())
}

async fn list(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let records = store.list_all().await?;
    if records.is_empty() {
        println!("Index is empty.");
        return Ok(());
    }
    for record in &records {
        println!(
            "{}  {:<5}  {}  {}",
            record.id,
            record.modality,
            record.indexed_at.format("%Y-%m-%d %H:%M:%S"),
            record.path
        );
    }
    println!("{} records", records.len());
    Ok(())
}

async fn delete(config: &Config, id_or_path: &str) -> Result<()> {
    let store = open_store(config).await?;

    let locator = absolute(Path::new(id_or_path));
    let removed = store.delete(id_or_path).await?
        || store
            .delete(&record_id_for(&locator.to_string_lossy()))
            .await?;

    if removed {
        println!("Deleted {id_or_path}");
        Ok(())
    } else {
        bail!("no record found for {id_or_path}")
    }
}

/// Absolute form of a user-supplied path, so records are keyed the same way
/// regardless of the working directory.
fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
