//! Fabula operator CLI
//!
//! Deduplicates crawled fable corpora, indexes them into the vector store
//! and runs similarity queries against it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fabula::{
    default_store_path, load_corpus, write_records, DedupConfig, Deduplicator, DistanceMetric,
    Embedder, HashEmbedder, HttpEmbedder, HttpEmbedderConfig, IngestPipeline, Match,
    PipelineReport, QueryEngine, RawRecord, ScoringPolicy, StoreConfig, VectorStore,
    DEFAULT_COLLECTION,
};
use tracing::{info, warn, Level};

/// Characters of document text shown per query hit.
const PREVIEW_CHARS: usize = 150;

/// Dimensions of the offline hash embedder when `--dimensions` is absent.
const DEFAULT_HASH_DIMENSIONS: usize = 256;

fn default_db_path() -> PathBuf {
    default_store_path().unwrap_or_else(|| PathBuf::from(".").join("fabula").join("fabula.sqlite3"))
}

/// CLI arguments
#[derive(Parser)]
#[command(name = "fabula")]
#[command(about = "Deduplicate, index and search fable corpora")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file
    #[arg(long, env = "FABULA_DB", global = true)]
    db: Option<PathBuf>,

    /// Collection name
    #[arg(long, env = "FABULA_COLLECTION", default_value = DEFAULT_COLLECTION, global = true)]
    collection: String,

    /// Distance metric used when the collection is created
    #[arg(long, default_value = "cosine", global = true)]
    metric: DistanceMetric,

    /// Entries per store batch
    #[arg(long, default_value_t = 100, global = true)]
    batch_size: usize,

    /// Scoring policy override (JSON)
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = EmbedderKind::Hash, global = true)]
    embedder: EmbedderKind,

    /// Embedding dimensions
    #[arg(long, global = true)]
    dimensions: Option<usize>,

    /// Base URL of an OpenAI-compatible embedding API
    #[arg(long, env = "FABULA_EMBED_URL", default_value = "http://localhost:8080/v1", global = true)]
    embed_url: String,

    /// Embedding model name
    #[arg(long, env = "FABULA_EMBED_MODEL", default_value = "all-MiniLM-L6-v2", global = true)]
    embed_model: String,

    /// API key for the embedding endpoint
    #[arg(long, env = "FABULA_EMBED_API_KEY", hide_env_values = true, global = true)]
    embed_api_key: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Deduplicate a corpus file without touching the store
    Dedupe {
        /// Crawler output (JSON array, optionally .gz)
        #[arg(short, long)]
        input: PathBuf,
        /// Deduplicated corpus
        #[arg(short, long)]
        output: PathBuf,
        /// Removed-stories audit list
        #[arg(short, long, default_value = "removed_stories.txt")]
        removed: PathBuf,
    },
    /// Deduplicate a corpus and index it into the store
    Index {
        /// Crawler output (JSON array, optionally .gz)
        #[arg(short, long)]
        input: PathBuf,
        /// Delete existing entries before indexing
        #[arg(long)]
        recreate: bool,
        /// Index every valid record as-is
        #[arg(long)]
        skip_dedupe: bool,
    },
    /// Search the store for similar fables
    Query {
        /// Query text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Number of results
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
    },
    /// Write every stored entry as JSON lines
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show collection information
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    /// Offline feature hashing
    Hash,
    /// OpenAI-compatible HTTP endpoint
    Http,
}

impl Cli {
    fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::WARN
        } else {
            Level::INFO
        }
    }

    fn db_path(&self) -> PathBuf {
        self.db.clone().unwrap_or_else(default_db_path)
    }

    fn dedup_config(&self) -> Result<DedupConfig> {
        let mut config = DedupConfig::default();
        if let Some(path) = &self.policy {
            let file = File::open(path)
                .with_context(|| format!("failed to open policy {}", path.display()))?;
            let policy: ScoringPolicy = serde_json::from_reader(file)
                .with_context(|| format!("invalid policy {}", path.display()))?;
            config = config.with_policy(policy);
        }
        Ok(config)
    }

    fn store_config(&self) -> StoreConfig {
        StoreConfig::default()
            .with_collection(self.collection.clone())
            .with_metric(self.metric)
            .with_max_batch_size(self.batch_size)
    }

    fn build_embedder(&self) -> Result<Arc<dyn Embedder>> {
        Ok(match self.embedder {
            EmbedderKind::Hash => Arc::new(HashEmbedder::new(
                self.dimensions.unwrap_or(DEFAULT_HASH_DIMENSIONS),
            )?),
            EmbedderKind::Http => Arc::new(HttpEmbedder::new(HttpEmbedderConfig {
                base_url: self.embed_url.clone(),
                model: self.embed_model.clone(),
                api_key: self.embed_api_key.clone(),
                dimensions: self.dimensions,
                timeout: Duration::from_secs(60),
                ..HttpEmbedderConfig::default()
            })?),
        })
    }

    fn open_store(&self) -> Result<VectorStore> {
        let path = self.db_path();
        VectorStore::open(&path, self.store_config(), self.build_embedder()?)
            .with_context(|| format!("failed to open store {}", path.display()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Dedupe {
            input,
            output,
            removed,
        } => dedupe(&cli, input, output, removed),
        Commands::Index {
            input,
            recreate,
            skip_dedupe,
        } => index(&cli, input, *recreate, *skip_dedupe).map(drop),
        Commands::Query { text, limit } => query(&cli, &text.join(" "), *limit).map(drop),
        Commands::Export { output } => export(&cli, output),
        Commands::Status => status(&cli),
    }
}

fn dedupe(cli: &Cli, input: &Path, output: &Path, removed: &Path) -> Result<()> {
    let corpus =
        load_corpus(input).with_context(|| format!("failed to load {}", input.display()))?;
    let dedup = Deduplicator::new(cli.dedup_config()?)?;
    let report = dedup.run_corpus(corpus);

    let records: Vec<RawRecord> = report.records().cloned().collect();
    write_records(output, &records)
        .with_context(|| format!("failed to write {}", output.display()))?;

    let file = File::create(removed)
        .with_context(|| format!("failed to create {}", removed.display()))?;
    report.write_removed_list(BufWriter::new(file))?;

    let stats = &report.stats;
    println!("Original stories:   {}", stats.total_records);
    println!("Skipped (invalid):  {}", stats.skipped);
    println!("Unique stories:     {}", stats.unique);
    println!("Duplicates removed: {}", stats.duplicates_removed);
    if let (Some(min), Some(max), Some(mean)) = (stats.min_words, stats.max_words, stats.mean_words) {
        println!("Word count:         min {min}, max {max}, mean {mean:.1}");
    }
    info!(output = %output.display(), removed = %removed.display(), "dedup outputs written");
    Ok(())
}

/// Runs the ingest pipeline; `None` when an existing collection was left untouched.
fn index(
    cli: &Cli,
    input: &Path,
    recreate: bool,
    skip_dedupe: bool,
) -> Result<Option<PipelineReport>> {
    let mut store = cli.open_store()?;
    let existing = store.count()?;
    if existing > 0 {
        if !recreate {
            println!(
                "Collection '{}' already has {existing} entries; pass --recreate to rebuild it.",
                store.config().collection
            );
            store.close()?;
            return Ok(None);
        }
        info!(collection = %store.config().collection, existing, "recreating collection");
        store.recreate()?;
    }

    let corpus =
        load_corpus(input).with_context(|| format!("failed to load {}", input.display()))?;
    let mut pipeline = IngestPipeline::new(cli.dedup_config()?, store)?;
    let report = if skip_dedupe {
        pipeline.index_corpus(corpus)?
    } else {
        pipeline.run_corpus(corpus)?
    };
    let total = pipeline.store().count()?;
    pipeline.finish()?;

    println!(
        "Indexed {} fables ({} duplicates removed, {} skipped); collection holds {total}.",
        report.ids.len(),
        report.stats.duplicates_removed,
        report.stats.skipped
    );
    Ok(Some(report))
}

fn query(cli: &Cli, text: &str, limit: usize) -> Result<Vec<Match>> {
    let store = cli.open_store()?;
    let engine = QueryEngine::from_store(&store)?;
    if engine.is_empty() {
        warn!(
            collection = %store.config().collection,
            "collection is empty; run `fabula index` first"
        );
    }
    store.close()?;

    let hits = engine.query_text(text, limit)?;
    println!("Query: {text}");
    for (rank, hit) in hits.iter().enumerate() {
        let meta = &hit.entry.metadata;
        println!();
        println!("{}. {} [{}]", rank + 1, meta.title, hit.entry.id);
        println!("   distance: {:.4}  words: {}", hit.distance, meta.word_count);
        println!("   {}", preview(&hit.entry.document, PREVIEW_CHARS));
    }
    Ok(hits)
}

fn export(cli: &Cli, output: &Path) -> Result<()> {
    let store = cli.open_store()?;
    let entries = store.get_all()?;
    store.close()?;

    let file =
        File::create(output).with_context(|| format!("failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    for entry in &entries {
        serde_json::to_writer(&mut writer, entry)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    println!("Exported {} entries to {}", entries.len(), output.display());
    Ok(())
}

fn status(cli: &Cli) -> Result<()> {
    let store = cli.open_store()?;
    let config = store.config();
    println!("Database:   {}", cli.db_path().display());
    println!("Collection: {}", config.collection);
    println!("Metric:     {}", store.metric());
    match store.dimension() {
        Some(d) => println!("Dimension:  {d}"),
        None => println!("Dimension:  (unset)"),
    }
    println!("Entries:    {}", store.count()?);
    println!("Embedder:   {}", store.embedder().name());
    Ok(store.close()?)
}

/// First `max` characters of `text` on one line.
fn preview(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    }
}
