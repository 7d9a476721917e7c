use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use casedb_core::chunk_source::{list_chunk_files, read_chunk_file, LoadedChunks};
use casedb_core::config::{Config, Settings};
use casedb_core::{AbortSignal, Error, Result};
use casedb_hybrid::{HybridIndex, SharedIndex};
use casedb_models::{get_default_classifier, get_default_embedder};
use casedb_pipeline::{HybridRetriever, Retriever, StancePipeline, TermFrequencyRetriever};
use casedb_stance::StanceClassifier;

/// Hybrid search and stance classification over arbitration case chunks.
#[derive(Parser, Debug)]
#[command(name = "casedb", version, about = "Case chunk index: ingest, search, stance")]
struct Cli {
    /// Index directory; overrides `index.dir` from the configuration.
    #[arg(long, global = true, env = "CASEDB_INDEX_DIR")]
    index_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a fresh index from chunk files (replaces any existing index).
    Ingest {
        /// A `.jsonl` file or a directory searched recursively for them.
        path: PathBuf,
    },
    /// Append chunks not yet indexed.
    Add {
        path: PathBuf,
    },
    /// Hybrid search.
    Search {
        query: String,
        #[arg(short = 'n', long)]
        topn: Option<usize>,
        #[arg(long)]
        k_ann: Option<usize>,
        #[arg(long)]
        k_bm25: Option<usize>,
        #[arg(long)]
        rrf_k: Option<f64>,
    },
    /// Retrieve candidates for an issue and bucket them by stance.
    Stance {
        /// Retrieval query describing the issue.
        #[arg(long)]
        issue: String,
        /// Hypothesis the candidates are judged against.
        #[arg(long)]
        stance: String,
        /// Rank these chunk files with TF-IDF instead of the persisted index.
        #[arg(long)]
        chunks: Option<PathBuf>,
        #[arg(long)]
        topk: Option<usize>,
        #[arg(long)]
        topn: Option<usize>,
    },
    /// Show the committed generation of the index.
    Status,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(out) => {
            println!("{}", serde_json::to_string_pretty(&out).unwrap_or_else(|_| out.to_string()));
            ExitCode::SUCCESS
        }
        Err(err) => {
            let report = json!({ "error": err.report() });
            eprintln!("{report}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Value> {
    let config = Config::load().map_err(|e| Error::config("load configuration", e))?;
    let mut settings = config.settings()?;
    if let Some(dir) = cli.index_dir {
        settings.index.dir = dir.to_string_lossy().into_owned();
    }
    let dir = settings.index.dir_path();

    match cli.command {
        Commands::Ingest { path } => {
            let loaded = load_chunk_files(&path)?;
            let embedder = get_default_embedder(&settings.models).map_err(Error::model)?;
            let index: HybridIndex = HybridIndex::build(&dir, loaded.chunks, embedder, &settings.index)?;
            Ok(json!({ "files": loaded.files, "malformed_lines": loaded.malformed, "status": index.status() }))
        }
        Commands::Add { path } => {
            let loaded = load_chunk_files(&path)?;
            let mut index = open_index(&dir, &settings)?;
            let added = index.add_chunks(loaded.chunks)?;
            Ok(json!({ "added": added, "malformed_lines": loaded.malformed, "status": index.status() }))
        }
        Commands::Search { query, topn, k_ann, k_bm25, rrf_k } => {
            let mut params = settings.search;
            params.topn = topn.unwrap_or(params.topn);
            params.k_ann = k_ann.unwrap_or(params.k_ann);
            params.k_bm25 = k_bm25.unwrap_or(params.k_bm25);
            params.rrf_k = rrf_k.unwrap_or(params.rrf_k);
            let index = open_index(&dir, &settings)?;
            let hits = index.search(&query, &params)?;
            Ok(json!({ "query": query, "hits": hits }))
        }
        Commands::Stance { issue, stance, chunks, topk, topn } => {
            let mut stance_settings = settings.stance.clone();
            stance_settings.topk_retrieval = topk.unwrap_or(stance_settings.topk_retrieval);
            stance_settings.topn_return = topn.unwrap_or(stance_settings.topn_return);

            let retriever: Box<dyn Retriever> = match chunks {
                Some(path) => Box::new(TermFrequencyRetriever::new(load_chunk_files(&path)?.chunks, &settings.tfidf)),
                None => {
                    let index = SharedIndex::new(open_index(&dir, &settings)?);
                    Box::new(HybridRetriever::new(index, settings.search))
                }
            };
            let backend = get_default_classifier(&settings.models).map_err(Error::model)?;
            let pipeline = StancePipeline::new(retriever, StanceClassifier::new(backend, stance_settings));
            let buckets = pipeline.run(&issue, &stance, &AbortSignal::new())?;
            Ok(json!({ "issue": issue, "stance": stance, "buckets": buckets }))
        }
        Commands::Status => {
            let index = open_index(&dir, &settings)?;
            Ok(serde_json::to_value(index.status()).map_err(|e| Error::config("status", e))?)
        }
    }
}

fn open_index(dir: &Path, settings: &Settings) -> Result<HybridIndex> {
    let embedder = get_default_embedder(&settings.models).map_err(Error::model)?;
    HybridIndex::load(dir, embedder, &settings.index)
}

fn load_chunk_files(path: &Path) -> Result<LoadedChunks> {
    if !path.exists() {
        return Err(Error::Config(format!("{} does not exist", path.display())));
    }
    let files = list_chunk_files(path);
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    let mut loaded = LoadedChunks::default();
    for file in &files {
        pb.set_message(file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
        read_chunk_file(file, &mut loaded).map_err(|e| Error::config(&format!("read {}", file.display()), e))?;
        pb.inc(1);
    }
    pb.finish_and_clear();
    info!(files = loaded.files, chunks = loaded.chunks.len(), malformed = loaded.malformed, "chunk files read");
    Ok(loaded)
}
