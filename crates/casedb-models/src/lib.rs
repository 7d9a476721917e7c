//! Model backends: the candle XLM-RoBERTa embedder and NLI classifier, plus
//! deterministic fakes for tests and offline development.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use casedb_core::config::{expand_path, ModelSettings};
use casedb_core::traits::{Classifier, Embedder};

pub mod device;
pub mod embedding;
pub mod fake;
pub mod nli;
pub mod pool;
pub mod tokenize;

pub use embedding::EmbeddingModel;
pub use fake::{HashEmbedder, HeuristicNli};
pub use nli::{LabelOrder, NliModel};
pub use pool::masked_mean_l2;

pub const FAKE_EMBEDDING_DIM: usize = 1024;

fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn get_default_embedder(settings: &ModelSettings) -> Result<Arc<dyn Embedder>> {
    if env_flag("APP_USE_FAKE_EMBEDDINGS") {
        info!("using HashEmbedder");
        return Ok(Arc::new(HashEmbedder::new(FAKE_EMBEDDING_DIM)));
    }
    let dir = resolve_model_dir(settings.embedding_dir.as_deref(), "APP_MODEL_DIR", "bge-m3")?;
    Ok(Arc::new(EmbeddingModel::load(&dir, settings.max_len, settings.batch_size)?))
}

pub fn get_default_classifier(settings: &ModelSettings) -> Result<Arc<dyn Classifier>> {
    if env_flag("APP_USE_FAKE_NLI") {
        info!("using HeuristicNli");
        return Ok(Arc::new(HeuristicNli::new()));
    }
    let dir = resolve_model_dir(settings.nli_dir.as_deref(), "APP_NLI_MODEL_DIR", "xlm-roberta-large-xnli")?;
    Ok(Arc::new(NliModel::load(&dir, settings.max_len)?))
}

/// Configured directory first, then the env override, then `../models/<name>`
/// and `models/<name>` relative to the working directory.
fn resolve_model_dir(configured: Option<&str>, env_key: &str, name: &str) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = expand_path(dir);
        if p.exists() { return Ok(p); }
        return Err(anyhow!("configured model directory {} does not exist", p.display()));
    }
    if let Ok(dir) = std::env::var(env_key) {
        let p = expand_path(&dir);
        if p.exists() { info!(dir = %p.display(), "using {env_key}"); return Ok(p); }
    }
    for candidate in [Path::new("../models").join(name), Path::new("models").join(name)] {
        if candidate.exists() { return Ok(candidate); }
    }
    Err(anyhow!("Could not locate model directory for {name}"))
}
