use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persisted description of one generation; `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub embedding_model_id: String,
    pub doc_count: usize,
    pub vector_dim: usize,
    pub generation: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub dir: PathBuf,
    pub generation: u64,
    pub doc_count: usize,
    pub vector_dim: usize,
    pub embedding_model_id: String,
    pub ann_indexed: bool,
    pub created_at: DateTime<Utc>,
}
