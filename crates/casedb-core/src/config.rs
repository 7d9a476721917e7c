//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Typed sections are extracted with [`Config::settings`]; every field has a
//! default so an empty environment still yields a usable configuration.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Configuration built from an explicit figment, used by tests and tools
    /// that assemble their own provider stack.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(self.figment.clone())
            .extract()
            .map_err(|e| Error::config("settings", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index: IndexSettings,
    pub search: SearchParams,
    pub stance: StanceSettings,
    pub models: ModelSettings,
    pub tfidf: TfIdfSettings,
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if self.search.rrf_k < 0.0 {
            return Err(Error::Config("search.rrf_k must be non-negative".into()));
        }
        if !(0.0..=1.0).contains(&self.stance.threshold) {
            return Err(Error::Config("stance.threshold must be within [0, 1]".into()));
        }
        if self.stance.max_tokens == 0 {
            return Err(Error::Config("stance.max_tokens must be positive".into()));
        }
        if self.index.keep_generations == 0 {
            return Err(Error::Config("index.keep_generations must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub dir: String,
    /// Train an IVF-PQ index once the vector table holds this many rows.
    pub ann_min_rows: usize,
    /// ANN hits at or below this inner product are left out of the ANN list.
    pub ann_min_similarity: f32,
    /// Committed generations kept on disk, the current one included.
    pub keep_generations: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { dir: "case_index".into(), ann_min_rows: 10_000, ann_min_similarity: 0.0, keep_generations: 2 }
    }
}

impl IndexSettings {
    pub fn dir_path(&self) -> PathBuf {
        expand_path(&self.dir)
    }
}

/// Knobs for one hybrid search call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub k_ann: usize,
    pub k_bm25: usize,
    pub topn: usize,
    pub rrf_k: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { k_ann: 200, k_bm25: 200, topn: 25, rrf_k: 60.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StanceSettings {
    /// Token budget per premise window.
    pub max_tokens: usize,
    pub threshold: f32,
    pub margin: f32,
    pub snippet_chars: usize,
    pub topk_retrieval: usize,
    pub topn_return: usize,
}

impl Default for StanceSettings {
    fn default() -> Self {
        Self { max_tokens: 450, threshold: 0.6, margin: 0.05, snippet_chars: 500, topk_retrieval: 80, topn_return: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub embedding_dir: Option<String>,
    pub nli_dir: Option<String>,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self { embedding_dir: None, nli_dir: None, max_len: 512, batch_size: 16 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TfIdfSettings {
    /// Terms must occur in at least this many documents.
    pub min_df: usize,
    /// Terms occurring in more than this fraction of documents are dropped.
    pub max_df: f32,
    pub bigrams: bool,
}

impl Default for TfIdfSettings {
    fn default() -> Self {
        Self { min_df: 2, max_df: 0.9, bigrams: true }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
