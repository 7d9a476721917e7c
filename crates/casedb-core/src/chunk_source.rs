//! Reads already-chunked case text from JSON-lines files.
//!
//! Each non-empty line is either a single chunk or a case bundle:
//!
//! ```text
//! {"ChunkID": "...", "Content": "...", "Title": "..."}
//! {"base": {"Identifier": "...", "Title": "..."}, "chunks": [{"ChunkID": "...", "Content": "..."}]}
//! ```
//!
//! Bundle chunks inherit the bundle's base metadata via [`ChunkMeta::overlay`].
//! Lines that parse as neither are counted and skipped.

use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::types::{Chunk, ChunkMeta};

#[derive(Deserialize)]
struct CaseBundle {
    #[serde(default)]
    base: ChunkMeta,
    chunks: Vec<Chunk>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Line {
    Bundle(CaseBundle),
    Chunk(Chunk),
}

#[derive(Debug, Default)]
pub struct LoadedChunks {
    pub chunks: Vec<Chunk>,
    pub files: usize,
    /// Lines that were neither a chunk nor a bundle.
    pub malformed: usize,
}

/// Lists `*.jsonl` files under `root` (or `root` itself when it is a file), sorted.
pub fn list_chunk_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("jsonl"))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

pub fn read_chunk_file(path: &Path, out: &mut LoadedChunks) -> anyhow::Result<()> {
    let reader = BufReader::new(File::open(path)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Line>(&line) {
            Ok(Line::Chunk(chunk)) => out.chunks.push(chunk),
            Ok(Line::Bundle(bundle)) => {
                for mut chunk in bundle.chunks {
                    chunk.meta = chunk.meta.overlay(&bundle.base);
                    out.chunks.push(chunk);
                }
            }
            Err(e) => {
                warn!(file = %path.display(), line = lineno + 1, error = %e, "skipping malformed chunk line");
                out.malformed += 1;
            }
        }
    }
    out.files += 1;
    Ok(())
}

pub fn load_chunks(root: &Path) -> anyhow::Result<LoadedChunks> {
    let mut out = LoadedChunks::default();
    for file in list_chunk_files(root) {
        read_chunk_file(&file, &mut out)?;
    }
    Ok(out)
}
