//! On-disk layout and commit protocol.
//!
//! ```text
//! <dir>/CURRENT              name of the committed generation, e.g. "gen-00000003"
//! <dir>/gen-00000003/
//!     meta.jsonl             one chunk record per line, append-only
//!     row_order.json         ChunkId per row
//!     tokens.json            tokenized content per row
//!     config.json            IndexConfig
//!     vectors/               LanceDB database
//! ```
//!
//! A mutation stages a complete new generation directory, fsyncs it, then
//! atomically replaces `CURRENT`. Readers only ever open the generation named
//! by `CURRENT`, so they see either the old or the new state. Leftovers of an
//! interrupted mutation are removed by the next writer, never by a reader.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CURRENT_FILE: &str = "CURRENT";
pub const META_FILE: &str = "meta.jsonl";
pub const ROW_ORDER_FILE: &str = "row_order.json";
pub const TOKENS_FILE: &str = "tokens.json";
pub const CONFIG_FILE: &str = "config.json";
pub const VECTORS_DIR: &str = "vectors";

const GEN_PREFIX: &str = "gen-";

pub fn generation_name(generation: u64) -> String {
    format!("{GEN_PREFIX}{generation:08}")
}

pub fn generation_dir(dir: &Path, generation: u64) -> PathBuf {
    dir.join(generation_name(generation))
}

fn parse_generation(name: &str) -> Option<u64> {
    name.strip_prefix(GEN_PREFIX)?.parse().ok()
}

/// Committed generation, or `None` when no index has been committed in `dir`.
pub fn read_current(dir: &Path) -> Result<Option<u64>> {
    let path = dir.join(CURRENT_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let generation = parse_generation(raw.trim())
        .with_context(|| format!("{} does not name a generation: {:?}", path.display(), raw.trim()))?;
    Ok(Some(generation))
}

/// Atomically point `CURRENT` at `generation`.
pub fn write_current(dir: &Path, generation: u64) -> Result<()> {
    let tmp = dir.join(format!("{CURRENT_FILE}.tmp"));
    {
        let mut f = File::create(&tmp)?;
        f.write_all(generation_name(generation).as_bytes())?;
        f.write_all(b"\n")?;
        f.sync_all()?;
    }
    fs::rename(&tmp, dir.join(CURRENT_FILE))?;
    // The rename is the commit; a failed directory sync only weakens durability.
    if let Err(e) = sync_dir(dir) {
        warn!(dir = %dir.display(), error = %e, "fsync of index directory failed after commit");
    }
    Ok(())
}

/// Generation directories present in `dir`, ascending.
pub fn list_generations(dir: &Path) -> Result<Vec<u64>> {
    let mut gens = Vec::new();
    if !dir.exists() {
        return Ok(gens);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(g) = entry.file_name().to_str().and_then(parse_generation) {
            gens.push(g);
        }
    }
    gens.sort_unstable();
    Ok(gens)
}

/// Remove generations newer than the committed one: leftovers of a mutation
/// that never reached its commit.
pub fn remove_uncommitted(dir: &Path, current: Option<u64>) -> Result<()> {
    for g in list_generations(dir)? {
        if current.map_or(true, |c| g > c) {
            warn!(generation = g, "removing uncommitted generation");
            fs::remove_dir_all(generation_dir(dir, g))?;
        }
    }
    Ok(())
}

/// Keep the `keep` newest committed generations (the current one included).
/// Failures are logged, not returned: the commit has already happened.
pub fn prune_generations(dir: &Path, current: u64, keep: usize) {
    let gens = match list_generations(dir) {
        Ok(gens) => gens,
        Err(e) => {
            warn!(error = %e, "listing generations for pruning failed");
            return;
        }
    };
    let oldest_kept = current.saturating_sub(keep.saturating_sub(1) as u64);
    for g in gens.into_iter().filter(|g| *g < oldest_kept) {
        match fs::remove_dir_all(generation_dir(dir, g)) {
            Ok(()) => debug!(generation = g, "pruned generation"),
            Err(e) => warn!(generation = g, error = %e, "pruning generation failed"),
        }
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer(&mut w, value)?;
    w.flush()?;
    w.get_ref().sync_all()?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parse {}", path.display()))
}

/// Recursive copy of a directory tree.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| format!("copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// fsync every file and directory under `root`.
pub fn sync_tree(root: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            sync_dir(entry.path())?;
        } else {
            File::open(entry.path())?.sync_all()?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_pointer_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(read_current(tmp.path()).unwrap(), None);
        write_current(tmp.path(), 7).unwrap();
        assert_eq!(read_current(tmp.path()).unwrap(), Some(7));
        assert!(!tmp.path().join("CURRENT.tmp").exists());

        fs::write(tmp.path().join(CURRENT_FILE), "garbage").unwrap();
        assert!(read_current(tmp.path()).is_err());
    }

    #[test]
    fn cleanup_and_pruning() {
        let tmp = tempfile::tempdir().unwrap();
        for g in 1..=5 {
            fs::create_dir_all(generation_dir(tmp.path(), g)).unwrap();
        }
        fs::create_dir_all(tmp.path().join("unrelated")).unwrap();

        remove_uncommitted(tmp.path(), Some(4)).unwrap();
        assert_eq!(list_generations(tmp.path()).unwrap(), [1, 2, 3, 4]);

        prune_generations(tmp.path(), 4, 2);
        assert_eq!(list_generations(tmp.path()).unwrap(), [3, 4]);
        assert!(tmp.path().join("unrelated").exists());

        remove_uncommitted(tmp.path(), None).unwrap();
        assert!(list_generations(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn copy_dir_preserves_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("a/b/f.txt"), "x").unwrap();
        fs::write(src.join("top"), "y").unwrap();
        let dst = tmp.path().join("dst");
        copy_dir(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("a/b/f.txt")).unwrap(), "x");
        assert_eq!(fs::read_to_string(dst.join("top")).unwrap(), "y");
    }
}
