use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use casedb_core::types::{Chunk, ChunkId};

/// Append-only JSON-lines log of chunk records with an in-memory offset table.
///
/// Only offsets are held in memory; [`MetaLog::get`] seeks and parses one line.
#[derive(Debug, Clone)]
pub struct MetaLog {
    path: PathBuf,
    offsets: HashMap<ChunkId, (u64, u64)>,
    end: u64,
}

impl MetaLog {
    /// Start an empty log at `path`, truncating anything already there.
    pub fn create(path: &Path) -> Result<Self> {
        File::create(path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self { path: path.to_path_buf(), offsets: HashMap::new(), end: 0 })
    }

    /// Scan an existing log once to rebuild the offset table.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut reader = BufReader::new(file);
        let mut offsets = HashMap::new();
        let mut offset = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line)? as u64;
            if n == 0 {
                break;
            }
            let body = line.trim_end_matches(['\n', '\r']);
            if !body.is_empty() {
                let chunk: Chunk = serde_json::from_str(body)
                    .with_context(|| format!("{} at byte {offset}", path.display()))?;
                if offsets.insert(chunk.chunk_id, (offset, body.len() as u64)).is_some() {
                    bail!("{} holds a duplicate record at byte {offset}", path.display());
                }
            }
            offset += n;
        }
        Ok(Self { path: path.to_path_buf(), offsets, end: offset })
    }

    /// Same records, served from a copy of the log file at `path`.
    pub fn relocate(&self, path: &Path) -> Self {
        Self { path: path.to_path_buf(), offsets: self.offsets.clone(), end: self.end }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.offsets.contains_key(id)
    }

    /// Append records and fsync. The offset table is only updated once the
    /// bytes are durable.
    pub fn append(&mut self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut w = BufWriter::new(file);
        let mut offset = self.end;
        let mut added = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let line = serde_json::to_string(chunk)?;
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")?;
            added.push((chunk.chunk_id.clone(), (offset, line.len() as u64)));
            offset += line.len() as u64 + 1;
        }
        w.flush()?;
        w.get_ref().sync_all()?;
        self.offsets.extend(added);
        self.end = offset;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Chunk>> {
        let Some(&(offset, len)) = self.offsets.get(id) else { return Ok(None) };
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)?;
        Ok(Some(serde_json::from_slice(&buf)?))
    }
}
