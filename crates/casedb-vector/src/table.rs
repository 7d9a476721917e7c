use anyhow::{anyhow, bail, Context, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, UInt64Array};
use arrow_schema::ArrowError;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, DistanceType, Table};
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use casedb_core::traits::VectorBackend;

use crate::index_build::{build_ivfpq_index, compute_ivfpq_params, has_vector_index, MIN_TRAINING_ROWS};
use crate::schema::{build_vector_schema, vector_dim, ROW_COLUMN, TABLE_NAME, VECTOR_COLUMN};

/// A LanceDB table of `(row, vector)` pairs behind the synchronous
/// [`VectorBackend`] interface.
///
/// The index owns a tokio runtime and blocks on it, so it must not be driven
/// from inside another runtime.
pub struct LanceVectorIndex {
    table: Table,
    dim: usize,
    rows: usize,
    indexed: bool,
    rt: Runtime,
}

async fn open_db(dir: &Path) -> Result<Connection> {
    Ok(connect(dir.to_string_lossy().as_ref()).execute().await?)
}

impl LanceVectorIndex {
    pub fn dim(&self) -> usize {
        self.dim
    }

    fn to_record_batch(&self, vectors: &[Vec<f32>]) -> Result<RecordBatch> {
        let schema = build_vector_schema(self.dim)?;
        let start = self.rows as u64;
        let rows = UInt64Array::from_iter_values(start..start + vectors.len() as u64);
        let values = FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
            vectors.iter().map(|v| Some(v.iter().copied().map(Some).collect::<Vec<_>>())),
            self.dim as i32,
        );
        Ok(RecordBatch::try_new(schema, vec![std::sync::Arc::new(rows), std::sync::Arc::new(values)])?)
    }
}

impl VectorBackend for LanceVectorIndex {
    fn create(dir: &Path, dim: usize) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        let schema = build_vector_schema(dim)?;
        let rt = Runtime::new()?;
        let table = rt.block_on(async {
            let conn = open_db(dir).await?;
            // create empty table with 0 rows
            let batches: Vec<std::result::Result<RecordBatch, ArrowError>> = Vec::new();
            let iter = RecordBatchIterator::new(batches.into_iter(), schema.clone());
            let table = conn.create_table(TABLE_NAME, Box::new(iter)).execute().await?;
            Ok::<_, anyhow::Error>(table)
        })?;
        debug!(dir = %dir.display(), dim, "created vector table");
        Ok(Self { rt, table, dim, rows: 0, indexed: false })
    }

    fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            bail!("vector store {} does not exist", dir.display());
        }
        let rt = Runtime::new()?;
        let (table, dim, rows, indexed) = rt.block_on(async {
            let conn = open_db(dir).await?;
            let table = conn.open_table(TABLE_NAME).execute().await?;
            let dim = vector_dim(table.schema().await?.as_ref())?;
            let rows = table.count_rows(None).await?;
            let indexed = has_vector_index(&table).await?;
            Ok::<_, anyhow::Error>((table, dim, rows, indexed))
        })?;
        debug!(dir = %dir.display(), dim, rows, indexed, "opened vector table");
        Ok(Self { rt, table, dim, rows, indexed })
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.is_empty() {
            return Ok(());
        }
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dim) {
            bail!("vector of length {} in a table of dimension {}", v.len(), self.dim);
        }
        let batch = self.to_record_batch(vectors)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        self.rt.block_on(async { self.table.add(reader).execute().await })?;
        self.rows += vectors.len();
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.rows)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        let k = k.min(self.rows);
        if k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            bail!("query of length {} against a table of dimension {}", query.len(), self.dim);
        }
        let batches: Vec<RecordBatch> = self.rt.block_on(async {
            let stream = self
                .table
                .vector_search(query.to_vec())?
                .column(VECTOR_COLUMN)
                .distance_type(DistanceType::Cosine)
                .select(Select::columns(&[ROW_COLUMN]))
                .limit(k)
                .execute()
                .await?;
            Ok::<_, anyhow::Error>(stream.try_collect::<Vec<RecordBatch>>().await?)
        })?;

        let mut hits = Vec::with_capacity(k);
        for batch in batches {
            let rows = batch
                .column_by_name(ROW_COLUMN)
                .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
                .ok_or_else(|| anyhow!("search result without '{ROW_COLUMN}' column"))?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow!("search result without '_distance' column"))?;
            for i in 0..batch.num_rows() {
                if rows.is_null(i) || distances.is_null(i) {
                    continue;
                }
                hits.push((rows.value(i) as usize, 1.0 - distances.value(i)));
            }
        }
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }

    fn optimize(&mut self, min_rows: usize) -> Result<bool> {
        if self.indexed || self.rows < min_rows.max(MIN_TRAINING_ROWS) {
            return Ok(false);
        }
        let params = compute_ivfpq_params(self.rows, self.dim);
        info!(rows = self.rows, nlist = params.nlist, m = params.m, "training IVF-PQ index");
        self.rt.block_on(build_ivfpq_index(&self.table, &params))?;
        self.indexed = true;
        Ok(true)
    }

    fn is_indexed(&self) -> bool {
        self.indexed
    }
}
