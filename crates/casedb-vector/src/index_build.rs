//! IVF-PQ training for a vector table.
//!
//! Parameters scale with the number of rows; the index is built once and
//! later appends are searched alongside it by Lance.
use anyhow::Result;
use lancedb::index::{vector::IvfPqIndexBuilder, Index};
use lancedb::{DistanceType, Table};

use crate::schema::VECTOR_COLUMN;

pub const INDEX_NAME: &str = "vector_ivfpq";

/// PQ with 8-bit codes needs at least one full codebook of training rows.
pub const MIN_TRAINING_ROWS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfPqParams {
    pub nlist: usize,
    pub m: usize,
    pub nbits: usize,
}

pub fn compute_ivfpq_params(total_ready: usize, dim: usize) -> IvfPqParams {
    let sqrt_n = (total_ready as f64).sqrt() as usize;
    let mut nlist = std::cmp::max(16, 2 * sqrt_n);
    nlist = std::cmp::min(nlist, 65536);
    // Clamp nlist to be less than total_ready for tiny datasets
    if total_ready > 1 {
        nlist = std::cmp::min(nlist, total_ready - 1);
    } else {
        nlist = 1;
    }
    // Sub-vectors must split the dimension evenly.
    let m = [32, 16, 8, 4, 2, 1].into_iter().find(|m| dim % m == 0).unwrap_or(1);
    IvfPqParams { nlist, m, nbits: 8 }
}

pub async fn has_vector_index(table: &Table) -> Result<bool> {
    let indices = table.list_indices().await?;
    Ok(indices.iter().any(|ix| ix.columns.iter().any(|c| c == VECTOR_COLUMN)))
}

pub async fn build_ivfpq_index(table: &Table, params: &IvfPqParams) -> Result<()> {
    table
        .create_index(
            &[VECTOR_COLUMN],
            Index::IvfPq(
                IvfPqIndexBuilder::default()
                    .distance_type(DistanceType::Cosine)
                    .num_partitions(params.nlist as u32)
                    .num_sub_vectors(params.m as u32)
                    .num_bits(params.nbits as u32),
            ),
        )
        .name(INDEX_NAME.to_string())
        .execute()
        .await?;
    Ok(())
}
