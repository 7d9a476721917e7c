//! Persisted hybrid (vector + BM25) index over case chunks.
//!
//! All artifacts of one committed state live in a generation directory; the
//! `CURRENT` pointer file names the committed one. See [`store`] for the
//! layout and commit protocol, [`fusion`] for how the two rankings combine.

pub mod fusion;
pub mod index;
pub mod manifest;
pub mod meta_log;
pub mod shared;
pub mod store;

pub use index::HybridIndex;
pub use manifest::{IndexConfig, IndexStatus};
pub use shared::SharedIndex;
