//! Row-addressed vector storage on LanceDB.
//!
//! One table per index generation holds `(row, vector)` pairs. Search is exact
//! cosine until the table grows past the configured threshold, after which an
//! IVF-PQ index is trained (see [`index_build`]).
pub mod index_build;
pub mod schema;
pub mod table;

pub use table::LanceVectorIndex;
