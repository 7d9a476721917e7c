//! Retrieval followed by stance classification of every candidate.

pub mod buckets;
pub mod retriever;
pub mod stance;

pub use buckets::{StanceBuckets, StanceHit};
pub use retriever::{HybridRetriever, Retriever, TermFrequencyRetriever};
pub use stance::StancePipeline;
