//! Stance scoring of a premise document against a hypothesis with an NLI
//! backend: sentence-aligned windows, max aggregation and a labeling policy.

pub mod classifier;
pub mod label;
pub mod window;

pub use classifier::{StanceClassifier, StanceScore};
pub use label::{LabelPolicy, StanceLabel};
