//! Shared domain types, capability traits, errors and configuration for the
//! casedb workspace. Every other crate depends on this one and nothing here
//! touches a model, an index or the network.

pub mod abort;
pub mod chunk_source;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use abort::AbortSignal;
pub use error::{Error, ErrorKind, ErrorReport, Result};
