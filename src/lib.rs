//! Protein function prediction guided by structural templates.
//!
//! Queries are searched against an ordered list of structure databases, each query keeping the first
//! database where it finds a qualifying hit. Resolved queries get a contact map transferred from the
//! template structure and go to graph models, the others to sequence models.

pub mod errors;
pub mod pipeline;
pub mod predict;
pub mod query;
pub mod search;
pub mod structure;
pub mod utils;

pub use errors::{FriError, Result};
