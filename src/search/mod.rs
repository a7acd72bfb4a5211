//! hierarchical search of queries against structure databases

pub mod database;
pub mod hierarchical;
pub mod hit;
pub mod mmseqs;

pub use database::{load_databases, Database, StructureSource};
pub use hierarchical::{HierarchicalSearch, SearchOutcome, StageReport};
pub use hit::{select_canonical, AlignmentHit};
pub use mmseqs::MmseqsSearch;

use crate::errors::Result;
use crate::query::QueryPool;


/// A sequence search capability : returns up to `top_k` candidate hits per remaining query.
/// Hits must carry the database name.
pub trait SequenceSearch {
    /// makes the database searchable, called once per database before any search.
    /// `overwrite` asks to rebuild what already exists.
    fn prepare_database(&self, _database : &Database, _overwrite : bool) -> Result<()> {
        Ok(())
    }

    fn search(&self, queries : &QueryPool, database : &Database, top_k : usize) -> Result<Vec<AlignmentHit>>;
}
