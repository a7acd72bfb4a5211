//! Alignment hits returned by a search capability, their filtering and the choice of one
//! canonical hit per query.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::utils::parameters::SearchParams;


/// One candidate alignment of a query against a database target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignmentHit {
    pub query : String,
    pub target : String,
    pub bit_score : f64,
    pub e_value : f64,
    /// sequence identity in [0, 1]
    pub identity : f64,
    /// query coverage in [0, 1]
    pub coverage : f64,
    /// operation string over M, X, D, I
    pub operations : String,
    /// 0-based position of the first aligned query residue
    pub query_start : usize,
    /// 0-based position of the first aligned target residue
    pub target_start : usize,
    /// name of the database the target belongs to
    pub database : String,
    /// target sequence as stored in the search index, when the search tool reports it
    #[serde(default)]
    pub target_sequence : Option<Vec<u8>>,
} // end of AlignmentHit


impl AlignmentHit {

    pub fn new(query : &str, target : &str, bit_score : f64, e_value : f64, identity : f64, coverage : f64,
                operations : &str, database : &str) -> Self {
        AlignmentHit{query : query.to_string(), target : target.to_string(), bit_score, e_value, identity, coverage,
                    operations : operations.to_string(), query_start : 0, target_start : 0, database : database.to_string(),
                    target_sequence : None}
    }

    /// sets local alignment start positions
    pub fn with_starts(mut self, query_start : usize, target_start : usize) -> Self {
        self.query_start = query_start;
        self.target_start = target_start;
        self
    }

    pub fn with_target_sequence(mut self, sequence : &[u8]) -> Self {
        self.target_sequence = Some(sequence.to_vec());
        self
    }

    /// ordering of candidates, greater is better : bit score, then identity, then smaller target id.
    pub fn preference(&self, other : &AlignmentHit) -> Ordering {
        self.bit_score.total_cmp(&other.bit_score)
            .then_with(|| self.identity.total_cmp(&other.identity))
            .then_with(|| other.target.cmp(&self.target))
    }

}  // end of impl AlignmentHit


/// discards candidates failing thresholds then keeps exactly one hit per query.
/// The result is keyed by query id.
pub fn select_canonical(candidates : Vec<AlignmentHit>, params : &SearchParams) -> BTreeMap<String, AlignmentHit> {
    let nb_candidates = candidates.len();
    let mut best : FxHashMap<String, AlignmentHit> = FxHashMap::default();
    let mut nb_kept = 0;
    for hit in candidates {
        if !params.accepts(hit.bit_score, hit.e_value, hit.identity, hit.coverage) {
            continue;
        }
        nb_kept += 1;
        match best.get(&hit.query) {
            Some(current) if current.preference(&hit) != Ordering::Less => {},
            _ => {
                best.insert(hit.query.clone(), hit);
            }
        }
    }
    log::debug!("select_canonical : {} candidates, {} passed thresholds, {} queries", nb_candidates, nb_kept, best.len());
    best.into_iter().collect()
} // end of select_canonical



/// row of the per stage result table
#[derive(Serialize)]
struct HitRow<'a> {
    query : &'a str,
    target : &'a str,
    identity : f64,
    bit_score : f64,
    e_value : f64,
    coverage : f64,
}


/// dumps canonical hits in a tab delimited file `<database>_results.tsv`.
/// The writer is dropped (and the file closed) on every exit path.
pub fn save_hits(dirpath : &Path, database : &str, hits : &BTreeMap<String, AlignmentHit>) -> Result<std::path::PathBuf> {
    let filepath = dirpath.join(format!("{}_results.tsv", database));
    log::info!("dumping {} canonical hits in : {:?}", hits.len(), filepath);
    let file = File::create(&filepath)?;
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(file);
    for hit in hits.values() {
        writer.serialize(HitRow{query : &hit.query, target : &hit.target, identity : hit.identity,
                bit_score : hit.bit_score, e_value : hit.e_value, coverage : hit.coverage})?;
    }
    writer.flush()?;
    Ok(filepath)
} // end of save_hits
