//! The pool of query sequences not yet resolved by a database search.
//!
//! Sequences are keyed by their fasta id. Entries only leave the pool by length filtering
//! or through the set of ids aligned at a search stage.

use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{FriError, Result};
use crate::utils::files::{read_fasta, write_fasta};
use crate::utils::parameters::LengthFilter;


/// owns the query sequences still waiting for a template
#[derive(Clone, Debug, Default)]
pub struct QueryPool {
    sequences : BTreeMap<String, Vec<u8>>,
    /// number of sequences loaded, before any filtering
    nb_loaded : usize,
} // end of QueryPool


impl QueryPool {

    /// builds a pool from (id, sequence) records. Duplicated ids are a format error.
    pub fn from_records<I, S>(records : I) -> Result<Self>
            where I : IntoIterator<Item = (S, Vec<u8>)>, S : Into<String> {
        let mut sequences = BTreeMap::new();
        for (id, seq) in records {
            let id : String = id.into();
            if sequences.contains_key(&id) {
                return Err(FriError::Format(format!("duplicated query id {}", id)));
            }
            sequences.insert(id, seq);
        }
        let nb_loaded = sequences.len();
        Ok(QueryPool{sequences, nb_loaded})
    } // end of from_records


    /// parses all sequences of a fasta file (possibly gzipped)
    pub fn load(source : &Path) -> Result<Self> {
        log::info!("loading query sequences from {:?}", source);
        let pool = QueryPool::from_records(read_fasta(source)?)?;
        log::info!("loaded {} query sequences", pool.nb_loaded);
        Ok(pool)
    } // end of load


    /// removes entries outside the length bounds, returns the ids removed
    pub fn filter_by_length(&mut self, filter : &LengthFilter) -> Vec<String> {
        if filter.is_unset() {
            return Vec::new();
        }
        let removed : Vec<String> = self.sequences.iter()
                .filter(|(_, seq)| filter.filter(seq))
                .map(|(id, _)| id.clone())
                .collect();
        for id in &removed {
            if let Some(seq) = self.sequences.remove(id) {
                log::info!("Skipping {}; sequence length {} aa outside [{:?}, {:?}]", id, seq.len(),
                        filter.min_seq_len, filter.max_seq_len);
            }
        }
        removed
    } // end of filter_by_length


    /// removes all ids present, ids not in the pool are ignored. Returns the number really removed.
    pub fn remove<'a, I>(&mut self, ids : I) -> usize
            where I : IntoIterator<Item = &'a String> {
        let mut nb_removed = 0;
        for id in ids {
            if self.sequences.remove(id).is_some() {
                nb_removed += 1;
            }
        }
        log::debug!("QueryPool removed {} ids, remaining {}", nb_removed, self.sequences.len());
        nb_removed
    } // end of remove


    pub fn remaining_count(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// number of sequences at load time
    pub fn get_nb_loaded(&self) -> usize {
        self.nb_loaded
    }

    pub fn contains(&self, id : &str) -> bool {
        self.sequences.contains_key(id)
    }

    pub fn get(&self, id : &str) -> Option<&[u8]> {
        self.sequences.get(id).map(|s| s.as_slice())
    }

    /// iterates on (id, sequence) in id order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.sequences.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.sequences.keys()
    }

    /// dumps the remaining queries as a fasta file, used to feed the search tool
    pub fn write_fasta(&self, path : &Path) -> Result<usize> {
        write_fasta(path, self.sequences.iter().map(|(id, seq)| (id.as_str(), seq.as_slice())))
    }

}  // end of impl QueryPool



#[cfg(test)]
mod tests {
    use super::*;

    fn small_pool() -> QueryPool {
        QueryPool::from_records(vec![
            ("q1", b"MKV".to_vec()),
            ("q2", b"MKVLA".to_vec()),
            ("q3", b"MKVLAAGT".to_vec()),
        ]).unwrap()
    }

    #[test]
    fn duplicated_ids_rejected() {
        let res = QueryPool::from_records(vec![("q1", b"M".to_vec()), ("q1", b"K".to_vec())]);
        assert!(matches!(res, Err(FriError::Format(_))));
    }

    #[test]
    fn remove_ignores_unknown() {
        let mut pool = small_pool();
        let ids = vec!["q1".to_string(), "unknown".to_string()];
        assert_eq!(pool.remove(&ids), 1);
        assert_eq!(pool.remaining_count(), 2);
        // second removal of the same id is a no-op
        assert_eq!(pool.remove(&ids), 0);
        assert_eq!(pool.get_nb_loaded(), 3);
    }

    #[test]
    fn length_filtering() {
        let mut pool = small_pool();
        let removed = pool.filter_by_length(&LengthFilter::new(Some(4), Some(6)));
        assert_eq!(removed, vec!["q1".to_string(), "q3".to_string()]);
        assert!(pool.contains("q2"));
        // unset bounds
        assert!(pool.filter_by_length(&LengthFilter::default()).is_empty());
        assert_eq!(pool.remaining_count(), 1);
    }

    #[test]
    fn load_and_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.faa");
        std::fs::write(&path, ">q1 desc\nMKV\nLA\n>q2\nGGT*\n").unwrap();
        let pool = QueryPool::load(&path).unwrap();
        assert_eq!(pool.get("q1"), Some(&b"MKVLA"[..]));
        assert_eq!(pool.get("q2"), Some(&b"GGT"[..]));
        let out = dir.path().join("remaining.faa");
        assert_eq!(pool.write_fasta(&out).unwrap(), 2);
        assert!(!pool.is_empty());
    }

    #[test]
    fn malformed_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.faa");
        std::fs::write(&path, "this is not fasta\n").unwrap();
        assert!(matches!(QueryPool::load(&path), Err(FriError::Format(_))));
    }
}
