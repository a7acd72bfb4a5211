//! Residue correspondence between a query and a template, rebuilt from an alignment operation string.
//!
//! Operations : `M` match and `X` mismatch consume a residue on both sides, `D` consumes a query residue
//! only (gap on the target side), `I` consumes a target residue only (gap on the query side).

use crate::errors::{FriError, Result};


/// gap marker in gapped sequences
pub const GAP : u8 = b'-';


/// Two gapped sequences of equal length. Removing gaps gives back query and target.
#[derive(Clone, Debug, PartialEq)]
pub struct ResidueCorrespondence {
    query : Vec<u8>,
    target : Vec<u8>,
}


impl ResidueCorrespondence {

    /// Aligns full sequences along `operations`. Residues not consumed by the operations are
    /// appended as one sided gaps, query tail first.
    pub fn from_operations(query : &[u8], target : &[u8], operations : &str) -> Result<Self> {
        ResidueCorrespondence::from_local_alignment(query, target, operations, 0, 0)
    } // end of from_operations


    /// Same as [`from_operations`](Self::from_operations) for a local alignment starting at
    /// `query_start` / `target_start` (0-based). Unaligned prefixes are emitted as one sided gaps before the alignment.
    pub fn from_local_alignment(query : &[u8], target : &[u8], operations : &str, query_start : usize, target_start : usize) -> Result<Self> {
        if query_start > query.len() || target_start > target.len() {
            return Err(FriError::AlignmentLength(format!("alignment starts ({}, {}) beyond sequence lengths ({}, {})",
                    query_start, target_start, query.len(), target.len())));
        }
        let capacity = query.len() + target.len();
        let mut gapped_query = Vec::<u8>::with_capacity(capacity);
        let mut gapped_target = Vec::<u8>::with_capacity(capacity);
        // unaligned prefixes
        for &q in &query[..query_start] {
            gapped_query.push(q);
            gapped_target.push(GAP);
        }
        for &t in &target[..target_start] {
            gapped_query.push(GAP);
            gapped_target.push(t);
        }
        //
        let mut qpos = query_start;
        let mut tpos = target_start;
        for (rank, op) in operations.bytes().enumerate() {
            let (consume_query, consume_target) = match op {
                b'M' | b'X' => (true, true),
                b'D' => (true, false),
                b'I' => (false, true),
                _ => {
                    return Err(FriError::AlignmentLength(format!("unknown operation {} at position {}", op as char, rank)));
                }
            };
            if consume_query && qpos >= query.len() {
                return Err(FriError::AlignmentLength(format!("operation {} at position {} runs past query end ({} residues)",
                        op as char, rank, query.len())));
            }
            if consume_target && tpos >= target.len() {
                return Err(FriError::AlignmentLength(format!("operation {} at position {} runs past target end ({} residues)",
                        op as char, rank, target.len())));
            }
            if consume_query {
                gapped_query.push(query[qpos]);
                qpos += 1;
            }
            else {
                gapped_query.push(GAP);
            }
            if consume_target {
                gapped_target.push(target[tpos]);
                tpos += 1;
            }
            else {
                gapped_target.push(GAP);
            }
        }
        // unaligned tails
        for &q in &query[qpos..] {
            gapped_query.push(q);
            gapped_target.push(GAP);
        }
        for &t in &target[tpos..] {
            gapped_query.push(GAP);
            gapped_target.push(t);
        }
        Ok(ResidueCorrespondence{query : gapped_query, target : gapped_target})
    } // end of from_local_alignment


    /// from already gapped sequences of equal length
    pub fn from_gapped(query : Vec<u8>, target : Vec<u8>) -> Result<Self> {
        if query.len() != target.len() {
            return Err(FriError::AlignmentLength(format!("gapped sequences of different lengths {} and {}", query.len(), target.len())));
        }
        Ok(ResidueCorrespondence{query, target})
    }


    /// number of columns
    pub fn len(&self) -> usize {
        self.query.len()
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }

    pub fn get_gapped_query(&self) -> &[u8] {
        &self.query
    }

    pub fn get_gapped_target(&self) -> &[u8] {
        &self.target
    }

    /// true if column holds a query residue
    pub fn has_query(&self, column : usize) -> bool {
        self.query[column] != GAP
    }

    /// true if column holds a template residue
    pub fn has_target(&self, column : usize) -> bool {
        self.target[column] != GAP
    }

    /// number of template residues, i.e. expected number of coordinates
    pub fn nb_target_residues(&self) -> usize {
        self.target.iter().filter(|&&c| c != GAP).count()
    }

    pub fn nb_query_residues(&self) -> usize {
        self.query.iter().filter(|&&c| c != GAP).count()
    }

    /// fraction of query residues facing an identical template residue
    pub fn query_identity(&self) -> f64 {
        let nb_query = self.nb_query_residues();
        if nb_query == 0 {
            return 0.;
        }
        let nb_identical = self.query.iter().zip(self.target.iter()).filter(|(q, t)| **q != GAP && q == t).count();
        nb_identical as f64 / nb_query as f64
    }

} // end of impl ResidueCorrespondence


/// string version of gap insertion, returns (gapped query, gapped target)
pub fn insert_gaps(query : &str, target : &str, operations : &str) -> Result<(String, String)> {
    let corr = ResidueCorrespondence::from_operations(query.as_bytes(), target.as_bytes(), operations)?;
    let to_string = |v : &[u8]| String::from_utf8_lossy(v).into_owned();
    Ok((to_string(corr.get_gapped_query()), to_string(corr.get_gapped_target())))
} // end of insert_gaps



#[cfg(test)]
mod tests {
    use super::*;

    fn strip(s : &str) -> String {
        s.chars().filter(|&c| c != '-').collect()
    }

    #[test]
    fn deletion() {
        assert_eq!(insert_gaps("AACT", "AAT", "MMDM").unwrap(), ("AACT".to_string(), "AA-T".to_string()));
    }

    #[test]
    fn insertion() {
        assert_eq!(insert_gaps("AAT", "AATC", "MMMI").unwrap(), ("AAT-".to_string(), "AATC".to_string()));
    }

    #[test]
    fn unaligned() {
        assert_eq!(insert_gaps("AAT", "FGTC", "XXMI").unwrap(), ("AAT-".to_string(), "FGTC".to_string()));
    }

    #[test]
    fn too_many_operations() {
        assert!(matches!(insert_gaps("AA", "AAT", "MMM"), Err(FriError::AlignmentLength(_))));
        assert!(matches!(insert_gaps("AAT", "A", "MD I"), Err(FriError::AlignmentLength(_))));
        assert!(matches!(insert_gaps("AAT", "AA", "MMMI"), Err(FriError::AlignmentLength(_))));
    }

    #[test]
    fn gap_stripping_gives_back_inputs() {
        let cases = [
            ("MKVLAAGT", "MKLAGGT", "MMDMMXMM"),
            ("MKV", "MKVLL", "MMM"),
            ("MKVLL", "GG", "IIDD"),
            ("ACDEFG", "ACDG", "MMMDDM"),
            ("", "AC", ""),
        ];
        for (q, t, ops) in cases.iter() {
            let (gq, gt) = insert_gaps(q, t, ops).unwrap();
            assert_eq!(gq.len(), gt.len());
            assert_eq!(strip(&gq), *q);
            assert_eq!(strip(&gt), *t);
        }
    }

    #[test]
    fn local_alignment_prefixes() {
        // query MKVLA aligned from residue 2 on target GGVLA from residue 2
        let corr = ResidueCorrespondence::from_local_alignment(b"MKVLA", b"GGVLA", "MMM", 2, 2).unwrap();
        assert_eq!(corr.get_gapped_query(), b"MK--VLA");
        assert_eq!(corr.get_gapped_target(), b"--GGVLA");
        assert_eq!(corr.nb_target_residues(), 5);
        assert!((corr.query_identity() - 0.6).abs() < 1e-12);
        assert!(ResidueCorrespondence::from_local_alignment(b"MK", b"GG", "M", 3, 0).is_err());
    }
}
