//! Transfer of a query alignment from the indexed target sequence onto the residues present in the structure.
//!
//! Search tools align queries against the sequence stored in their index. Structures often lack some of
//! those residues (unresolved loops, termini) so the alignment is composed with a global alignment of the
//! indexed sequence on the structure sequence before coordinates are attached to columns.

use crate::errors::{FriError, Result};
use crate::utils::parameters::ContactParams;

use super::gaps::{ResidueCorrespondence, GAP};


/// fraction of aligned structure residues that must agree with the indexed sequence
pub const MIN_STRUCTURE_AGREEMENT : f64 = 0.9;

const MATCH_SCORE : f64 = 5.;
const MISMATCH_SCORE : f64 = -4.;

// traceback states
const DIAG : u8 = 0;
const UP : u8 = 1;
const LEFT : u8 = 2;


fn same_residue(a : u8, b : u8) -> bool {
    a == b || a == b'X' || b == b'X'
}


/// Global alignment of `indexed` on `structure` with affine gaps, returned as an operation string
/// (`D` an indexed residue missing in the structure, `I` a structure residue absent from the index).
/// Indexed residues before the first and after the last structure residue are free.
pub fn align_on_structure(indexed : &[u8], structure : &[u8], gap_open : f64, gap_extend : f64) -> String {
    let n = indexed.len();
    let m = structure.len();
    let width = m + 1;
    let neg = f64::NEG_INFINITY;
    // scores of alignments ending with a pair, an indexed only residue, a structure only residue
    let mut diag = vec![neg; width];
    let mut up = vec![neg; width];
    let mut left = vec![neg; width];
    diag[0] = 0.;
    for j in 1..=m {
        left[j] = -gap_open - (j - 1) as f64 * gap_extend;
    }
    let mut trace = vec![[DIAG; 3]; (n + 1) * width];
    for j in 1..=m {
        trace[j][2] = if j == 1 { DIAG } else { LEFT };
    }
    //
    for i in 1..=n {
        let prev_diag = diag.clone();
        let prev_up = up.clone();
        let prev_left = left.clone();
        diag[0] = neg;
        left[0] = neg;
        // leading indexed residues are free
        up[0] = 0.;
        trace[i * width][1] = if i == 1 { DIAG } else { UP };
        for j in 1..=m {
            let cell = i * width + j;
            let (open, extend) = if j == m { (0., 0.) } else { (gap_open, gap_extend) };
            // pair
            let (best, from) = best_of(prev_diag[j - 1], prev_up[j - 1], prev_left[j - 1]);
            let score = if same_residue(indexed[i - 1], structure[j - 1]) { MATCH_SCORE } else { MISMATCH_SCORE };
            diag[j] = best + score;
            trace[cell][0] = from;
            // indexed residue only, free past the last structure residue
            let (best, from) = best_of(prev_diag[j] - open, prev_up[j] - extend, prev_left[j] - open);
            up[j] = best;
            trace[cell][1] = from;
            // structure residue only
            let (best, from) = best_of(diag[j - 1] - gap_open, up[j - 1] - gap_open, left[j - 1] - gap_extend);
            left[j] = best;
            trace[cell][2] = from;
        }
    }
    //
    let (_, mut state) = best_of(diag[m], up[m], left[m]);
    let mut ops = Vec::<u8>::with_capacity(n + m);
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        let from = trace[i * width + j][state as usize];
        match state {
            DIAG => {
                ops.push(if indexed[i - 1] == structure[j - 1] { b'M' } else { b'X' });
                i -= 1;
                j -= 1;
            },
            UP => {
                ops.push(b'D');
                i -= 1;
            },
            _ => {
                ops.push(b'I');
                j -= 1;
            },
        }
        state = from;
    }
    ops.reverse();
    String::from_utf8_lossy(&ops).into_owned()
} // end of align_on_structure


// best of the three states, ties resolved in diag, up, left order
fn best_of(d : f64, u : f64, l : f64) -> (f64, u8) {
    let mut best = (d, DIAG);
    if u > best.0 {
        best = (u, UP);
    }
    if l > best.0 {
        best = (l, LEFT);
    }
    best
}



/// Rewrites a query / indexed target correspondence as a query / structure correspondence
/// following `operations` (indexed on structure, as given by [`align_on_structure`]).
pub fn compose_on_structure(correspondence : &ResidueCorrespondence, structure : &[u8], operations : &str) -> Result<ResidueCorrespondence> {
    let query = correspondence.get_gapped_query();
    let indexed = correspondence.get_gapped_target();
    let ops = operations.as_bytes();
    let mut k = 0;
    let mut spos = 0;
    let mut gapped_query = Vec::<u8>::with_capacity(query.len());
    let mut gapped_structure = Vec::<u8>::with_capacity(query.len());
    let too_short = || FriError::AlignmentLength(format!("structure operations {} do not cover the indexed sequence", operations));
    //
    for column in 0..query.len() {
        if indexed[column] == GAP {
            gapped_query.push(query[column]);
            gapped_structure.push(GAP);
            continue;
        }
        // structure residues placed before this indexed residue
        while k < ops.len() && ops[k] == b'I' {
            gapped_query.push(GAP);
            gapped_structure.push(*structure.get(spos).ok_or_else(too_short)?);
            spos += 1;
            k += 1;
        }
        let op = *ops.get(k).ok_or_else(too_short)?;
        k += 1;
        let facing = match op {
            b'M' | b'X' => {
                let residue = *structure.get(spos).ok_or_else(too_short)?;
                spos += 1;
                residue
            },
            _ => GAP,
        };
        if query[column] == GAP && facing == GAP {
            continue;
        }
        gapped_query.push(query[column]);
        gapped_structure.push(facing);
    }
    for &op in &ops[k..] {
        if op != b'I' {
            return Err(too_short());
        }
        gapped_query.push(GAP);
        gapped_structure.push(*structure.get(spos).ok_or_else(too_short)?);
        spos += 1;
    }
    if spos != structure.len() {
        return Err(FriError::AlignmentLength(format!("{} of {} structure residues placed", spos, structure.len())));
    }
    ResidueCorrespondence::from_gapped(gapped_query, gapped_structure)
} // end of compose_on_structure



/// Moves a query alignment made against `indexed` onto `structure`.
/// A structure whose sequence does not agree with the indexed one is a format error for this template.
pub fn register_on_structure(correspondence : &ResidueCorrespondence, indexed : &[u8], structure : &[u8],
            params : &ContactParams) -> Result<ResidueCorrespondence> {
    let operations = align_on_structure(indexed, structure, params.gap_open, params.gap_extend);
    let nb_pairs = operations.bytes().filter(|&op| op == b'M' || op == b'X').count();
    let nb_agree = {
        let (mut i, mut j, mut nb) = (0, 0, 0);
        for op in operations.bytes() {
            match op {
                b'M' | b'X' => {
                    if same_residue(indexed[i], structure[j]) {
                        nb += 1;
                    }
                    i += 1;
                    j += 1;
                },
                b'D' => i += 1,
                _ => j += 1,
            }
        }
        nb
    };
    if structure.is_empty() || (nb_agree as f64) < MIN_STRUCTURE_AGREEMENT * structure.len() as f64 {
        return Err(FriError::Format(format!("structure sequence ({} residues) does not match the indexed sequence ({} residues), {} agreeing pairs",
                structure.len(), indexed.len(), nb_agree)));
    }
    log::trace!("register_on_structure : {} pairs, {} indexed residues missing", nb_pairs, indexed.len() - nb_pairs);
    compose_on_structure(correspondence, structure, &operations)
} // end of register_on_structure



#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_residue() {
        assert_eq!(align_on_structure(b"MKVLAGHE", b"MKLAGHE", 10., 1.), "MMDMMMMM");
        assert_eq!(align_on_structure(b"GSMKVLAGHE", b"MKVLAGHE", 10., 1.), "DDMMMMMMMM");
        assert_eq!(align_on_structure(b"MKVLAGHE", b"MKVLAGHE", 10., 1.), "MMMMMMMM");
    }

    #[test]
    fn query_moved_on_structure() {
        let corr = ResidueCorrespondence::from_operations(b"MKVL", b"MKVLA", "MMMM").unwrap();
        let moved = register_on_structure(&corr, b"MKVLA", b"MKLA", &ContactParams::new(6., 2)).unwrap();
        assert_eq!(moved.get_gapped_query(), b"MKVL-");
        assert_eq!(moved.get_gapped_target(), b"MK-LA");
        assert_eq!(moved.nb_target_residues(), 4);
        assert!((moved.query_identity() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn query_gap_facing_missing_residue_is_dropped() {
        // indexed C has no query residue and no coordinates
        let corr = ResidueCorrespondence::from_operations(b"MKLAG", b"MKCLAG", "MMIMMM").unwrap();
        let moved = compose_on_structure(&corr, b"MKLAG", "MMDMMM").unwrap();
        assert_eq!(moved.get_gapped_query(), b"MKLAG");
        assert_eq!(moved.get_gapped_target(), b"MKLAG");
    }

    #[test]
    fn unrelated_structure_rejected() {
        let corr = ResidueCorrespondence::from_operations(b"MKVL", b"MKVLA", "MMMM").unwrap();
        let res = register_on_structure(&corr, b"MKVLA", b"WWWWW", &ContactParams::default());
        assert!(matches!(res, Err(FriError::Format(_))));
    }
}
