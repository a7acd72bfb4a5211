//! Binary residue contact maps derived from template C-alpha coordinates and transferred
//! onto the gapped query/template correspondence.
//!
//! Distances are compared squared, no square root is taken. Query residues facing a short gap in the
//! template get contacts with their sequence neighbours when the residues flanking the gap are in contact.

use crate::errors::{FriError, Result};
use crate::utils::parameters::ContactParams;

use super::gaps::ResidueCorrespondence;


/// C-alpha coordinates (Angstrom)
pub type Coord = [f64; 3];


/// Full n×n squared euclidean distance matrix, row-major.
/// Symmetric with an exactly zero diagonal.
pub fn pairwise_sqeuclidean(coords : &[Coord]) -> Vec<f64> {
    let n = coords.len();
    let mut distances = vec![0f64; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = coords[i][0] - coords[j][0];
            let dy = coords[i][1] - coords[j][1];
            let dz = coords[i][2] - coords[j][2];
            let d = dx * dx + dy * dy + dz * dz;
            distances[i * n + j] = d;
            distances[j * n + i] = d;
        }
    }
    distances
} // end of pairwise_sqeuclidean


/// A square symmetric boolean matrix, no self contact.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactMap {
    size : usize,
    contacts : Vec<bool>,
}


impl ContactMap {

    /// a map without any contact
    pub fn empty(size : usize) -> Self {
        ContactMap{size, contacts : vec![false; size * size]}
    }

    /// thresholds a squared distance matrix of dimension size×size
    pub fn from_sq_distances(sq_distances : &[f64], size : usize, threshold : f64) -> Self {
        let sq_threshold = threshold * threshold;
        let mut cmap = ContactMap::empty(size);
        for i in 0..size {
            for j in (i + 1)..size {
                if sq_distances[i * size + j] <= sq_threshold {
                    cmap.set(i, j);
                }
            }
        }
        cmap
    } // end of from_sq_distances

    pub fn get_size(&self) -> usize {
        self.size
    }

    pub fn get(&self, i : usize, j : usize) -> bool {
        self.contacts[i * self.size + j]
    }

    // sets a contact and its symmetric, never the diagonal
    fn set(&mut self, i : usize, j : usize) {
        if i != j {
            self.contacts[i * self.size + j] = true;
            self.contacts[j * self.size + i] = true;
        }
    }

    /// number of contacts counted once per unordered pair
    pub fn nb_contacts(&self) -> usize {
        self.contacts.iter().filter(|&&c| c).count() / 2
    }

    /// contacts as (i, j) pairs with i < j
    pub fn to_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..self.size {
            for j in (i + 1)..self.size {
                if self.get(i, j) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Restricts a map built over a correspondence to the columns holding a query residue,
    /// giving a map of query length.
    pub fn project_to_query(&self, correspondence : &ResidueCorrespondence) -> ContactMap {
        let kept : Vec<usize> = (0..self.size).filter(|&c| correspondence.has_query(c)).collect();
        let mut projected = ContactMap::empty(kept.len());
        for (i, &ci) in kept.iter().enumerate() {
            for (j, &cj) in kept.iter().enumerate().skip(i + 1) {
                if self.get(ci, cj) {
                    projected.set(i, j);
                }
            }
        }
        projected
    } // end of project_to_query

} // end of impl ContactMap



/// Builds the contact map of a correspondence from the coordinates of its template residues
/// (one coordinate per non gap template residue, in structure order).
pub fn build_contact_map(coords : &[Coord], correspondence : &ResidueCorrespondence, params : &ContactParams) -> Result<ContactMap> {
    let nb_target = correspondence.nb_target_residues();
    if coords.len() != nb_target {
        return Err(FriError::CoordinateMismatch{expected : nb_target, found : coords.len()});
    }
    let n = correspondence.len();
    // column of each template residue
    let columns : Vec<usize> = (0..n).filter(|&c| correspondence.has_target(c)).collect();
    //
    let sq_distances = pairwise_sqeuclidean(coords);
    let template_map = ContactMap::from_sq_distances(&sq_distances, coords.len(), params.angstrom_contact_threshold);
    let mut cmap = ContactMap::empty(n);
    for (a, b) in template_map.to_pairs() {
        cmap.set(columns[a], columns[b]);
    }
    //
    let nb_bridged = bridge_gaps(&mut cmap, correspondence, params.generate_contacts);
    log::trace!("build_contact_map : {} columns, {} template contacts, {} gaps bridged", n, template_map.nb_contacts(), nb_bridged);
    Ok(cmap)
} // end of build_contact_map



// Runs of columns without template residue no longer than max_gap, flanked on both sides
// by template residues in contact, get contacts between each gap column and its neighbours up to max_gap apart.
// Returns the number of runs bridged.
fn bridge_gaps(cmap : &mut ContactMap, correspondence : &ResidueCorrespondence, max_gap : usize) -> usize {
    let n = correspondence.len();
    if max_gap == 0 {
        return 0;
    }
    let mut nb_bridged = 0;
    let mut column = 0;
    while column < n {
        if correspondence.has_target(column) {
            column += 1;
            continue;
        }
        let start = column;
        while column < n && !correspondence.has_target(column) {
            column += 1;
        }
        let end = column;   // exclusive
        // terminal gaps have a single flank and are left alone
        if start == 0 || end == n || end - start > max_gap {
            continue;
        }
        if !cmap.get(start - 1, end) {
            continue;
        }
        for g in start..end {
            for j in 1..=max_gap {
                if g >= j {
                    cmap.set(g, g - j);
                }
                if g + j < n {
                    cmap.set(g, g + j);
                }
            }
        }
        nb_bridged += 1;
    }
    nb_bridged
} // end of bridge_gaps



#[cfg(test)]
mod tests {
    use super::*;

    // residues on a line, 3.8 A apart
    fn line(n : usize) -> Vec<Coord> {
        (0..n).map(|i| [3.8 * i as f64, 0., 0.]).collect()
    }

    #[test]
    fn sqeuclidean_properties() {
        let coords = vec![[0.37, 0.95, 0.73], [0.60, 0.16, 0.16], [0.06, 0.87, 0.60], [12., -3., 4.5]];
        let d = pairwise_sqeuclidean(&coords);
        let n = coords.len();
        for i in 0..n {
            assert_eq!(d[i * n + i], 0.);
            for j in 0..n {
                assert!(d[i * n + j] >= 0.);
                assert_eq!(d[i * n + j], d[j * n + i]);
            }
        }
        assert!((d[1] - (0.23f64.powi(2) + 0.79f64.powi(2) + 0.57f64.powi(2))).abs() < 1e-12);
    }

    #[test]
    fn threshold_is_inclusive_and_diagonal_empty() {
        let corr = ResidueCorrespondence::from_operations(b"AAAA", b"AAAA", "MMMM").unwrap();
        let cmap = build_contact_map(&line(4), &corr, &ContactParams::new(7.6, 0)).unwrap();
        assert!(cmap.get(0, 1) && cmap.get(0, 2) && !cmap.get(0, 3));
        for i in 0..4 {
            assert!(!cmap.get(i, i));
        }
        assert_eq!(cmap.nb_contacts(), 5);
    }

    #[test]
    fn coordinate_count_checked() {
        let corr = ResidueCorrespondence::from_operations(b"AACT", b"AAT", "MMDM").unwrap();
        let res = build_contact_map(&line(4), &corr, &ContactParams::default());
        assert!(matches!(res, Err(FriError::CoordinateMismatch{expected : 3, found : 4})));
    }

    #[test]
    fn short_gap_bridged() {
        // one query residue absent from the template, flanks 3.8 A apart
        let corr = ResidueCorrespondence::from_operations(b"AACTG", b"AATG", "MMDMM").unwrap();
        let cmap = build_contact_map(&line(4), &corr, &ContactParams::new(4.0, 2)).unwrap();
        assert_eq!(cmap.get_size(), 5);
        assert!(cmap.get(2, 1) && cmap.get(2, 3));
        assert!(cmap.get(2, 0) && cmap.get(2, 4));
        // without gap filling the gap column stays isolated
        let cmap = build_contact_map(&line(4), &corr, &ContactParams::new(4.0, 0)).unwrap();
        assert!((0..5).all(|j| !cmap.get(2, j)));
    }

    #[test]
    fn gap_as_long_as_limit_bridged() {
        let corr = ResidueCorrespondence::from_operations(b"AACCTG", b"AATG", "MMDDMM").unwrap();
        let cmap = build_contact_map(&line(4), &corr, &ContactParams::new(4.0, 2)).unwrap();
        assert!(cmap.get(2, 0) && cmap.get(2, 1) && cmap.get(2, 3) && cmap.get(2, 4));
        assert!(cmap.get(3, 1) && cmap.get(3, 4) && cmap.get(3, 5));
        assert!(!cmap.get(2, 5) && !cmap.get(3, 0));
    }

    #[test]
    fn template_gap_next_to_query_gap() {
        // column 2 is query only, column 3 template only
        let corr = ResidueCorrespondence::from_operations(b"AACTG", b"AAPTG", "MMDIMM").unwrap();
        let cmap = build_contact_map(&line(5), &corr, &ContactParams::new(4.0, 2)).unwrap();
        assert!(cmap.get(2, 3));
        let projected = cmap.project_to_query(&corr);
        assert_eq!(projected.get_size(), 5);
        assert_eq!(projected.to_pairs(), vec![(0, 1), (0, 2), (1, 2), (2, 3), (3, 4)]);
    }

    #[test]
    fn long_gap_left_open() {
        let corr = ResidueCorrespondence::from_operations(b"AACCCTG", b"AATG", "MMDDDMM").unwrap();
        let cmap = build_contact_map(&line(4), &corr, &ContactParams::new(4.0, 2)).unwrap();
        for g in 2..5 {
            assert!((0..7).all(|j| !cmap.get(g, j)));
        }
    }

    #[test]
    fn gap_with_distant_flanks_left_open() {
        let corr = ResidueCorrespondence::from_operations(b"ACT", b"AT", "MDM").unwrap();
        let coords = vec![[0., 0., 0.], [20., 0., 0.]];
        let cmap = build_contact_map(&coords, &corr, &ContactParams::new(6.0, 2)).unwrap();
        assert_eq!(cmap.nb_contacts(), 0);
    }

    #[test]
    fn projection_drops_query_gaps() {
        // template residue 2 absent from the query
        let corr = ResidueCorrespondence::from_operations(b"AAT", b"AATC", "MMIM").unwrap();
        let cmap = build_contact_map(&line(4), &corr, &ContactParams::new(4.0, 2)).unwrap();
        let projected = cmap.project_to_query(&corr);
        assert_eq!(projected.get_size(), 3);
        assert!(projected.get(0, 1));
        // columns 1 and 3 are 7.6 A apart
        assert!(!projected.get(1, 2));
        assert_eq!(projected.to_pairs(), vec![(0, 1)]);
    }
}
