//! From a canonical hit to a contact map : residue correspondence, template coordinates, contacts.

pub mod contact;
pub mod coords;
pub mod gaps;
pub mod register;

pub use contact::{build_contact_map, pairwise_sqeuclidean, ContactMap, Coord};
pub use coords::{directory_sequences, extract_archive_sequences, open_source, CoordinateSource, FoldcompArchive, PdbDirectory,
            TemplateStructure};
pub use gaps::{insert_gaps, ResidueCorrespondence};
pub use register::register_on_structure;
