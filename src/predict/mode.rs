//! The function classes a prediction can be asked for.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};


/// Processing modes, each backed by its own pair of models.
/// Parsed from and displayed as the short names `bp`, `cc`, `ec`, `mf`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display, EnumIter)]
pub enum ProcessingMode {
    #[strum(serialize = "bp")]
    #[serde(rename = "bp")]
    BiologicalProcess,
    #[strum(serialize = "cc")]
    #[serde(rename = "cc")]
    CellularComponent,
    #[strum(serialize = "ec")]
    #[serde(rename = "ec")]
    EnzymeCommission,
    #[strum(serialize = "mf")]
    #[serde(rename = "mf")]
    MolecularFunction,
}


impl ProcessingMode {
    /// all modes, in declaration order
    pub fn all() -> Vec<ProcessingMode> {
        ProcessingMode::iter().collect()
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProcessingMode::BiologicalProcess => "biological_process",
            ProcessingMode::CellularComponent => "cellular_component",
            ProcessingMode::EnzymeCommission => "enzyme_commission",
            ProcessingMode::MolecularFunction => "molecular_function",
        }
    }
} // end of impl ProcessingMode
