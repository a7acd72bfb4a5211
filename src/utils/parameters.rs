//! structures related to processing parameters


use std::fs::OpenOptions;
use std::path::Path;
use std::io::{BufReader, BufWriter};

use serde::{Deserialize, Serialize};
use serde_json::to_writer;

use crate::errors::{FriError, Result};
use crate::predict::mode::ProcessingMode;


/// a structure to filter sequences on their length. Unset bounds do not filter.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct LengthFilter {
    /// minimum sequence size
    pub min_seq_len : Option<usize>,
    /// maximum sequence size
    pub max_seq_len : Option<usize>,
} // end of struct LengthFilter


impl LengthFilter {
    pub fn new(min_seq_len : Option<usize>, max_seq_len : Option<usize>) -> Self {
        LengthFilter{min_seq_len, max_seq_len}
    } // end of new

    /// returns true if we filter (garbage the sequence)
    pub fn filter(&self, seq : &[u8]) -> bool {
        !self.accepts(seq.len())
    }

    /// returns true if a length is inside the bounds
    pub fn accepts(&self, len : usize) -> bool {
        let above_min = self.min_seq_len.map_or(true, |min| len >= min);
        let below_max = self.max_seq_len.map_or(true, |max| len <= max);
        above_min && below_max
    }

    pub fn is_unset(&self) -> bool {
        self.min_seq_len.is_none() && self.max_seq_len.is_none()
    }
}  // end of LengthFilter

//===========================================================

/// parameters driving the hierarchical database search
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct SearchParams {
    /// length bounds applied to the pool before any search
    pub length : LengthFilter,
    /// hits below this bit score are discarded when set
    pub min_bits : Option<f64>,
    /// hits above this e-value are discarded
    pub max_eval : f64,
    /// hits with sequence identity (0-1) below are discarded
    pub min_ident : f64,
    /// hits with coverage (0-1) below are discarded
    pub min_coverage : f64,
    /// number of candidate hits asked per query
    pub top_k : usize,
    /// threads handed to the search tool and the worker pool
    pub threads : usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams{length : LengthFilter::default(), min_bits : None, max_eval : 1e-3, min_ident : 0.5,
                    min_coverage : 0., top_k : 30, threads : 1}
    }
} // end of Default for SearchParams


impl SearchParams {
    /// returns true if a candidate passes all thresholds
    pub fn accepts(&self, bit_score : f64, e_value : f64, identity : f64, coverage : f64) -> bool {
        if let Some(min_bits) = self.min_bits {
            if bit_score < min_bits {
                return false;
            }
        }
        e_value <= self.max_eval && identity >= self.min_ident && coverage >= self.min_coverage
    }

    pub fn get_top_k(&self) -> usize {
        self.top_k
    }

    pub fn get_threads(&self) -> usize {
        self.threads.max(1)
    }
}  // end of impl block SearchParams


//======================================================================================

/// parameters for contact map construction
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct ContactParams {
    /// distance (Angstrom) below which two residues are in contact
    pub angstrom_contact_threshold : f64,
    /// longest gap (in residues) bridged during contact map alignment
    pub generate_contacts : usize,
    /// gap opening penalty when the indexed target sequence is aligned on the structure sequence
    pub gap_open : f64,
    /// gap extension penalty of the same alignment
    pub gap_extend : f64,
}

impl Default for ContactParams {
    fn default() -> Self {
        ContactParams::new(6., 2)
    }
}

impl ContactParams {
    pub fn new(angstrom_contact_threshold : f64, generate_contacts : usize) -> Self {
        ContactParams{angstrom_contact_threshold, generate_contacts, gap_open : 10., gap_extend : 1.}
    }

    pub fn with_gap_penalties(mut self, gap_open : f64, gap_extend : f64) -> Self {
        self.gap_open = gap_open;
        self.gap_extend = gap_extend;
        self
    }
} // end of impl ContactParams


//=========================================================================================

/// parameters used when routing queries to the prediction capabilities
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredictionParams {
    /// minimal identity of the canonical hit for the structure-aware path
    pub identity_threshold : f64,
    /// queries outside these bounds are skipped
    pub length : LengthFilter,
    /// processing modes asked for, must not be empty
    pub modes : Vec<ProcessingMode>,
}

impl Default for PredictionParams {
    fn default() -> Self {
        PredictionParams{identity_threshold : 0.5, length : LengthFilter::new(Some(60), Some(1000)),
                    modes : ProcessingMode::all()}
    }
}

impl PredictionParams {
    /// an empty mode set is a fatal configuration error
    pub fn check(&self) -> Result<()> {
        if self.modes.is_empty() {
            return Err(FriError::Config("no processing mode selected".into()));
        }
        if self.length.min_seq_len.unwrap_or(0) > self.length.max_seq_len.unwrap_or(usize::MAX) {
            return Err(FriError::Config(format!("min length {:?} above max length {:?}",
                        self.length.min_seq_len, self.length.max_seq_len)));
        }
        Ok(())
    }
}  // end of PredictionParams

//==========================================================================================

/// Gathers all parameters of a run. Dumped in the output directory to keep track of how results were obtained.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PipelineParams {
    pub search : SearchParams,
    pub contact : ContactParams,
    pub prediction : PredictionParams,
    /// keep per stage scratch directories
    pub keep_intermediate : bool,
    /// rebuild search indexes that already exist
    #[serde(default)]
    pub overwrite : bool,
}  // end of PipelineParams


impl PipelineParams {

    pub fn new(search : SearchParams, contact : ContactParams, prediction : PredictionParams, keep_intermediate : bool) -> Self {
        PipelineParams{search, contact, prediction, keep_intermediate, overwrite : false}
    }

    pub fn dump_json(&self, dirpath: &Path) -> Result<()> {
        //
        let filepath = dirpath.join("parameters.json");
        //
        log::info!("dumping PipelineParams in json file : {:?}", filepath);
        //
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(&filepath).map_err(|e| {
            log::error!("PipelineParams dump : dump could not open file {:?}", filepath.as_os_str());
            FriError::Io(e)
        })?;
        let mut writer = BufWriter::new(file);
        to_writer(&mut writer, &self)?;
        //
        Ok(())
    } // end of dump_json


    /// reload from a json dump
    pub fn reload_json(dirpath : &Path) -> Result<Self> {
        log::info!("in reload_json");
        //
        let filepath = dirpath.join("parameters.json");
        let file = OpenOptions::new().read(true).open(&filepath).map_err(|e| {
            log::error!("PipelineParams reload_json : reload could not open file {:?}", filepath.as_os_str());
            FriError::Io(e)
        })?;
        let reader = BufReader::new(file);
        let params : Self = serde_json::from_reader(reader)?;
        //
        log::info!("PipelineParams reloaded, nb modes : {}", params.prediction.modes.len());
        //
        Ok(params)
    } // end of reload_json

} // end of impl PipelineParams


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_filter_bounds() {
        let filter = LengthFilter::new(Some(3), Some(5));
        assert!(filter.filter(b"AA"));
        assert!(!filter.filter(b"AAA"));
        assert!(!filter.filter(b"AAAAA"));
        assert!(filter.filter(b"AAAAAA"));
        assert!(LengthFilter::default().accepts(0));
        assert!(LengthFilter::default().is_unset());
    }

    #[test]
    fn search_thresholds() {
        let params = SearchParams{min_bits : Some(50.), max_eval : 1e-3, min_ident : 0.5, min_coverage : 0.8, ..Default::default()};
        assert!(params.accepts(60., 1e-5, 0.6, 0.9));
        assert!(!params.accepts(40., 1e-5, 0.6, 0.9));
        assert!(!params.accepts(60., 1e-2, 0.6, 0.9));
        assert!(!params.accepts(60., 1e-5, 0.4, 0.9));
        assert!(!params.accepts(60., 1e-5, 0.6, 0.7));
    }

    #[test]
    fn empty_modes_rejected() {
        let params = PredictionParams{modes : Vec::new(), ..Default::default()};
        assert!(matches!(params.check(), Err(FriError::Config(_))));
        assert!(PredictionParams::default().check().is_ok());
    }

    #[test]
    fn dump_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = PipelineParams::default();
        params.search.top_k = 7;
        params.prediction.modes = vec![ProcessingMode::MolecularFunction];
        params.dump_json(dir.path()).unwrap();
        let reloaded = PipelineParams::reload_json(dir.path()).unwrap();
        assert_eq!(reloaded.search.top_k, 7);
        assert_eq!(reloaded.prediction.modes, vec![ProcessingMode::MolecularFunction]);
    }
}
