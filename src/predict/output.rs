//! Tab delimited prediction table.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::errors::Result;

use super::mode::ProcessingMode;


/// which network produced a row
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NetworkType {
    Graph,
    SequenceOnly,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Graph => "graph",
            NetworkType::SequenceOnly => "sequence-only",
        }
    }
}


/// One output line. Template, database and identity are set only for graph predictions.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionRow {
    pub protein : String,
    pub term : String,
    pub score : f64,
    pub annotation : String,
    pub network : NetworkType,
    pub mode : ProcessingMode,
    pub db_hit : Option<String>,
    pub db_name : Option<String>,
    pub identity : Option<f64>,
}


pub const HEADER : [&str; 9] = ["Protein", "GO_term/EC_number", "Score", "Annotation", "Neural_net", "DeepFRI_mode",
            "DB_hit", "DB_name", "Identity"];


/// Sequential writer of prediction rows, the header is written at creation.
pub struct PredictionWriter<W : Write> {
    writer : csv::Writer<W>,
    nb_rows : usize,
}

impl PredictionWriter<File> {
    pub fn create(filepath : &Path) -> Result<Self> {
        log::info!("writing predictions in {:?}", filepath);
        PredictionWriter::new(File::create(filepath)?)
    }
}

impl <W : Write> PredictionWriter<W> {

    pub fn new(out : W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(out);
        writer.write_record(HEADER)?;
        Ok(PredictionWriter{writer, nb_rows : 0})
    }

    pub fn write_row(&mut self, row : &PredictionRow) -> Result<()> {
        let score = row.score.to_string();
        let identity = row.identity.map(|i| i.to_string()).unwrap_or_default();
        let mode = row.mode.to_string();
        self.writer.write_record([
            row.protein.as_str(), row.term.as_str(), score.as_str(), row.annotation.as_str(), row.network.as_str(),
            mode.as_str(), row.db_hit.as_deref().unwrap_or(""), row.db_name.as_deref().unwrap_or(""), identity.as_str(),
        ])?;
        self.nb_rows += 1;
        Ok(())
    }

    pub fn get_nb_rows(&self) -> usize {
        self.nb_rows
    }

    /// flushes and gives back the underlying writer
    pub fn finish(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error().into())
    }

} // end of impl PredictionWriter
