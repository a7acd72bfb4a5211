//! Mapping from processing modes to model commands, read once from `model_config.json`.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::{FriError, Result};
use crate::structure::ContactMap;

use super::mode::ProcessingMode;
use super::predictor::{Annotation, ExternalPredictor, FunctionPredictor, GraphQuery, SequenceQuery};


/// name of the model configuration in a weights directory
pub const MODEL_CONFIG : &str = "model_config.json";

// version of the model set without enzyme commission models
const VERSION_WITHOUT_EC : &str = "1.1";


#[derive(Deserialize)]
struct ModelConfig {
    version : String,
    graph : BTreeMap<String, String>,
    sequence : BTreeMap<String, String>,
}


/// graph and sequence models of each mode
#[derive(Clone, Debug)]
pub struct ModelRegistry {
    version : String,
    graph : BTreeMap<ProcessingMode, ExternalPredictor>,
    sequence : BTreeMap<ProcessingMode, ExternalPredictor>,
}


fn parse_models(models : &BTreeMap<String, String>, basedir : &Path) -> Result<BTreeMap<ProcessingMode, ExternalPredictor>> {
    let mut parsed = BTreeMap::new();
    for (name, command) in models {
        let mode = ProcessingMode::from_str(name)
                .map_err(|_| FriError::Config(format!("unknown processing mode {} in model configuration", name)))?;
        parsed.insert(mode, ExternalPredictor::from_command_line(command, basedir)?);
    }
    Ok(parsed)
}


impl ModelRegistry {

    /// loads `model_config.json`, `path` being the file itself or the weights directory holding it
    pub fn load(path : &Path) -> Result<Self> {
        let filepath : PathBuf = if path.is_dir() { path.join(MODEL_CONFIG) } else { path.to_path_buf() };
        log::info!("loading model configuration from {:?}", filepath);
        let file = OpenOptions::new().read(true).open(&filepath).map_err(|e| {
            log::error!("ModelRegistry::load could not open file {:?}", filepath.as_os_str());
            FriError::Config(format!("could not open model configuration {:?} : {}", filepath, e))
        })?;
        let config : ModelConfig = serde_json::from_reader(BufReader::new(file))?;
        let basedir = filepath.parent().unwrap_or_else(|| Path::new("."));
        let registry = ModelRegistry{version : config.version.clone(), graph : parse_models(&config.graph, basedir)?,
                    sequence : parse_models(&config.sequence, basedir)?};
        log::info!("model configuration version {}, graph models {:?}, sequence models {:?}", registry.version,
                    registry.graph.keys().collect::<Vec<_>>(), registry.sequence.keys().collect::<Vec<_>>());
        Ok(registry)
    } // end of load


    pub fn get_version(&self) -> &str {
        &self.version
    }

    /// Checks requested modes against available models, returns the modes to process.
    /// Version 1.1 models do not predict enzyme commission numbers, the mode is dropped.
    pub fn resolve_modes(&self, requested : &[ProcessingMode]) -> Result<Vec<ProcessingMode>> {
        let mut modes = Vec::<ProcessingMode>::with_capacity(requested.len());
        for mode in requested {
            if self.version == VERSION_WITHOUT_EC && *mode == ProcessingMode::EnzymeCommission {
                log::info!("EC number prediction is not supported in version {}.", self.version);
                continue;
            }
            if !modes.contains(mode) {
                modes.push(*mode);
            }
        }
        if modes.is_empty() {
            return Err(FriError::Config("no valid processing mode selected".into()));
        }
        for mode in &modes {
            if !self.graph.contains_key(mode) || !self.sequence.contains_key(mode) {
                return Err(FriError::Config(format!("no graph and sequence model pair for mode {}", mode)));
            }
        }
        Ok(modes)
    } // end of resolve_modes


    fn model<'a>(models : &'a BTreeMap<ProcessingMode, ExternalPredictor>, mode : ProcessingMode) -> Result<&'a ExternalPredictor> {
        models.get(&mode).ok_or_else(|| FriError::Config(format!("no model for mode {}", mode)))
    }

} // end of impl ModelRegistry


impl FunctionPredictor for ModelRegistry {
    fn predict_graph(&self, mode : ProcessingMode, id : &str, sequence : &[u8], contacts : &ContactMap) -> Result<Vec<Annotation>> {
        ModelRegistry::model(&self.graph, mode)?.predict(id, sequence, Some(contacts))
    }

    fn predict_sequence(&self, mode : ProcessingMode, id : &str, sequence : &[u8]) -> Result<Vec<Annotation>> {
        ModelRegistry::model(&self.sequence, mode)?.predict(id, sequence, None)
    }

    // one model process per mode and network
    fn predict_graph_batch(&self, mode : ProcessingMode, queries : &[GraphQuery]) -> Result<Vec<Vec<Annotation>>> {
        let requests : Vec<(&str, &[u8], Option<&ContactMap>)> = queries.iter().map(|q| (q.0, q.1, Some(q.2))).collect();
        ModelRegistry::model(&self.graph, mode)?.predict_batch(&requests)
    }

    fn predict_sequence_batch(&self, mode : ProcessingMode, queries : &[SequenceQuery]) -> Result<Vec<Vec<Annotation>>> {
        let requests : Vec<(&str, &[u8], Option<&ContactMap>)> = queries.iter().map(|q| (q.0, q.1, None)).collect();
        ModelRegistry::model(&self.sequence, mode)?.predict_batch(&requests)
    }
}



#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir : &Path, version : &str) {
        let config = format!(r#"{{"version" : "{}",
            "graph" : {{"bp" : "gcn bp", "cc" : "gcn cc", "ec" : "gcn ec", "mf" : "gcn mf"}},
            "sequence" : {{"bp" : "cnn bp", "cc" : "cnn cc", "ec" : "cnn ec", "mf" : "cnn mf"}} }}"#, version);
        fs::write(dir.join(MODEL_CONFIG), config).unwrap();
    }

    #[test]
    fn all_modes_resolved() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "1.0");
        let registry = ModelRegistry::load(dir.path()).unwrap();
        assert_eq!(registry.resolve_modes(&ProcessingMode::all()).unwrap(), ProcessingMode::all());
    }

    #[test]
    fn version_without_ec() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "1.1");
        let registry = ModelRegistry::load(&dir.path().join(MODEL_CONFIG)).unwrap();
        let modes = registry.resolve_modes(&ProcessingMode::all()).unwrap();
        assert!(!modes.contains(&ProcessingMode::EnzymeCommission));
        assert_eq!(modes.len(), 3);
        assert!(matches!(registry.resolve_modes(&[ProcessingMode::EnzymeCommission]), Err(FriError::Config(_))));
    }

    #[test]
    fn missing_model_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let config = r#"{"version" : "1.0", "graph" : {"mf" : "gcn mf"}, "sequence" : {"bp" : "cnn bp"}}"#;
        fs::write(dir.path().join(MODEL_CONFIG), config).unwrap();
        let registry = ModelRegistry::load(dir.path()).unwrap();
        assert!(matches!(registry.resolve_modes(&[ProcessingMode::MolecularFunction]), Err(FriError::Config(_))));
        assert!(matches!(registry.resolve_modes(&[]), Err(FriError::Config(_))));
    }

    #[test]
    fn unknown_mode_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = r#"{"version" : "1.0", "graph" : {"go" : "gcn"}, "sequence" : {}}"#;
        fs::write(dir.path().join(MODEL_CONFIG), config).unwrap();
        assert!(matches!(ModelRegistry::load(dir.path()), Err(FriError::Config(_))));
    }
}
