//! Database descriptors : a search index and the structures its targets come from.
//! The ordered list of databases is read from a json file and never modified afterwards.

use std::fs::OpenOptions;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{FriError, Result};


/// where template structures are read
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureSource {
    /// directory of experimental structures in PDB format
    PdbDir(PathBuf),
    /// compressed structure archive (FoldComp)
    Archive(PathBuf),
}

impl StructureSource {
    pub fn get_path(&self) -> &Path {
        match self {
            StructureSource::PdbDir(p) | StructureSource::Archive(p) => p.as_path(),
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, StructureSource::Archive(_))
    }
} // end of impl StructureSource


/// a database searched at one stage of the hierarchy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Database {
    /// name used in result files and prediction rows
    pub name : String,
    /// Sequence search index (mmseqs database). When omitted it is placed next to the structures
    /// as `<name>.mmseqsDB` and built from their sequences.
    #[serde(default)]
    pub search_index : PathBuf,
    /// template structures
    pub structures : StructureSource,
} // end of Database


impl Database {
    pub fn new(name : &str, search_index : PathBuf, structures : StructureSource) -> Self {
        Database{name : name.to_string(), search_index, structures}
    }

    /// true if the search index is on disk. mmseqs databases are a family of files sharing the index prefix.
    pub fn has_index(&self) -> bool {
        self.search_index.is_file() || PathBuf::from(format!("{}.dbtype", self.search_index.display())).exists()
    }

    /// the structure source must exist, a missing search index is built before searching
    pub fn check(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(FriError::Config("database with empty name".into()));
        }
        if !self.structures.get_path().exists() {
            return Err(FriError::Config(format!("structures {:?} of database {} not found",
                    self.structures.get_path(), self.name)));
        }
        Ok(())
    } // end of check

    /// reporting name of a target. Archive ids lose their final suffix (FoldComp naming).
    pub fn target_name<'a>(&self, target : &'a str) -> &'a str {
        if self.structures.is_archive() {
            match target.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem,
                _ => target,
            }
        }
        else {
            target
        }
    }
} // end of impl Database



/// reload the ordered list of databases from a json file. Relative paths are resolved against the file directory.
pub fn load_databases(filepath : &Path) -> Result<Vec<Database>> {
    log::info!("loading database list from {:?}", filepath);
    let file = OpenOptions::new().read(true).open(filepath).map_err(|e| {
        log::error!("load_databases could not open file {:?}", filepath.as_os_str());
        FriError::Config(format!("could not open database list {:?} : {}", filepath, e))
    })?;
    let mut databases : Vec<Database> = serde_json::from_reader(BufReader::new(file))?;
    let basedir = filepath.parent().unwrap_or_else(|| Path::new("."));
    for db in databases.iter_mut() {
        db.structures = match &db.structures {
            StructureSource::PdbDir(p) if p.is_relative() => StructureSource::PdbDir(basedir.join(p)),
            StructureSource::Archive(p) if p.is_relative() => StructureSource::Archive(basedir.join(p)),
            other => other.clone(),
        };
        if db.search_index.as_os_str().is_empty() {
            let dir = db.structures.get_path().parent().unwrap_or(basedir);
            db.search_index = dir.join(format!("{}.mmseqsDB", db.name));
        }
        else if db.search_index.is_relative() {
            db.search_index = basedir.join(&db.search_index);
        }
    }
    if databases.is_empty() {
        return Err(FriError::Config("database list is empty".into()));
    }
    for (i, db) in databases.iter().enumerate() {
        if databases[..i].iter().any(|d| d.name == db.name) {
            return Err(FriError::Config(format!("database name {} used twice", db.name)));
        }
    }
    log::info!("loaded {} databases : {:?}", databases.len(), databases.iter().map(|d| d.name.as_str()).collect::<Vec<&str>>());
    Ok(databases)
} // end of load_databases



#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_target_names() {
        let afdb = Database::new("afdb", PathBuf::from("afdb"), StructureSource::Archive(PathBuf::from("afdb.fcz")));
        assert_eq!(afdb.target_name("AF-P12345-F1-model_v4.pdb"), "AF-P12345-F1-model_v4");
        let pdb = Database::new("pdb100", PathBuf::from("pdb"), StructureSource::PdbDir(PathBuf::from("pdb")));
        assert_eq!(pdb.target_name("1abc_A"), "1abc_A");
    }

    #[test]
    fn load_list() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"[
            {"name": "pdb100", "search_index": "pdb100.mmseqsDB", "structures": {"pdb_dir": "pdb"}},
            {"name": "afdb", "search_index": "/abs/afdb.mmseqsDB", "structures": {"archive": "afdb"}}
        ]"#;
        let path = dir.path().join("databases.json");
        std::fs::write(&path, json).unwrap();
        let dbs = load_databases(&path).unwrap();
        assert_eq!(dbs.len(), 2);
        assert_eq!(dbs[0].search_index, dir.path().join("pdb100.mmseqsDB"));
        assert_eq!(dbs[0].structures, StructureSource::PdbDir(dir.path().join("pdb")));
        assert_eq!(dbs[1].search_index, PathBuf::from("/abs/afdb.mmseqsDB"));
        assert!(dbs[1].structures.is_archive());
        // paths do not exist
        assert!(matches!(dbs[0].check(), Err(FriError::Config(_))));
    }

    #[test]
    fn default_index_next_to_structures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("afdb")).unwrap();
        std::fs::write(dir.path().join("afdb").join("swissprot.fcz"), b"").unwrap();
        let json = r#"[{"name": "swissprot", "structures": {"archive": "afdb/swissprot.fcz"}}]"#;
        let path = dir.path().join("databases.json");
        std::fs::write(&path, json).unwrap();
        let dbs = load_databases(&path).unwrap();
        assert_eq!(dbs[0].search_index, dir.path().join("afdb").join("swissprot.mmseqsDB"));
        assert!(!dbs[0].has_index());
        assert!(dbs[0].check().is_ok());
    }

    #[test]
    fn duplicated_names() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"[
            {"name": "a", "search_index": "a", "structures": {"pdb_dir": "a"}},
            {"name": "a", "search_index": "b", "structures": {"pdb_dir": "b"}}
        ]"#;
        let path = dir.path().join("databases.json");
        std::fs::write(&path, json).unwrap();
        assert!(matches!(load_databases(&path), Err(FriError::Config(_))));
    }
}
