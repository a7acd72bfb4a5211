//! Template structures : residue sequence and C-alpha coordinates read from PDB formatted files,
//! either in a directory of experimental structures or extracted from a FoldComp archive.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use lazy_static::lazy_static;

use crate::errors::{FriError, Result};
use crate::search::database::{Database, StructureSource};
use crate::utils::files::remove_scratch;

use super::contact::Coord;


lazy_static! {
    /// three letters residue names to one letter code
    pub static ref PROTEIN_LETTERS : HashMap<&'static str, u8> = {
        let pairs : [(&'static str, u8); 28] = [
            ("ALA", b'A'), ("CYS", b'C'), ("ASP", b'D'), ("GLU", b'E'), ("PHE", b'F'), ("GLY", b'G'),
            ("HIS", b'H'), ("ILE", b'I'), ("LYS", b'K'), ("LEU", b'L'), ("MET", b'M'), ("ASN", b'N'),
            ("PRO", b'P'), ("GLN", b'Q'), ("ARG", b'R'), ("SER", b'S'), ("THR", b'T'), ("VAL", b'V'),
            ("TRP", b'W'), ("TYR", b'Y'), ("ASX", b'B'), ("XAA", b'X'), ("GLX", b'Z'), ("XLE", b'J'),
            ("SEC", b'U'), ("PYL", b'O'), ("UNK", b'X'), ("MSE", b'M'),
        ];
        pairs.iter().cloned().collect()
    };
}


/// sequence and C-alpha coordinates of one chain, in structure order
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateStructure {
    pub sequence : Vec<u8>,
    pub coords : Vec<Coord>,
}


// atom and hetatm records of the first model
fn first_model_records(text : &str) -> impl Iterator<Item = &str> {
    text.lines()
        .take_while(|line| !line.starts_with("ENDMDL"))
        .filter(|line| line.starts_with("ATOM  ") || line.starts_with("HETATM"))
}


// chain of the first ATOM record, ligands and waters listed before the polymer do not count
fn default_chain(text : &str) -> Option<String> {
    let records : Vec<&str> = first_model_records(text).filter(|line| line.len() >= 54 && line.is_ascii()).collect();
    records.iter()
        .find(|line| line.starts_with("ATOM  "))
        .or(records.first())
        .map(|line| line[21..22].trim().to_string())
}


/// Parses C-alpha atoms of the first model. With `chain` None the chain of the first ATOM record is used.
/// Alternate locations other than blank or 'A' are skipped.
pub fn parse_ca_atoms(text : &str, entry : &str, chain : Option<&str>) -> Result<TemplateStructure> {
    let mut sequence = Vec::<u8>::new();
    let mut coords = Vec::<Coord>::new();
    let selected_chain = match chain {
        Some(c) => Some(c.to_string()),
        None => default_chain(text),
    };
    let mut last_residue : Option<(String, String)> = None;
    let mut nb_atoms = 0;
    //
    for line in first_model_records(text) {
        let is_hetatm = line.starts_with("HETATM");
        if line.len() < 54 || !line.is_ascii() {
            return Err(FriError::Format(format!("{} : bad atom record : {}", entry, line)));
        }
        nb_atoms += 1;
        if selected_chain.as_deref() != Some(line[21..22].trim()) {
            continue;
        }
        if line[12..16].trim() != "CA" {
            continue;
        }
        let alt_loc = &line[16..17];
        if alt_loc != " " && alt_loc != "A" {
            continue;
        }
        let res_name = line[17..20].trim();
        let letter = match PROTEIN_LETTERS.get(res_name) {
            Some(l) => *l,
            None if is_hetatm => continue,
            None => b'X',
        };
        // residue sequence number and insertion code identify a residue
        let res_key = (line[22..26].trim().to_string(), line[26..27].to_string());
        if last_residue.as_ref() == Some(&res_key) {
            continue;
        }
        let mut xyz = [0f64; 3];
        for (k, range) in [(30, 38), (38, 46), (46, 54)].iter().enumerate() {
            xyz[k] = line[range.0..range.1].trim().parse::<f64>()
                    .map_err(|e| FriError::Format(format!("{} : bad coordinate in {} : {}", entry, line, e)))?;
        }
        sequence.push(letter);
        coords.push(xyz);
        last_residue = Some(res_key);
    }
    //
    if nb_atoms == 0 {
        return Err(FriError::Format(format!("{} : no atom record", entry)));
    }
    if coords.is_empty() {
        return Err(FriError::Chain{entry : entry.to_string(), chain : chain.unwrap_or("").to_string()});
    }
    Ok(TemplateStructure{sequence, coords})
} // end of parse_ca_atoms



/// gives access to template structures by target id
pub trait CoordinateSource : Sync {
    /// called once with all targets before any [`template`](Self::template) request
    fn prepare(&mut self, _targets : &[String]) -> Result<()> {
        Ok(())
    }

    fn template(&self, target : &str) -> Result<TemplateStructure>;
}


/// splits `1abc_A` in entry `1abc` and chain `A`. Ids without chain suffix are returned whole.
pub fn split_target(target : &str) -> (&str, Option<&str>) {
    match target.rsplit_once('_') {
        Some((entry, chain)) if !entry.is_empty() && !chain.is_empty() && chain.len() <= 4
                    && chain.chars().all(|c| c.is_ascii_alphanumeric()) => (entry, Some(chain)),
        _ => (target, None),
    }
}


// first existing file among usual PDB file names
fn find_structure_file(dir : &Path, entry : &str) -> Option<PathBuf> {
    let lower = entry.to_ascii_lowercase();
    let candidates = [
        format!("{}.pdb", entry), format!("{}.pdb", lower), format!("{}.ent", entry),
        format!("pdb{}.ent", lower), entry.to_string(),
    ];
    candidates.iter().map(|name| dir.join(name)).find(|p| p.is_file())
}


// Bytes outside utf-8 (in remarks for example) are replaced, atom records holding them are rejected by the parser.
// A file that cannot be read only concerns the queries aligned on it.
fn read_structure_file(path : &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| FriError::NotFound(format!("could not read {:?} : {}", path, e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}


/// a directory of experimental structures, targets are `<entry>_<chain>`
pub struct PdbDirectory {
    dir : PathBuf,
}

impl PdbDirectory {
    pub fn new(dir : &Path) -> Self {
        PdbDirectory{dir : dir.to_path_buf()}
    }
}

impl CoordinateSource for PdbDirectory {
    fn template(&self, target : &str) -> Result<TemplateStructure> {
        let (entry, chain) = split_target(target);
        // a file named after the whole target is read without chain selection
        let (path, chain) = match find_structure_file(&self.dir, entry) {
            Some(path) => (path, chain),
            None => {
                let path = find_structure_file(&self.dir, target)
                        .ok_or_else(|| FriError::NotFound(format!("{} in {:?}", target, self.dir)))?;
                (path, None)
            }
        };
        log::trace!("reading template {} from {:?}", target, path);
        let text = read_structure_file(&path)?;
        parse_ca_atoms(&text, entry, chain)
    }
} // end of impl CoordinateSource for PdbDirectory



/// A FoldComp archive. Requested targets are decompressed once with the `foldcomp` executable
/// into a scratch directory, then read as PDB files.
pub struct FoldcompArchive {
    archive : PathBuf,
    scratch : PathBuf,
    executable : PathBuf,
    threads : usize,
    keep_intermediate : bool,
}

impl FoldcompArchive {
    pub fn new(archive : &Path, scratch : &Path, threads : usize, keep_intermediate : bool) -> Self {
        FoldcompArchive{archive : archive.to_path_buf(), scratch : scratch.to_path_buf(), executable : PathBuf::from("foldcomp"),
                    threads : threads.max(1), keep_intermediate}
    }

    pub fn with_executable(mut self, executable : &Path) -> Self {
        self.executable = executable.to_path_buf();
        self
    }
} // end of impl FoldcompArchive


impl CoordinateSource for FoldcompArchive {

    fn prepare(&mut self, targets : &[String]) -> Result<()> {
        let unavailable = |e : std::io::Error| FriError::NotFound(format!("could not prepare {:?} : {}", self.scratch, e));
        fs::create_dir_all(&self.scratch).map_err(unavailable)?;
        let id_list = self.scratch.join("ids.txt");
        fs::write(&id_list, targets.join("\n")).map_err(unavailable)?;
        log::info!("decompressing {} structures from {:?}", targets.len(), self.archive);
        let output = Command::new(&self.executable)
                .arg("decompress")
                .arg("--id-list").arg(&id_list)
                .arg("-t").arg(self.threads.to_string())
                .arg(&self.archive)
                .arg(&self.scratch)
                .output()
                .map_err(|e| FriError::NotFound(format!("could not execute {:?} : {}", self.executable, e)))?;
        if !output.status.success() {
            return Err(FriError::NotFound(format!("foldcomp decompress failed on {:?} : {}", self.archive,
                    String::from_utf8_lossy(&output.stderr).trim())));
        }
        Ok(())
    } // end of prepare

    fn template(&self, target : &str) -> Result<TemplateStructure> {
        let path = [self.scratch.join(target), self.scratch.join(format!("{}.pdb", target))]
                .into_iter()
                .find(|p| p.is_file())
                .ok_or_else(|| FriError::NotFound(format!("{} in {:?}", target, self.archive)))?;
        let text = read_structure_file(&path)?;
        parse_ca_atoms(&text, target, None)
    }
} // end of impl CoordinateSource for FoldcompArchive


impl Drop for FoldcompArchive {
    fn drop(&mut self) {
        if !self.keep_intermediate {
            remove_scratch(&self.scratch);
        }
    }
}


// chains of the first model in order of appearance, from ATOM records
fn chain_ids(text : &str) -> Vec<String> {
    let mut chains = Vec::<String>::new();
    for line in first_model_records(text).filter(|line| line.starts_with("ATOM  ") && line.len() >= 54 && line.is_ascii()) {
        let chain = line[21..22].trim();
        if !chains.iter().any(|c| c == chain) {
            chains.push(chain.to_string());
        }
    }
    chains
}


/// Sequences of every chain of the PDB files of `dir`, named as search targets `<entry>_<chain>`.
/// Files that cannot be parsed are skipped with a warning.
pub fn directory_sequences(dir : &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut paths : Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
    paths.sort();
    let mut records = Vec::<(String, Vec<u8>)>::new();
    let mut nb_skipped = 0;
    for path in paths {
        let (stem, ext) = match (path.file_stem().and_then(|s| s.to_str()), path.extension().and_then(|e| e.to_str())) {
            (Some(stem), Some(ext)) if ext == "pdb" || ext == "ent" => (stem, ext),
            _ => continue,
        };
        let entry = if ext == "ent" { stem.strip_prefix("pdb").unwrap_or(stem) } else { stem };
        let text = read_structure_file(&path)?;
        for chain in chain_ids(&text) {
            let target = if chain.is_empty() { entry.to_string() } else { format!("{}_{}", entry, chain) };
            match parse_ca_atoms(&text, entry, Some(&chain)) {
                Ok(template) => records.push((target, template.sequence)),
                Err(e) => {
                    log::warn!("skipping {} : {}", target, e);
                    nb_skipped += 1;
                }
            }
        }
    }
    log::info!("directory_sequences : {} chains in {:?}, {} skipped", records.len(), dir, nb_skipped);
    Ok(records)
} // end of directory_sequences


/// writes the sequences of a FoldComp archive in a fasta file with `foldcomp extract --fasta`
pub fn extract_archive_sequences(executable : &Path, archive : &Path, fasta : &Path, threads : usize) -> Result<()> {
    log::info!("extracting sequences of {:?}", archive);
    let output = Command::new(executable)
            .arg("extract")
            .arg("--fasta")
            .arg("-t").arg(threads.max(1).to_string())
            .arg(archive)
            .arg(fasta)
            .output()
            .map_err(|e| FriError::NotFound(format!("could not execute {:?} : {}", executable, e)))?;
    if !output.status.success() {
        return Err(FriError::NotFound(format!("foldcomp extract failed on {:?} : {}", archive,
                String::from_utf8_lossy(&output.stderr).trim())));
    }
    Ok(())
} // end of extract_archive_sequences


/// opens the structure source of a database
pub fn open_source(database : &Database, workdir : &Path, threads : usize, keep_intermediate : bool) -> Box<dyn CoordinateSource> {
    match &database.structures {
        StructureSource::PdbDir(dir) => Box::new(PdbDirectory::new(dir)),
        StructureSource::Archive(archive) => {
            let scratch = workdir.join(format!("{}_structures", database.name));
            Box::new(FoldcompArchive::new(archive, &scratch, threads, keep_intermediate))
        }
    }
} // end of open_source



#[cfg(test)]
mod tests {
    use super::*;

    const PDB_TEXT : &str = "\
HEADER    TEST                                    01-JAN-00   1ABC
ATOM      1  N   MET A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  MET A   1      11.639   6.071  -5.147  1.00  0.00           C
ATOM      3  CA  LYS A   2      13.559   9.264  -4.476  1.00  0.00           C
ATOM      4  CA AVAL A   3      15.000   9.000  -4.000  0.50  0.00           C
ATOM      5  CA BVAL A   3      15.500   9.500  -4.500  0.50  0.00           C
TER
ATOM      6  CA  GLY B   1       1.000   2.000   3.000  1.00  0.00           C
HETATM    7  CA  MSE B   2       2.000   2.000   3.000  1.00  0.00           C
HETATM    8  O   HOH B 101       5.000   5.000   5.000  1.00  0.00           O
END
";

    #[test]
    fn protein_letters() {
        assert_eq!(PROTEIN_LETTERS.len(), 28);
        assert_eq!(PROTEIN_LETTERS["SEC"], b'U');
        assert_eq!(PROTEIN_LETTERS["UNK"], b'X');
        assert_eq!(PROTEIN_LETTERS["PYL"], b'O');
    }

    #[test]
    fn default_chain() {
        let t = parse_ca_atoms(PDB_TEXT, "1abc", None).unwrap();
        assert_eq!(t.sequence, b"MKV".to_vec());
        assert_eq!(t.coords.len(), 3);
        assert_eq!(t.coords[2], [15., 9., -4.]);
    }

    #[test]
    fn selected_chain() {
        let t = parse_ca_atoms(PDB_TEXT, "1abc", Some("B")).unwrap();
        assert_eq!(t.sequence, b"GM".to_vec());
    }

    #[test]
    fn invalid_chain() {
        let res = parse_ca_atoms(PDB_TEXT, "1abc", Some("C"));
        assert!(matches!(res, Err(FriError::Chain{..})));
    }

    #[test]
    fn target_split() {
        assert_eq!(split_target("1abc_A"), ("1abc", Some("A")));
        assert_eq!(split_target("1abc"), ("1abc", None));
        assert_eq!(split_target("AF-P1-F1-model_v4"), ("AF-P1-F1-model", Some("v4")));
    }

    #[test]
    fn pdb_directory_lookup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1abc.pdb"), PDB_TEXT).unwrap();
        let source = PdbDirectory::new(dir.path());
        let t = source.template("1abc_B").unwrap();
        assert_eq!(t.sequence, b"GM".to_vec());
        assert!(matches!(source.template("2xyz_A"), Err(FriError::NotFound(_))));
        assert!(matches!(source.template("1abc_Q"), Err(FriError::Chain{..})));
    }

    #[test]
    fn leading_ligand_does_not_pick_chain() {
        let text = format!("HETATM    1  O   HOH W 201       5.000   5.000   5.000  1.00  0.00           O\n{}", PDB_TEXT);
        let t = parse_ca_atoms(&text, "1abc", None).unwrap();
        assert_eq!(t.sequence, b"MKV".to_vec());
    }

    #[test]
    fn undecodable_bytes_outside_atoms() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = b"REMARK \xff\xfe\n".to_vec();
        bytes.extend_from_slice(PDB_TEXT.as_bytes());
        fs::write(dir.path().join("1abc.pdb"), bytes).unwrap();
        let source = PdbDirectory::new(dir.path());
        assert_eq!(source.template("1abc_A").unwrap().sequence, b"MKV".to_vec());
        // the same bytes inside an atom record only concern this template
        let mut bytes = PDB_TEXT.as_bytes().to_vec();
        bytes.extend_from_slice(b"ATOM      9  CA  GLY A   4      \xff.000   2.000   3.000  1.00  0.00           C\n");
        fs::write(dir.path().join("2xyz.pdb"), bytes).unwrap();
        let res = source.template("2xyz_A");
        assert!(matches!(res, Err(FriError::Format(_))));
        assert!(res.unwrap_err().is_per_query());
    }

    #[test]
    fn sequences_of_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1abc.pdb"), PDB_TEXT).unwrap();
        fs::write(dir.path().join("pdb2xyz.ent"), PDB_TEXT).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a structure").unwrap();
        let records = directory_sequences(dir.path()).unwrap();
        let ids : Vec<&str> = records.iter().map(|r| r.0.as_str()).collect();
        assert_eq!(ids, vec!["1abc_A", "1abc_B", "2xyz_A", "2xyz_B"]);
        assert_eq!(records[1].1, b"GM".to_vec());
    }

    #[test]
    fn archive_without_tool() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = FoldcompArchive::new(&dir.path().join("afdb"), &dir.path().join("scratch"), 1, false)
                .with_executable(Path::new("/nonexistent/foldcomp"));
        let res = archive.prepare(&["AF-P1-F1-model_v4".to_string()]);
        assert!(matches!(res, Err(FriError::NotFound(_))));
    }
}
