//! This file contains fasta file reading / writing and scratch directory handling

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::errors::{FriError, Result};


// returns true if file looks like a fasta file (possibly gzipped)
pub fn is_fasta_file(path : &Path) -> bool {
    let filename = match path.file_name().and_then(|f| f.to_str()) {
        Some(name) => name,
        None => return false,
    };
    let stem = filename.strip_suffix(".gz").unwrap_or(filename);
    stem.ends_with(".faa") || stem.ends_with(".fa") || stem.ends_with(".fasta") || stem.ends_with(".fas")
}  // end of is_fasta_file


#[inline]
/// clones the sequence upper-casing residues and filtering out stop codons '*' and blanks.
pub fn filter_out_non_aa(seq : &[u8]) -> Vec<u8> {
    let mut filtered = Vec::<u8>::with_capacity(seq.len());
    for c in seq {
        if c.is_ascii_alphabetic() {
            filtered.push(c.to_ascii_uppercase());
        }
    }
    if log::log_enabled!(log::Level::Trace) && filtered.len() < seq.len() {
        let nb_n = seq.len() - filtered.len();
        log::trace!("filtered nb non AA letters {}, fraction  {:1.3e}", nb_n , nb_n as f32/seq.len() as f32);
    }
    filtered
}  // end of filter_out_non_aa


/// fasta id is the first word of the header line
pub fn fasta_id(header : &[u8]) -> Result<String> {
    let header = std::str::from_utf8(header).map_err(|e| FriError::Format(format!("non utf8 header : {}", e)))?;
    match header.split_whitespace().next() {
        Some(id) => Ok(id.to_string()),
        None => Err(FriError::Format("empty fasta header".into())),
    }
} // end of fasta_id


/// opens and parses a fasta file (possibly gzipped) with needletail.
/// Returns records (id, residues) in file order.
pub fn read_fasta(pathb : &Path) -> Result<Vec<(String, Vec<u8>)>> {
    log::trace!("processing file {:?}", pathb);
    let mut reader = needletail::parse_fastx_file(pathb)
            .map_err(|e| FriError::Format(format!("could not parse {:?} : {}", pathb, e)))?;
    let mut records = Vec::<(String, Vec<u8>)>::new();
    while let Some(record) = reader.next() {
        let seqrec = record.map_err(|e| FriError::Format(format!("bad record in file {:?} : {}", pathb, e)))?;
        let id = fasta_id(seqrec.id())?;
        let residues = filter_out_non_aa(&seqrec.seq());
        if residues.is_empty() {
            return Err(FriError::Format(format!("record {} in {:?} has no residue", id, pathb)));
        }
        records.push((id, residues));
    }
    log::debug!("read_fasta : nb records {} in {:?}", records.len(), pathb);
    Ok(records)
} // end of read_fasta


/// dumps records in fasta format, 80 residues a line
pub fn write_fasta<'a, I>(path : &Path, records : I) -> Result<usize>
        where I : IntoIterator<Item = (&'a str, &'a [u8])> {
    let file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
    let mut out = BufWriter::new(file);
    let mut nb_written = 0;
    for (id, seq) in records {
        writeln!(out, ">{}", id)?;
        for line in seq.chunks(80) {
            out.write_all(line)?;
            out.write_all(b"\n")?;
        }
        nb_written += 1;
    }
    out.flush()?;
    Ok(nb_written)
} // end of write_fasta


/// creates (if needed) a directory and returns its path
pub fn ensure_dir(path : &Path) -> Result<PathBuf> {
    fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}


/// removes a scratch directory, only logging failures
pub fn remove_scratch(path : &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_dir_all(path) {
            log::warn!("could not remove intermediate directory {:?} : {}", path, e);
        }
        else {
            log::debug!("removed intermediate directory {:?}", path);
        }
    }
} // end of remove_scratch


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fasta_extension() {
        assert!(is_fasta_file(Path::new("queries.faa")));
        assert!(is_fasta_file(Path::new("/tmp/q.fasta.gz")));
        assert!(!is_fasta_file(Path::new("hits.tsv")));
    }

    #[test]
    fn non_aa_filtered() {
        assert_eq!(filter_out_non_aa(b"mkv*"), b"MKV".to_vec());
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.faa");
        let long = vec![b'A'; 100];
        let records = vec![("seq1", &b"MKV"[..]), ("seq2", &long[..])];
        assert_eq!(write_fasta(&path, records).unwrap(), 2);
        let read = read_fasta(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0], ("seq1".to_string(), b"MKV".to_vec()));
        assert_eq!(read[1].1.len(), 100);
    }

    #[test]
    fn header_first_word() {
        assert_eq!(fasta_id(b"prot_1 some description").unwrap(), "prot_1");
        assert!(fasta_id(b"   ").is_err());
    }
}
