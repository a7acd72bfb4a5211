//! Search capability backed by the MMseqs2 executable.
//!
//! Each call writes the remaining queries in a scratch directory, builds a query database,
//! searches it against the database index and converts alignments to a tabular file which is parsed back
//! into [`AlignmentHit`]s.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use serde::Deserialize;

use crate::errors::{FriError, Result};
use crate::query::QueryPool;
use crate::structure::{directory_sequences, extract_archive_sequences};
use crate::utils::files::{ensure_dir, remove_scratch, write_fasta};

use super::database::{Database, StructureSource};
use super::hit::AlignmentHit;
use super::SequenceSearch;


const FORMAT_OUTPUT : &str = "query,target,fident,bits,evalue,qcov,qstart,tstart,cigar,tseq";


/// expands a run length encoded cigar (as produced by mmseqs convertalis) into the M/X/D/I operation alphabet.
/// mmseqs `I` consumes a query residue only and becomes `D`, mmseqs `D` becomes `I`.
pub fn expand_cigar(cigar : &str) -> Result<String> {
    let mut ops = String::with_capacity(cigar.len() * 4);
    let mut count : Option<usize> = None;
    for c in cigar.chars() {
        if let Some(d) = c.to_digit(10) {
            count = Some(count.unwrap_or(0) * 10 + d as usize);
            continue;
        }
        let op = match c {
            'M' | '=' => 'M',
            'X' => 'X',
            'I' => 'D',
            'D' => 'I',
            _ => return Err(FriError::AlignmentLength(format!("unknown cigar operation {} in {}", c, cigar))),
        };
        for _ in 0..count.take().unwrap_or(1) {
            ops.push(op);
        }
    }
    if count.is_some() {
        return Err(FriError::AlignmentLength(format!("cigar {} ends with a count", cigar)));
    }
    Ok(ops)
} // end of expand_cigar



// one line of convertalis output, fields in FORMAT_OUTPUT order
#[derive(Debug, Deserialize)]
struct M8Record {
    query : String,
    target : String,
    fident : f64,
    bits : f64,
    evalue : f64,
    qcov : f64,
    qstart : usize,
    tstart : usize,
    cigar : String,
    tseq : String,
}


/// parses a convertalis table into hits for a database
pub fn parse_alignments(filepath : &Path, database : &str) -> Result<Vec<AlignmentHit>> {
    let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_path(filepath)?;
    let mut hits = Vec::<AlignmentHit>::new();
    for record in reader.deserialize() {
        let rec : M8Record = record?;
        let operations = match expand_cigar(&rec.cigar) {
            Ok(ops) => ops,
            Err(e) => {
                log::warn!("skipping alignment {} -> {} : {}", rec.query, rec.target, e);
                continue;
            }
        };
        let hit = AlignmentHit::new(&rec.query, &rec.target, rec.bits, rec.evalue, rec.fident, rec.qcov, &operations, database)
                .with_starts(rec.qstart.saturating_sub(1), rec.tstart.saturating_sub(1))
                .with_target_sequence(rec.tseq.as_bytes());
        hits.push(hit);
    }
    log::debug!("parse_alignments : {} alignments in {:?}", hits.len(), filepath);
    Ok(hits)
} // end of parse_alignments



fn path_arg(p : &Path) -> String {
    p.to_string_lossy().into_owned()
}


/// runs mmseqs as an external process
pub struct MmseqsSearch {
    /// mmseqs executable
    executable : PathBuf,
    /// foldcomp executable, to get sequences of archives when building an index
    foldcomp : PathBuf,
    /// directory where scratch directories are created
    workdir : PathBuf,
    /// maximal e-value handed to mmseqs, hits are filtered again afterwards
    max_eval : f64,
    threads : usize,
    keep_intermediate : bool,
} // end of MmseqsSearch


impl MmseqsSearch {
    pub fn new(workdir : &Path, max_eval : f64, threads : usize, keep_intermediate : bool) -> Self {
        MmseqsSearch{executable : PathBuf::from("mmseqs"), foldcomp : PathBuf::from("foldcomp"), workdir : workdir.to_path_buf(), max_eval,
                    threads : threads.max(1), keep_intermediate}
    }

    /// use another executable than `mmseqs` found in PATH
    pub fn with_executable(mut self, executable : &Path) -> Self {
        self.executable = executable.to_path_buf();
        self
    }

    pub fn with_foldcomp(mut self, foldcomp : &Path) -> Self {
        self.foldcomp = foldcomp.to_path_buf();
        self
    }


    /// Builds the search index of a database from the sequences of its structures.
    /// An existing index is kept unless `overwrite` is set.
    pub fn build_index(&self, database : &Database, overwrite : bool) -> Result<()> {
        if database.has_index() && !overwrite {
            log::info!("using search index {:?} of {}", database.search_index, database.name);
            return Ok(());
        }
        let start_t = SystemTime::now();
        let scratch = ensure_dir(&self.workdir.join(format!("{}_build", database.name)))?;
        let fasta = scratch.join("sequences.faa");
        let stage_error = |e : FriError| FriError::Search{database : database.name.clone(), msg : e.to_string()};
        match &database.structures {
            StructureSource::PdbDir(dir) => {
                let records = directory_sequences(dir).map_err(stage_error)?;
                if records.is_empty() {
                    return Err(FriError::Search{database : database.name.clone(), msg : format!("no structure sequence in {:?}", dir)});
                }
                write_fasta(&fasta, records.iter().map(|(id, seq)| (id.as_str(), seq.as_slice())))?;
            },
            StructureSource::Archive(archive) => {
                extract_archive_sequences(&self.foldcomp, archive, &fasta, self.threads).map_err(stage_error)?;
            },
        }
        if let Some(parent) = database.search_index.parent() {
            ensure_dir(parent)?;
        }
        log::info!("building search index {:?} of {}", database.search_index, database.name);
        self.run(&database.name, &["createdb", &path_arg(&fasta), &path_arg(&database.search_index), "--dbtype", "1"])?;
        if !self.keep_intermediate {
            remove_scratch(&scratch);
        }
        if let Ok(elapsed) = start_t.elapsed() {
            log::info!("search index of {} built, elapsed system time(s) {}", database.name, elapsed.as_secs());
        }
        Ok(())
    } // end of build_index


    fn run(&self, database : &str, args : &[&str]) -> Result<()> {
        log::debug!("running {:?} {}", self.executable, args.join(" "));
        let output = Command::new(&self.executable).args(args).output().map_err(|e| FriError::Search{
                database : database.to_string(),
                msg : format!("could not execute {:?} : {}", self.executable, e)})?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() { format!("exit status {}", output.status) } else { stderr };
            return Err(FriError::Search{database : database.to_string(), msg : format!("mmseqs {} : {}", args[0], detail)});
        }
        Ok(())
    } // end of run

}  // end of impl MmseqsSearch



impl SequenceSearch for MmseqsSearch {

    fn prepare_database(&self, database : &Database, overwrite : bool) -> Result<()> {
        self.build_index(database, overwrite)
    }

    fn search(&self, queries : &QueryPool, database : &Database, top_k : usize) -> Result<Vec<AlignmentHit>> {
        let start_t = SystemTime::now();
        let scratch = ensure_dir(&self.workdir.join(format!("{}_search", database.name)))?;
        let query_fasta = scratch.join("queries.faa");
        let nb_queries = queries.write_fasta(&query_fasta)?;
        log::info!("searching {} queries against {} with mmseqs, top_k {}", nb_queries, database.name, top_k);
        //
        let query_db = scratch.join("queryDB");
        let result_db = scratch.join("resultDB");
        let tmp = scratch.join("tmp");
        let table = scratch.join("alignments.m8");
        let index = path_arg(&database.search_index);
        let threads = self.threads.to_string();
        let max_seqs = top_k.max(1).to_string();
        let max_eval = self.max_eval.to_string();
        //
        self.run(&database.name, &["createdb", &path_arg(&query_fasta), &path_arg(&query_db), "--dbtype", "1"])?;
        self.run(&database.name, &["search", &path_arg(&query_db), &index, &path_arg(&result_db), &path_arg(&tmp),
                "--max-seqs", &max_seqs, "-e", &max_eval, "-a", "--threads", &threads])?;
        self.run(&database.name, &["convertalis", &path_arg(&query_db), &index, &path_arg(&result_db), &path_arg(&table),
                "--format-output", FORMAT_OUTPUT, "--threads", &threads])?;
        //
        let hits = parse_alignments(&table, &database.name).map_err(|e| FriError::Search{
                database : database.name.clone(), msg : format!("could not parse {:?} : {}", table, e)})?;
        if !self.keep_intermediate {
            remove_scratch(&scratch);
        }
        if let Ok(elapsed) = start_t.elapsed() {
            log::info!("mmseqs search against {} : {} alignments, elapsed system time(s) {}", database.name, hits.len(), elapsed.as_secs());
        }
        Ok(hits)
    } // end of search

} // end of impl SequenceSearch for MmseqsSearch
