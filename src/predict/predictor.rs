//! Prediction capabilities. The networks themselves are external : a graph model consumes a sequence and a
//! contact map, a sequence model the sequence alone.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::{FriError, Result};
use crate::structure::ContactMap;

use super::mode::ProcessingMode;


/// one predicted term
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// GO term or EC number
    pub term : String,
    pub score : f64,
    /// human readable name of the term
    pub annotation : String,
}


/// a query sent to a graph model with its contact map
pub type GraphQuery<'a> = (&'a str, &'a [u8], &'a ContactMap);

/// a query sent to a sequence model
pub type SequenceQuery<'a> = (&'a str, &'a [u8]);


/// The prediction capability the router relies on.
/// Batch methods answer one annotation list per query, in query order.
pub trait FunctionPredictor {
    /// structure aware prediction, `contacts` has the size of `sequence`
    fn predict_graph(&self, mode : ProcessingMode, id : &str, sequence : &[u8], contacts : &ContactMap) -> Result<Vec<Annotation>>;

    /// sequence only prediction
    fn predict_sequence(&self, mode : ProcessingMode, id : &str, sequence : &[u8]) -> Result<Vec<Annotation>>;

    fn predict_graph_batch(&self, mode : ProcessingMode, queries : &[GraphQuery]) -> Result<Vec<Vec<Annotation>>> {
        queries.iter().map(|(id, sequence, contacts)| self.predict_graph(mode, id, sequence, contacts)).collect()
    }

    fn predict_sequence_batch(&self, mode : ProcessingMode, queries : &[SequenceQuery]) -> Result<Vec<Vec<Annotation>>> {
        queries.iter().map(|(id, sequence)| self.predict_sequence(mode, id, sequence)).collect()
    }
} // end of trait FunctionPredictor


// what is sent to a model process, one json line per query
#[derive(Serialize)]
struct PredictionRequest<'a> {
    id : &'a str,
    sequence : &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    contacts : Option<Vec<(usize, usize)>>,
}


/// A model run as an external command, once per batch of queries.
/// The command receives one json request `{id, sequence, contacts}` per line on stdin (contacts as (i, j) pairs with i < j)
/// and answers with lines `id\tterm\tscore\tannotation` on stdout.
#[derive(Clone, Debug)]
pub struct ExternalPredictor {
    program : PathBuf,
    args : Vec<String>,
}

impl ExternalPredictor {

    pub fn new(program : &Path, args : Vec<String>) -> Self {
        ExternalPredictor{program : program.to_path_buf(), args}
    }

    /// Splits a command line on whitespace. A program path relative to `basedir` that exists there is resolved against it.
    pub fn from_command_line(command : &str, basedir : &Path) -> Result<Self> {
        let mut words = command.split_whitespace();
        let program = words.next().ok_or_else(|| FriError::Config("empty model command".into()))?;
        let mut program = PathBuf::from(program);
        if program.is_relative() && basedir.join(&program).exists() {
            program = basedir.join(&program);
        }
        Ok(ExternalPredictor{program, args : words.map(|w| w.to_string()).collect()})
    }

    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// runs the model on one query
    pub fn predict(&self, id : &str, sequence : &[u8], contacts : Option<&ContactMap>) -> Result<Vec<Annotation>> {
        let mut answers = self.predict_batch(&[(id, sequence, contacts)])?;
        Ok(answers.pop().unwrap_or_default())
    } // end of predict


    /// Runs the model once on all `queries`, returns annotations in query order.
    /// Requests are written from a separate thread while the outputs of the model are collected.
    pub fn predict_batch(&self, queries : &[(&str, &[u8], Option<&ContactMap>)]) -> Result<Vec<Vec<Annotation>>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let mut payload = Vec::<u8>::new();
        for (id, sequence, contacts) in queries {
            let sequence = String::from_utf8_lossy(sequence);
            let request = PredictionRequest{id, sequence : &sequence, contacts : contacts.map(|c| c.to_pairs())};
            serde_json::to_writer(&mut payload, &request)?;
            payload.push(b'\n');
        }
        log::debug!("running {:?} on {} queries", self.program, queries.len());
        //
        let mut child = Command::new(&self.program)
                .args(&self.args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| FriError::Prediction(format!("could not execute {:?} : {}", self.program, e)))?;
        let writer = child.stdin.take().map(|mut stdin| std::thread::spawn(move || stdin.write_all(&payload)));
        let output = child.wait_with_output()?;
        let written = match writer {
            Some(handle) => handle.join().map_err(|_| FriError::Prediction(format!("request writer of {:?} panicked", self.program)))?,
            None => Ok(()),
        };
        if !output.status.success() {
            return Err(FriError::Prediction(format!("{:?} failed : {}", self.program, String::from_utf8_lossy(&output.stderr).trim())));
        }
        written.map_err(|e| FriError::Prediction(format!("could not send requests to {:?} : {}", self.program, e)))?;
        //
        let mut answers : Vec<Vec<Annotation>> = vec![Vec::new(); queries.len()];
        let rank : FxHashMap<&str, usize> = queries.iter().enumerate().map(|(i, q)| (q.0, i)).collect();
        for (id, annotation) in parse_annotations(&String::from_utf8_lossy(&output.stdout))? {
            let i = rank.get(id.as_str())
                    .ok_or_else(|| FriError::Prediction(format!("{:?} answered for unknown query {}", self.program, id)))?;
            answers[*i].push(annotation);
        }
        Ok(answers)
    } // end of predict_batch

} // end of impl ExternalPredictor


/// parses `id\tterm\tscore\tannotation` lines, blank lines are ignored
pub fn parse_annotations(text : &str) -> Result<Vec<(String, Annotation)>> {
    let mut annotations = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let fields : Vec<&str> = line.splitn(4, '\t').collect();
        if fields.len() != 4 {
            return Err(FriError::Prediction(format!("bad prediction line : {}", line)));
        }
        let score = fields[2].trim().parse::<f64>()
                .map_err(|e| FriError::Prediction(format!("bad score in {} : {}", line, e)))?;
        annotations.push((fields[0].to_string(), Annotation{term : fields[1].to_string(), score, annotation : fields[3].trim_end().to_string()}));
    }
    Ok(annotations)
} // end of parse_annotations
