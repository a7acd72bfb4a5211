//! Per query choice between the structure aware and the sequence only prediction, and row assembly.
//!
//! A query goes to the graph model when it has a template alignment with a contact map and identity at least
//! the threshold, to the sequence model otherwise. Queries out of length bounds are skipped.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::SystemTime;

use cpu_time::ProcessTime;

use crate::errors::{FriError, Result};
use crate::query::QueryPool;
use crate::structure::ContactMap;
use crate::utils::parameters::PredictionParams;

use super::mode::ProcessingMode;
use super::output::{NetworkType, PredictionRow, PredictionWriter};
use super::predictor::{Annotation, FunctionPredictor, GraphQuery};


/// A query with a usable structural template.
#[derive(Clone, Debug)]
pub struct TemplateAlignment {
    /// template id as reported
    pub template : String,
    pub database : String,
    pub identity : f64,
    /// contact map of query length
    pub contact_map : ContactMap,
}


/// routing decision of a query
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Graph,
    SequenceOnly,
    Skipped,
}


/// counts of a routing run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoutingSummary {
    pub nb_graph : usize,
    pub nb_sequence_only : usize,
    pub nb_skipped : usize,
    /// rows written per mode
    pub rows_by_mode : BTreeMap<ProcessingMode, usize>,
}


pub struct PredictionRouter<'a> {
    predictor : &'a dyn FunctionPredictor,
    params : &'a PredictionParams,
}


impl <'a> PredictionRouter<'a> {

    pub fn new(predictor : &'a dyn FunctionPredictor, params : &'a PredictionParams) -> Self {
        PredictionRouter{predictor, params}
    }

    /// decision for a query of length `query_len`
    pub fn route(&self, query_len : usize, alignment : Option<&TemplateAlignment>) -> Route {
        if !self.params.length.accepts(query_len) {
            return Route::Skipped;
        }
        match alignment {
            Some(aln) if aln.identity >= self.params.identity_threshold && aln.contact_map.get_size() == query_len => Route::Graph,
            _ => Route::SequenceOnly,
        }
    } // end of route


    /// Predicts every query of `queries` for each mode, graph routed queries first, each group by increasing length.
    pub fn run<W : Write>(&self, queries : &QueryPool, alignments : &BTreeMap<String, TemplateAlignment>,
                modes : &[ProcessingMode], writer : &mut PredictionWriter<W>) -> Result<RoutingSummary> {
        let start_t = SystemTime::now();
        let cpu_start = ProcessTime::now();
        //
        let mut ordered : Vec<(&String, &Vec<u8>)> = queries.iter().collect();
        ordered.sort_by(|a, b| a.1.len().cmp(&b.1.len()).then_with(|| a.0.cmp(b.0)));
        //
        let mut graph = Vec::<(&str, &[u8], &TemplateAlignment)>::new();
        let mut sequence_only = Vec::<(&str, &[u8])>::new();
        let mut summary = RoutingSummary::default();
        for (id, seq) in ordered {
            let alignment = alignments.get(id);
            match self.route(seq.len(), alignment) {
                Route::Graph => {
                    if let Some(aln) = alignment {
                        graph.push((id.as_str(), seq.as_slice(), aln));
                    }
                },
                Route::SequenceOnly => sequence_only.push((id.as_str(), seq.as_slice())),
                Route::Skipped => {
                    log::info!("Skipping {}; sequence length {} aa out of bounds", id, seq.len());
                    summary.nb_skipped += 1;
                },
            }
        }
        summary.nb_graph = graph.len();
        summary.nb_sequence_only = sequence_only.len();
        //
        for (rank, mode) in modes.iter().enumerate() {
            log::info!("Processing mode: {}; {}/{}", mode.description(), rank + 1, modes.len());
            let mut nb_rows = 0;
            log::info!("Predicting with graph model : {} proteins", graph.len());
            if !graph.is_empty() {
                let requests : Vec<GraphQuery> = graph.iter().map(|(id, seq, aln)| (*id, *seq, &aln.contact_map)).collect();
                let answers = self.predictor.predict_graph_batch(*mode, &requests)?;
                check_answers(answers.len(), graph.len())?;
                for ((id, _, aln), annotations) in graph.iter().zip(answers) {
                    nb_rows += write_rows(writer, id, annotations, NetworkType::Graph, *mode, Some(*aln))?;
                }
            }
            log::info!("Predicting with sequence model : {} proteins", sequence_only.len());
            if !sequence_only.is_empty() {
                let answers = self.predictor.predict_sequence_batch(*mode, &sequence_only)?;
                check_answers(answers.len(), sequence_only.len())?;
                for ((id, _), annotations) in sequence_only.iter().zip(answers) {
                    nb_rows += write_rows(writer, id, annotations, NetworkType::SequenceOnly, *mode, None)?;
                }
            }
            summary.rows_by_mode.insert(*mode, nb_rows);
        }
        //
        log::info!("prediction : {} graph, {} sequence only, {} skipped", summary.nb_graph, summary.nb_sequence_only, summary.nb_skipped);
        log::info!("prediction : cpu time(s) {}", cpu_start.elapsed().as_secs());
        if let Ok(elapsed) = start_t.elapsed() {
            log::info!("prediction : elapsed time(s) {}", elapsed.as_secs());
        }
        Ok(summary)
    } // end of run

} // end of impl PredictionRouter



fn check_answers(nb_answers : usize, nb_queries : usize) -> Result<()> {
    if nb_answers != nb_queries {
        return Err(FriError::Prediction(format!("{} answers for {} queries", nb_answers, nb_queries)));
    }
    Ok(())
}


fn write_rows<W : Write>(writer : &mut PredictionWriter<W>, id : &str, annotations : Vec<Annotation>, network : NetworkType,
            mode : ProcessingMode, alignment : Option<&TemplateAlignment>) -> Result<usize> {
    let nb = annotations.len();
    for a in annotations {
        let row = PredictionRow{protein : id.to_string(), term : a.term, score : a.score, annotation : a.annotation, network, mode,
                    db_hit : alignment.map(|aln| aln.template.clone()), db_name : alignment.map(|aln| aln.database.clone()),
                    identity : alignment.map(|aln| aln.identity)};
        writer.write_row(&row)?;
    }
    Ok(nb)
} // end of write_rows



#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use crate::utils::parameters::LengthFilter;

    // one annotation per call, records calls as (network, mode, id)
    #[derive(Default)]
    struct StubPredictor {
        calls : RefCell<Vec<(&'static str, ProcessingMode, String)>>,
    }

    impl FunctionPredictor for StubPredictor {
        fn predict_graph(&self, mode : ProcessingMode, id : &str, sequence : &[u8], contacts : &ContactMap) -> Result<Vec<Annotation>> {
            assert_eq!(contacts.get_size(), sequence.len());
            self.calls.borrow_mut().push(("graph", mode, id.to_string()));
            Ok(vec![Annotation{term : "GO:1".into(), score : 0.9, annotation : "g".into()}])
        }

        fn predict_sequence(&self, mode : ProcessingMode, id : &str, _sequence : &[u8]) -> Result<Vec<Annotation>> {
            self.calls.borrow_mut().push(("sequence", mode, id.to_string()));
            Ok(vec![Annotation{term : "GO:2".into(), score : 0.4, annotation : "s".into()}])
        }
    }

    fn params() -> PredictionParams {
        PredictionParams{identity_threshold : 0.5, length : LengthFilter::new(Some(3), Some(8)),
                    modes : vec![ProcessingMode::MolecularFunction, ProcessingMode::BiologicalProcess]}
    }

    fn alignment(len : usize, identity : f64) -> TemplateAlignment {
        TemplateAlignment{template : "1abc_A".into(), database : "pdb100".into(), identity, contact_map : ContactMap::empty(len)}
    }

    #[test]
    fn routing_decisions() {
        let stub = StubPredictor::default();
        let params = params();
        let router = PredictionRouter::new(&stub, &params);
        assert_eq!(router.route(5, Some(&alignment(5, 0.5))), Route::Graph);
        assert_eq!(router.route(5, Some(&alignment(5, 0.49))), Route::SequenceOnly);
        assert_eq!(router.route(5, None), Route::SequenceOnly);
        assert_eq!(router.route(2, Some(&alignment(2, 0.9))), Route::Skipped);
        assert_eq!(router.route(9, None), Route::Skipped);
    }

    #[test]
    fn modes_processed_independently() {
        let queries = QueryPool::from_records(vec![
            ("long".to_string(), b"MKVLAAG".to_vec()),
            ("short".to_string(), b"MKVL".to_vec()),
            ("templated".to_string(), b"MKVLA".to_vec()),
            ("tiny".to_string(), b"MK".to_vec()),
        ]).unwrap();
        let mut alignments = BTreeMap::new();
        alignments.insert("templated".to_string(), alignment(5, 0.8));
        let stub = StubPredictor::default();
        let params = params();
        let router = PredictionRouter::new(&stub, &params);
        let mut writer = PredictionWriter::new(Vec::<u8>::new()).unwrap();
        let summary = router.run(&queries, &alignments, &params.modes, &mut writer).unwrap();
        assert_eq!((summary.nb_graph, summary.nb_sequence_only, summary.nb_skipped), (1, 2, 1));
        assert_eq!(summary.rows_by_mode[&ProcessingMode::MolecularFunction], 3);
        assert_eq!(writer.get_nb_rows(), 6);
        let calls = stub.calls.borrow();
        let mf : Vec<(&str, String)> = calls.iter().filter(|c| c.1 == ProcessingMode::MolecularFunction)
                .map(|c| (c.0, c.2.clone())).collect();
        assert_eq!(mf, vec![("graph", "templated".to_string()), ("sequence", "short".to_string()), ("sequence", "long".to_string())]);
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert!(text.contains("templated\tGO:1\t0.9\tg\tgraph\tmf\t1abc_A\tpdb100\t0.8"));
        assert!(text.contains("short\tGO:2\t0.4\ts\tsequence-only\tbp\t\t\t"));
        assert!(!text.contains("tiny"));
    }
}
