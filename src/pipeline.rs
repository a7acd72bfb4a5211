//! The whole run : load queries, cascade through databases, align resolved queries on their template,
//! route every query to a model and write `results.tsv`.
//!
//! Each stage hands an immutable result to the next one. Template alignment is the only parallel stage,
//! its results are collected by query id.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use cpu_time::ProcessTime;
use rayon::prelude::*;

use crate::errors::{FriError, Result};
use crate::predict::{FunctionPredictor, ModelRegistry, PredictionRouter, PredictionWriter, ProcessingMode,
            RoutingSummary, TemplateAlignment};
use crate::query::QueryPool;
use crate::search::{load_databases, AlignmentHit, Database, HierarchicalSearch, MmseqsSearch, SearchOutcome,
            SequenceSearch, StageReport};
use crate::structure::{build_contact_map, open_source, register_on_structure, CoordinateSource, ResidueCorrespondence};
use crate::utils::files::{ensure_dir, is_fasta_file, remove_scratch};
use crate::utils::parameters::{ContactParams, PipelineParams};


/// name of the prediction table in the output directory
pub const RESULTS_FILE : &str = "results.tsv";

// scratch directory of external tools, inside the output directory
const INTERMEDIATE_DIR : &str = "intermediate";


/// input and output locations of a run
#[derive(Clone, Debug)]
pub struct RunPaths {
    /// fasta file of queries
    pub input : PathBuf,
    /// json list of databases, in search order
    pub databases : PathBuf,
    /// weights directory holding `model_config.json`
    pub weights : PathBuf,
    pub output : PathBuf,
}


/// what a run did
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub nb_queries : usize,
    pub stages : Vec<StageReport>,
    pub nb_aligned_templates : usize,
    pub routing : RoutingSummary,
    pub results : PathBuf,
}



// structure aware alignment of one resolved query
fn align_on_template(query : &[u8], hit : &AlignmentHit, database : &Database, source : &dyn CoordinateSource,
            params : &ContactParams) -> Result<TemplateAlignment> {
    let template = source.template(&hit.target)?;
    let correspondence = match &hit.target_sequence {
        // residues missing from the structure are removed from the alignment before coordinates are attached
        Some(indexed) if *indexed != template.sequence => {
            let on_index = ResidueCorrespondence::from_local_alignment(query, indexed, &hit.operations,
                        hit.query_start, hit.target_start)?;
            register_on_structure(&on_index, indexed, &template.sequence, params)?
        },
        _ => ResidueCorrespondence::from_local_alignment(query, &template.sequence, &hit.operations,
                        hit.query_start, hit.target_start)?,
    };
    let contact_map = build_contact_map(&template.coords, &correspondence, params)?;
    log::trace!("{} on {} : {} columns, residue identity {:.3}", hit.query, hit.target, correspondence.len(),
            correspondence.query_identity());
    Ok(TemplateAlignment{template : database.target_name(&hit.target).to_string(), database : database.name.clone(),
            identity : hit.identity, contact_map : contact_map.project_to_query(&correspondence)})
} // end of align_on_template



/// Builds the contact map of every resolved query from its canonical hit, on a pool of `threads` workers.
/// Per query failures (missing structure or chain, alignment not fitting the template) only drop the query
/// from the result, it will go the sequence only way.
pub fn align_templates(queries : &QueryPool, resolved : &BTreeMap<String, AlignmentHit>, databases : &[Database],
            params : &ContactParams, threads : usize, workdir : &Path, keep_intermediate : bool) -> Result<BTreeMap<String, TemplateAlignment>> {
    let start_t = SystemTime::now();
    let cpu_start = ProcessTime::now();
    //
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads.max(1)).build()
            .map_err(|e| FriError::Config(format!("could not build thread pool : {}", e)))?;
    let mut alignments = BTreeMap::<String, TemplateAlignment>::new();
    let mut nb_demoted = 0;
    //
    for database in databases {
        let hits : Vec<&AlignmentHit> = resolved.values().filter(|h| h.database == database.name).collect();
        if hits.is_empty() {
            continue;
        }
        log::info!("aligning {} queries on templates of {}", hits.len(), database.name);
        let mut source = open_source(database, workdir, threads, keep_intermediate);
        let mut targets : Vec<String> = hits.iter().map(|h| h.target.clone()).collect();
        targets.sort_unstable();
        targets.dedup();
        if let Err(e) = source.prepare(&targets) {
            if !e.is_per_query() {
                return Err(e);
            }
            log::warn!("structures of {} unavailable ({}), {} queries demoted to sequence only prediction", database.name, e, hits.len());
            nb_demoted += hits.len();
            continue;
        }
        let source : &dyn CoordinateSource = source.as_ref();
        let results : Vec<(String, Result<TemplateAlignment>)> = pool.install(|| {
            hits.par_iter()
                .map(|hit| {
                    let aligned = match queries.get(&hit.query) {
                        Some(seq) => align_on_template(seq, hit, database, source, params),
                        None => Err(FriError::NotFound(format!("query {}", hit.query))),
                    };
                    (hit.query.clone(), aligned)
                })
                .collect()
        });
        // keyed by query id, completion order does not matter
        for (query, aligned) in results {
            match aligned {
                Ok(aln) => {
                    alignments.insert(query, aln);
                },
                Err(e) if e.is_per_query() => {
                    log::warn!("query {} demoted to sequence only prediction : {}", query, e);
                    nb_demoted += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }
    //
    log::info!("template alignment : {} contact maps, {} queries demoted", alignments.len(), nb_demoted);
    log::info!("template alignment : cpu time(s) {}", cpu_start.elapsed().as_secs());
    if let Ok(elapsed) = start_t.elapsed() {
        log::info!("template alignment : elapsed time(s) {}", elapsed.as_secs());
    }
    Ok(alignments)
} // end of align_templates



// every database is made searchable before the first stage
fn prepare_databases<S : SequenceSearch>(searcher : &S, databases : &[Database], overwrite : bool) -> Result<()> {
    for db in databases {
        searcher.prepare_database(db, overwrite)?;
    }
    Ok(())
}


/// Runs search, template alignment and prediction with the given capabilities.
/// `queries` is the loaded pool, `modes` the already validated processing modes.
pub fn run_pipeline<S : SequenceSearch>(queries : QueryPool, databases : &[Database], searcher : &S, predictor : &dyn FunctionPredictor,
            modes : &[ProcessingMode], params : &PipelineParams, output : &Path) -> Result<RunSummary> {
    let workdir = output.join(INTERMEDIATE_DIR);
    let nb_queries = queries.get_nb_loaded();
    // the router sees every query, the search pool shrinks
    let mut pool = queries.clone();
    prepare_databases(searcher, databases, params.overwrite)?;
    let outcome = HierarchicalSearch::new(searcher, params.search, output).run(&mut pool, databases)?;
    log::info!("{} queries without template after {} databases", pool.remaining_count(), databases.len());
    //
    let alignments = align_templates(&queries, &outcome.resolved, databases, &params.contact, params.search.get_threads(),
                &workdir, params.keep_intermediate)?;
    //
    let results = output.join(RESULTS_FILE);
    let mut writer = PredictionWriter::create(&results)?;
    let router = PredictionRouter::new(predictor, &params.prediction);
    let routing = router.run(&queries, &alignments, modes, &mut writer)?;
    log::info!("{} prediction rows written in {:?}", writer.get_nb_rows(), results);
    writer.finish()?;
    //
    if !params.keep_intermediate {
        remove_scratch(&workdir);
    }
    Ok(RunSummary{nb_queries, stages : outcome.stages, nb_aligned_templates : alignments.len(), routing, results})
} // end of run_pipeline



// configuration checks done before any work
fn load_run_config(input : &Path, databases : &Path, output : &Path) -> anyhow::Result<Vec<Database>> {
    if !input.is_file() {
        return Err(FriError::Config(format!("query file {:?} not found", input)).into());
    }
    if !is_fasta_file(input) {
        log::warn!("query file {:?} has no fasta extension, parsing anyway", input);
    }
    let loaded = load_databases(databases).with_context(|| format!("loading databases from {:?}", databases))?;
    for db in &loaded {
        db.check()?;
    }
    ensure_dir(output).with_context(|| format!("creating output directory {:?}", output))?;
    Ok(loaded)
}


/// Full prediction run with mmseqs search and external models.
pub fn predict_protein_function(paths : &RunPaths, params : &PipelineParams) -> anyhow::Result<RunSummary> {
    let start_t = SystemTime::now();
    let cpu_start = ProcessTime::now();
    //
    params.prediction.check()?;
    let registry = ModelRegistry::load(&paths.weights).with_context(|| format!("loading models from {:?}", paths.weights))?;
    let modes = registry.resolve_modes(&params.prediction.modes)?;
    log::info!("processing modes : {:?}", modes.iter().map(|m| m.to_string()).collect::<Vec<String>>());
    let databases = load_run_config(&paths.input, &paths.databases, &paths.output)?;
    params.dump_json(&paths.output)?;
    //
    let queries = QueryPool::load(&paths.input).with_context(|| format!("loading queries from {:?}", paths.input))?;
    let searcher = MmseqsSearch::new(&paths.output.join(INTERMEDIATE_DIR), params.search.max_eval, params.search.get_threads(),
                params.keep_intermediate);
    let summary = run_pipeline(queries, &databases, &searcher, &registry, &modes, params, &paths.output)?;
    //
    log::info!("predict_protein_function : {} queries, {} with template contact map, {} graph, {} sequence only, {} skipped",
            summary.nb_queries, summary.nb_aligned_templates, summary.routing.nb_graph, summary.routing.nb_sequence_only,
            summary.routing.nb_skipped);
    log::info!("predict_protein_function : cpu time(s) {}", cpu_start.elapsed().as_secs());
    if let Ok(elapsed) = start_t.elapsed() {
        log::info!("predict_protein_function : elapsed time(s) {}", elapsed.as_secs());
    }
    Ok(summary)
} // end of predict_protein_function


/// Hierarchical search alone, leaves one `<database>_results.tsv` per database in the output directory.
pub fn hierarchical_database_search(input : &Path, databases : &Path, output : &Path, params : &PipelineParams) -> anyhow::Result<SearchOutcome> {
    let databases = load_run_config(input, databases, output)?;
    params.dump_json(output)?;
    let mut pool = QueryPool::load(input).with_context(|| format!("loading queries from {:?}", input))?;
    let workdir = output.join(INTERMEDIATE_DIR);
    let searcher = MmseqsSearch::new(&workdir, params.search.max_eval, params.search.get_threads(), params.keep_intermediate);
    prepare_databases(&searcher, &databases, params.overwrite)?;
    let outcome = HierarchicalSearch::new(&searcher, params.search, output).run(&mut pool, &databases)?;
    if !params.keep_intermediate {
        remove_scratch(&workdir);
    }
    Ok(outcome)
} // end of hierarchical_database_search
