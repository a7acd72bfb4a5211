//! Cascade of the query pool through an ordered list of databases.
//!
//! At each stage the remaining queries are searched, one canonical hit is kept per query,
//! the stage table is dumped and aligned queries leave the pool. A query is therefore resolved
//! by the first database giving it a qualifying hit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use cpu_time::ProcessTime;
use serde::Serialize;

use crate::errors::Result;
use crate::query::QueryPool;
use crate::utils::parameters::SearchParams;

use super::database::Database;
use super::hit::{save_hits, select_canonical, AlignmentHit};
use super::SequenceSearch;


/// statistics of one stage, for reporting
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StageReport {
    pub database : String,
    /// queries aligned at this stage
    pub aligned : usize,
    /// queries aligned since the first stage
    pub cumulative : usize,
    /// size of the pool before filtering and searching
    pub nb_queries : usize,
    /// true if the pool was empty and the search was not run
    pub skipped : bool,
    /// stage result table, None when skipped
    pub table : Option<PathBuf>,
}

impl StageReport {
    pub fn percent_stage(&self) -> f64 {
        percent(self.aligned, self.nb_queries)
    }

    pub fn percent_total(&self) -> f64 {
        percent(self.cumulative, self.nb_queries)
    }
} // end of impl StageReport


fn percent(n : usize, total : usize) -> f64 {
    if total == 0 {
        0.
    }
    else {
        (n as f64 / total as f64 * 10000.).round() / 100.
    }
}


/// What the cascade produces : the canonical hit of every resolved query and stage statistics.
/// Queries left in the pool are exhausted.
#[derive(Clone, Debug, Default)]
pub struct SearchOutcome {
    /// canonical hit of resolved queries, keyed by query id
    pub resolved : BTreeMap<String, AlignmentHit>,
    pub stages : Vec<StageReport>,
}

impl SearchOutcome {
    pub fn get_nb_resolved(&self) -> usize {
        self.resolved.len()
    }
}


/// drives a search capability through databases
pub struct HierarchicalSearch<'a, S : SequenceSearch> {
    searcher : &'a S,
    params : SearchParams,
    /// directory receiving `<database>_results.tsv`
    output_dir : PathBuf,
} // end of HierarchicalSearch


impl <'a, S : SequenceSearch> HierarchicalSearch<'a, S> {

    pub fn new(searcher : &'a S, params : SearchParams, output_dir : &Path) -> Self {
        HierarchicalSearch{searcher, params, output_dir : output_dir.to_path_buf()}
    }

    /// Runs stages in database order, shrinking the pool after each one.
    /// A failed stage is returned as an error, tables of previous stages stay on disk.
    pub fn run(&self, pool : &mut QueryPool, databases : &[Database]) -> Result<SearchOutcome> {
        let start_t = SystemTime::now();
        let cpu_start = ProcessTime::now();
        //
        let nb_queries = pool.get_nb_loaded();
        if !self.params.length.is_unset() {
            let removed = pool.filter_by_length(&self.params.length);
            log::info!("length filtering removed {} queries, {} remaining", removed.len(), pool.remaining_count());
        }
        let mut outcome = SearchOutcome::default();
        let mut cumulative = 0;
        //
        for db in databases {
            if pool.is_empty() {
                log::info!("no query left, skipping search against {}", db.name);
                outcome.stages.push(StageReport{database : db.name.clone(), aligned : 0, cumulative, nb_queries,
                        skipped : true, table : None});
                continue;
            }
            log::info!("Aligning {} sequences against {}.", pool.remaining_count(), db.name);
            let candidates = self.searcher.search(pool, db, self.params.get_top_k())?;
            // restrict to queries still in the pool
            let candidates : Vec<AlignmentHit> = candidates.into_iter().filter(|h| pool.contains(&h.query)).collect();
            let canonical = select_canonical(candidates, &self.params);
            let table = save_hits(&self.output_dir, &db.name, &canonical)?;
            //
            let aligned = pool.remove(canonical.keys());
            cumulative += aligned;
            let report = StageReport{database : db.name.clone(), aligned, cumulative, nb_queries, skipped : false, table : Some(table)};
            log::info!("Aligned {}/{} ({:.2}%) proteins against {}.", aligned, nb_queries, report.percent_stage(), db.name);
            log::info!("Aligned {}/{} ({:.2}%) proteins in total.", cumulative, nb_queries, report.percent_total());
            outcome.stages.push(report);
            for (query, hit) in canonical {
                outcome.resolved.entry(query).or_insert(hit);
            }
        }
        //
        log::info!("hierarchical search : {} resolved, {} exhausted", outcome.resolved.len(), pool.remaining_count());
        log::info!("hierarchical search : cpu time(s) {}", cpu_start.elapsed().as_secs());
        if let Ok(elapsed) = start_t.elapsed() {
            log::info!("hierarchical search : elapsed time(s) {}", elapsed.as_secs());
        }
        Ok(outcome)
    } // end of run

} // end of impl HierarchicalSearch



#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use crate::errors::FriError;
    use crate::search::database::StructureSource;

    // answers with a fixed list of queries per database, counts invocations
    struct StubSearch {
        answers : BTreeMap<String, Vec<String>>,
        calls : RefCell<Vec<(String, usize)>>,
        fail_on : Option<String>,
    }

    impl SequenceSearch for StubSearch {
        fn search(&self, queries : &QueryPool, database : &Database, _top_k : usize) -> Result<Vec<AlignmentHit>> {
            self.calls.borrow_mut().push((database.name.clone(), queries.remaining_count()));
            if self.fail_on.as_deref() == Some(database.name.as_str()) {
                return Err(FriError::Search{database : database.name.clone(), msg : "boom".into()});
            }
            let ids = self.answers.get(&database.name).cloned().unwrap_or_default();
            Ok(ids.iter().map(|q| AlignmentHit::new(q, &format!("{}_t", q), 100., 1e-20, 0.9, 0.95, "M", &database.name)).collect())
        }
    }

    fn db(name : &str) -> Database {
        Database::new(name, PathBuf::from(name), StructureSource::PdbDir(PathBuf::from(name)))
    }

    fn pool(n : usize) -> QueryPool {
        QueryPool::from_records((1..=n).map(|i| (format!("q{}", i), b"MKVLA".to_vec()))).unwrap()
    }

    #[test]
    fn empty_pool_skips_search() {
        let dir = tempfile::tempdir().unwrap();
        let mut answers = BTreeMap::new();
        answers.insert("a".to_string(), vec!["q1".to_string(), "q2".to_string()]);
        let stub = StubSearch{answers, calls : RefCell::new(Vec::new()), fail_on : None};
        let search = HierarchicalSearch::new(&stub, SearchParams::default(), dir.path());
        let mut pool = pool(2);
        let outcome = search.run(&mut pool, &[db("a"), db("b"), db("c")]).unwrap();
        assert_eq!(stub.calls.borrow().len(), 1);
        assert!(outcome.stages[1].skipped && outcome.stages[2].skipped);
        assert_eq!(outcome.stages[2].cumulative, 2);
        assert!(pool.is_empty());
    }

    #[test]
    fn already_resolved_queries_not_reported_twice() {
        let dir = tempfile::tempdir().unwrap();
        let mut answers = BTreeMap::new();
        answers.insert("a".to_string(), vec!["q1".to_string()]);
        // the stub ignores the pool and answers q1 again
        answers.insert("b".to_string(), vec!["q1".to_string(), "q2".to_string()]);
        let stub = StubSearch{answers, calls : RefCell::new(Vec::new()), fail_on : None};
        let search = HierarchicalSearch::new(&stub, SearchParams::default(), dir.path());
        let mut pool = pool(3);
        let outcome = search.run(&mut pool, &[db("a"), db("b")]).unwrap();
        assert_eq!(outcome.stages[1].aligned, 1);
        assert_eq!(outcome.resolved["q1"].database, "a");
        assert_eq!(outcome.resolved["q2"].database, "b");
        assert_eq!(*stub.calls.borrow(), vec![("a".to_string(), 3), ("b".to_string(), 2)]);
    }

    #[test]
    fn failed_stage_keeps_previous_tables() {
        let dir = tempfile::tempdir().unwrap();
        let mut answers = BTreeMap::new();
        answers.insert("a".to_string(), vec!["q1".to_string()]);
        let stub = StubSearch{answers, calls : RefCell::new(Vec::new()), fail_on : Some("b".to_string())};
        let search = HierarchicalSearch::new(&stub, SearchParams::default(), dir.path());
        let mut pool = pool(3);
        let res = search.run(&mut pool, &[db("a"), db("b")]);
        assert!(matches!(res, Err(FriError::Search{..})));
        assert!(dir.path().join("a_results.tsv").exists());
        assert!(!dir.path().join("b_results.tsv").exists());
    }

    #[test]
    fn percentages() {
        let report = StageReport{database : "a".into(), aligned : 1, cumulative : 2, nb_queries : 3, skipped : false, table : None};
        assert!((report.percent_stage() - 33.33).abs() < 1e-9);
        assert!((report.percent_total() - 66.67).abs() < 1e-9);
    }
}
