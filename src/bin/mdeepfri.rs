// MDEEPFRI v0.1.0
// Licensed under the MIT license (http://opensource.org/licenses/MIT).
// This file may not be copied, modified, or distributed except according to those terms.


//! mdeepfri predict --input queries.faa --databases databases.json --weights dir --output dir \[options\]
//!
//! --input [-i] : fasta file of query proteins (possibly gzipped)
//!
//! --databases [-d] : json file listing databases in search order, each with its mmseqs index
//!     and its structures (`{"pdb_dir" : path}` or `{"archive" : path}` for a FoldComp archive)
//!
//! --weights [-w] : directory containing model_config.json, giving for each mode the graph and sequence model commands
//!
//! --output [-o] : output directory. Receives one `<database>_results.tsv` per searched database,
//!     results.tsv with predictions and parameters.json
//!
//! --processing-modes [-p] : any of bp cc ec mf, default all
//!
//! A database without `search_index` gets one built next to its structures. --overwrite rebuilds existing indexes.
//!
//! mdeepfri search runs the hierarchical database search alone, with the same search options.
//!
//! --debug sets log level to debug when RUST_LOG is not set.

use std::path::PathBuf;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use env_logger::Builder;
use std::str::FromStr;

use mdeepfri::pipeline::{hierarchical_database_search, predict_protein_function, RunPaths};
use mdeepfri::predict::ProcessingMode;
use mdeepfri::utils::parameters::*;


// install a logger facility
pub fn init_log(debug : bool) -> u64 {
    let mut builder = Builder::from_default_env();
    if debug && std::env::var("RUST_LOG").is_err() {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
    println!("\n ************** initializing logger *****************\n");
    1
}


fn get_value<T : Clone + Send + Sync + 'static>(matches : &ArgMatches, id : &str) -> anyhow::Result<T> {
    matches.get_one::<T>(id).cloned().with_context(|| format!("missing argument {}", id))
}


fn get_path(matches : &ArgMatches, id : &str) -> anyhow::Result<PathBuf> {
    get_value::<String>(matches, id).map(PathBuf::from)
}


// options shared by predict and search
fn search_args() -> Vec<Arg> {
    vec![
        Arg::new("input")
            .short('i')
            .long("input")
            .help("fasta file of query sequences")
            .required(true)
            .value_parser(value_parser!(String)),
        Arg::new("databases")
            .short('d')
            .long("databases")
            .help("json list of databases, searched in order")
            .required(true)
            .value_parser(value_parser!(String)),
        Arg::new("output")
            .short('o')
            .long("output")
            .help("output directory")
            .required(true)
            .value_parser(value_parser!(String)),
        Arg::new("min_bits")
            .long("min-bits")
            .help("minimal bit score of a hit")
            .value_parser(value_parser!(f64)),
        Arg::new("max_evalue")
            .long("max-evalue")
            .help("maximal e-value of a hit")
            .default_value("0.001")
            .value_parser(value_parser!(f64)),
        Arg::new("min_identity")
            .long("min-identity")
            .help("minimal sequence identity (0-1) of a hit")
            .default_value("0.5")
            .value_parser(value_parser!(f64)),
        Arg::new("min_coverage")
            .long("min-coverage")
            .help("minimal query coverage (0-1) of a hit")
            .default_value("0.0")
            .value_parser(value_parser!(f64)),
        Arg::new("top_k")
            .long("top-k")
            .help("number of candidate hits per query and database")
            .default_value("30")
            .value_parser(value_parser!(usize)),
        Arg::new("threads")
            .short('t')
            .long("threads")
            .help("number of threads, default all cores")
            .value_parser(value_parser!(usize)),
        Arg::new("keep_intermediate")
            .long("keep-intermediate")
            .help("keep scratch files of external tools")
            .action(ArgAction::SetTrue),
        Arg::new("overwrite")
            .long("overwrite")
            .help("rebuild search indexes of databases even if they exist")
            .action(ArgAction::SetTrue),
    ]
} // end of search_args


fn parse_search_params(matches : &ArgMatches, length : LengthFilter) -> anyhow::Result<SearchParams> {
    let threads = matches.get_one::<usize>("threads").copied().unwrap_or_else(num_cpus::get);
    Ok(SearchParams{
        length,
        min_bits : matches.get_one::<f64>("min_bits").copied(),
        max_eval : get_value(matches, "max_evalue")?,
        min_ident : get_value(matches, "min_identity")?,
        min_coverage : get_value(matches, "min_coverage")?,
        top_k : get_value(matches, "top_k")?,
        threads,
    })
} // end of parse_search_params


fn parse_predict(matches : &ArgMatches) -> anyhow::Result<()> {
    log::debug!("in parse_predict");
    let paths = RunPaths{input : get_path(matches, "input")?, databases : get_path(matches, "databases")?,
                weights : get_path(matches, "weights")?, output : get_path(matches, "output")?};
    //
    let mut modes = Vec::<ProcessingMode>::new();
    if let Some(names) = matches.get_many::<String>("processing_modes") {
        for name in names {
            modes.push(ProcessingMode::from_str(name).map_err(|_| anyhow::anyhow!("unknown processing mode {}", name))?);
        }
    }
    else {
        modes = ProcessingMode::all();
    }
    let length = LengthFilter::new(Some(get_value(matches, "min_length")?), Some(get_value(matches, "max_length")?));
    let search = parse_search_params(matches, length)?;
    let contact = ContactParams::new(get_value(matches, "angstrom_contact_thresh")?, get_value(matches, "generate_contacts")?)
            .with_gap_penalties(get_value(matches, "alignment_gap_open")?, get_value(matches, "alignment_gap_extend")?);
    let prediction = PredictionParams{identity_threshold : get_value(matches, "alignment_min_identity")?, length, modes};
    let mut params = PipelineParams::new(search, contact, prediction, matches.get_flag("keep_intermediate"));
    params.overwrite = matches.get_flag("overwrite");
    log::info!("parameters : {:?}", params);
    //
    let summary = predict_protein_function(&paths, &params)?;
    for stage in &summary.stages {
        println!("{} : aligned {} ({:.2}%), total {} ({:.2}%)", stage.database, stage.aligned, stage.percent_stage(),
                    stage.cumulative, stage.percent_total());
    }
    println!("predictions written in {:?}", summary.results);
    Ok(())
} // end of parse_predict


fn parse_search(matches : &ArgMatches) -> anyhow::Result<()> {
    log::debug!("in parse_search");
    let length = LengthFilter::new(matches.get_one::<usize>("min_length").copied(), matches.get_one::<usize>("max_length").copied());
    let search = parse_search_params(matches, length)?;
    let mut params = PipelineParams::new(search, ContactParams::default(), PredictionParams::default(), matches.get_flag("keep_intermediate"));
    params.overwrite = matches.get_flag("overwrite");
    let outcome = hierarchical_database_search(&get_path(matches, "input")?, &get_path(matches, "databases")?,
                &get_path(matches, "output")?, &params)?;
    println!("{} queries resolved", outcome.get_nb_resolved());
    Ok(())
} // end of parse_search



fn main() {
    let predict_cmd = Command::new("predict")
        .about("Search templates for queries and predict their function with graph or sequence models")
        .args(search_args())
        .arg(Arg::new("weights")
            .short('w')
            .long("weights")
            .help("directory containing model_config.json")
            .required(true)
            .value_parser(value_parser!(String)))
        .arg(Arg::new("processing_modes")
            .short('p')
            .long("processing-modes")
            .help("processing modes among bp, cc, ec, mf")
            .num_args(1..)
            .value_parser(["bp", "cc", "ec", "mf"]))
        .arg(Arg::new("angstrom_contact_thresh")
            .long("angstrom-contact-thresh")
            .help("distance (Angstrom) between C-alpha atoms of residues in contact")
            .default_value("6.0")
            .value_parser(value_parser!(f64)))
        .arg(Arg::new("generate_contacts")
            .long("generate-contacts")
            .help("longest template gap bridged in contact maps")
            .default_value("2")
            .value_parser(value_parser!(usize)))
        .arg(Arg::new("alignment_gap_open")
            .long("alignment-gap-open")
            .help("gap open penalty when template sequences are aligned on their structure")
            .default_value("10")
            .value_parser(value_parser!(f64)))
        .arg(Arg::new("alignment_gap_extend")
            .long("alignment-gap-extend")
            .help("gap extension penalty of the same alignment")
            .default_value("1")
            .value_parser(value_parser!(f64)))
        .arg(Arg::new("alignment_min_identity")
            .long("alignment-min-identity")
            .help("minimal identity of the template alignment for graph prediction")
            .default_value("0.5")
            .value_parser(value_parser!(f64)))
        .arg(Arg::new("min_length")
            .long("min-length")
            .help("shorter queries are skipped")
            .default_value("60")
            .value_parser(value_parser!(usize)))
        .arg(Arg::new("max_length")
            .long("max-length")
            .help("longer queries are skipped")
            .default_value("1000")
            .value_parser(value_parser!(usize)));

    let search_cmd = Command::new("search")
        .about("Hierarchical search of queries against databases, without prediction")
        .args(search_args())
        .arg(Arg::new("min_length")
            .long("min-length")
            .help("shorter queries are not searched")
            .value_parser(value_parser!(usize)))
        .arg(Arg::new("max_length")
            .long("max-length")
            .help("longer queries are not searched")
            .value_parser(value_parser!(usize)));

    let matches = Command::new("mdeepfri")
        .version("0.1.0")
        .about("Protein function prediction with template contact maps")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(Arg::new("debug")
            .long("debug")
            .help("debug level logging")
            .global(true)
            .action(ArgAction::SetTrue))
        .subcommand(predict_cmd)
        .subcommand(search_cmd)
        .get_matches();
    //
    let _ = init_log(matches.get_flag("debug"));
    let start_t = chrono::Local::now();
    log::info!("\n mdeepfri begins at time:{:#?} \n ", start_t);
    //
    let res = match matches.subcommand() {
        Some(("predict", sub_m)) => parse_predict(sub_m),
        Some(("search", sub_m)) => parse_search(sub_m),
        _ => Err(anyhow::anyhow!("unknown subcommand")),
    };
    //
    let end_t = chrono::Local::now();
    log::info!("\n mdeepfri ends at time:{:#?} \n ", end_t);
    if let Err(e) = res {
        log::error!("mdeepfri failed : {:#}", e);
        eprintln!("error : {:#}", e);
        std::process::exit(1);
    }
} // end of main
