use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pepmap::config::{CorpusConfig, DisallowedPolicy, IndexConfig, MatchingType, SearchConfig};
use pepmap::index::{FmIndex, IndexBuilder, IndexMeta};
use pepmap::io::fasta;
use pepmap::io::peptides::PeptideReader;
use pepmap::search::CleavageFilter;
use pepmap::PeptideMapper;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "pepmap", author, version, about = "Map peptides to proteins with an FM index", arg_required_else_help = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build an FM index of a protein FASTA file
    Index {
        /// Protein FASTA file
        reference: String,
        /// Output prefix for the index file (<prefix>.fm)
        #[arg(short, long, default_value = "proteins")]
        output: String,
        /// Suffix array sampling rate (text positions)
        #[arg(long = "sa-rate", default_value_t = 16)]
        sa_rate: u32,
        /// Occ checkpoint interval (BWT rows)
        #[arg(long = "occ-interval", default_value_t = 64)]
        occ_interval: u32,
        /// Longest accepted protein
        #[arg(long = "max-seq-len", default_value_t = 100_000)]
        max_seq_len: usize,
        /// Handling of symbols outside the residue alphabet
        #[arg(long = "unknown", value_enum, default_value_t = DisallowedPolicy::MapToUnknown)]
        unknown: DisallowedPolicy,
    },
    /// Map peptides against an index and write TSV
    Map {
        /// Path to FM index (.fm)
        #[arg(short = 'i', long = "index")]
        index: String,
        /// Peptide list, one per line
        peptides: String,
        /// Output TSV path (stdout if omitted)
        #[arg(short, long)]
        out: Option<String>,
        /// Maximum number of substitutions
        #[arg(short = 'k', long = "substitutions", default_value_t = 0)]
        substitutions: u32,
        #[arg(long = "matching", value_enum, default_value_t = MatchingType::Indistinguishable)]
        matching: MatchingType,
        /// Maximum share of X positions in a match
        #[arg(long = "limit-x", default_value_t = 0.25)]
        limit_x: f64,
        /// Keep matches regardless of their share of X positions
        #[arg(long = "no-limit-x", conflicts_with = "limit_x")]
        no_limit_x: bool,
        /// Report the residues flanking each match
        #[arg(short, long)]
        flanking: bool,
        /// Only keep matches at tryptic cleavage sites
        #[arg(long)]
        tryptic: bool,
        #[arg(long = "max-query-len", default_value_t = 1_000)]
        max_query_len: usize,
        /// Query cache capacity (0 disables the cache)
        #[arg(long = "cache-size", default_value_t = 10_000)]
        cache_size: usize,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("pepmap=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pepmap=info,warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();

    match cli.command {
        Commands::Index { reference, output, sa_rate, occ_interval, max_seq_len, unknown } => {
            let corpus_cfg = CorpusConfig { max_sequence_len: max_seq_len, disallowed: unknown };
            let index_cfg = IndexConfig { sa_sample_rate: sa_rate, occ_interval, ..IndexConfig::default() };
            run_index(&reference, &output, corpus_cfg, index_cfg)
        }
        Commands::Map {
            index,
            peptides,
            out,
            substitutions,
            matching,
            limit_x,
            no_limit_x,
            flanking,
            tryptic,
            max_query_len,
            cache_size,
            threads,
        } => {
            let cfg = SearchConfig {
                max_query_len,
                max_substitutions: substitutions,
                max_x_fraction: x_fraction_limit(limit_x, no_limit_x),
                matching,
                cache_capacity: NonZeroUsize::new(cache_size),
            };
            let opt = MapOpt { substitutions, flanking, tryptic, threads };
            run_map(&index, &peptides, out.as_deref(), cfg, opt)
        }
    }
}

fn x_fraction_limit(limit_x: f64, disabled: bool) -> Option<f64> {
    if disabled {
        None
    } else {
        Some(limit_x)
    }
}

fn run_index(reference: &str, output: &str, corpus_cfg: CorpusConfig, index_cfg: IndexConfig) -> Result<()> {
    let corpus = fasta::read_corpus(reference, corpus_cfg)
        .with_context(|| format!("cannot read reference FASTA '{}'", reference))?;

    println!("reference: {}", reference);
    println!("proteins: {}", corpus.num_sequences());
    println!("residues: {}", corpus.residue_count());

    let mut fm = IndexBuilder::new(index_cfg).build(&corpus)?;
    fm.set_meta(IndexMeta {
        reference_file: Some(reference.to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });

    let out_path = format!("{}.fm", output);
    fm.save_to_file(&out_path).with_context(|| format!("cannot write index to '{}'", out_path))?;
    println!("FM index saved: {}", out_path);
    Ok(())
}

struct MapOpt {
    substitutions: u32,
    flanking: bool,
    tryptic: bool,
    threads: usize,
}

fn run_map(index_path: &str, peptides_path: &str, out_path: Option<&str>, cfg: SearchConfig, opt: MapOpt) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(opt.threads.max(1))
        .build_global()
        .context("cannot configure thread pool")?;

    let fm = FmIndex::load_from_file(index_path).with_context(|| format!("cannot load index '{}'", index_path))?;
    info!(
        proteins = fm.proteins().len(),
        built = fm.meta().build_timestamp.as_deref().unwrap_or("unknown"),
        "index loaded"
    );
    let fm = Arc::new(fm);
    let mut mapper = PeptideMapper::new(Arc::clone(&fm), cfg)?;
    if opt.tryptic {
        mapper = mapper.with_filter(CleavageFilter::trypsin());
    }

    let fh = std::fs::File::open(peptides_path).with_context(|| format!("cannot open peptides '{}'", peptides_path))?;
    let peptides = PeptideReader::new(std::io::BufReader::new(fh)).read_all()?;
    let queries: Vec<&str> = peptides.iter().map(|(_, p)| p.as_str()).collect();
    let results = mapper.search_batch(&queries, opt.substitutions);

    let mut out: Box<dyn Write> = if let Some(p) = out_path {
        Box::new(std::io::BufWriter::new(std::fs::File::create(p)?))
    } else {
        Box::new(std::io::BufWriter::new(std::io::stdout()))
    };

    write!(out, "peptide\tmatched\taccession\toffset\tsubstitutions")?;
    if opt.flanking {
        write!(out, "\tbefore\tafter")?;
    }
    writeln!(out)?;

    let mut n_mapped = 0usize;
    for ((line, peptide), res) in peptides.iter().zip(results) {
        let matches = match res {
            Ok(m) => m,
            Err(e) => {
                warn!(line, peptide = %peptide, "skipping query: {}", e);
                continue;
            }
        };
        if !matches.is_empty() {
            n_mapped += 1;
        }
        for m in matches.iter() {
            write!(out, "{}\t{}\t{}\t{}\t{}", peptide, m.matched, m.sequence_id, m.offset, m.substitutions)?;
            if opt.flanking {
                let (before, after) = fm.flanking(m.sequence_index, m.offset, m.matched.len());
                let show = |r: Option<u8>| r.map_or('-', char::from);
                write!(out, "\t{}\t{}", show(before), show(after))?;
            }
            writeln!(out)?;
        }
    }
    out.flush()?;

    info!(queries = peptides.len(), mapped = n_mapped, "mapping finished");
    if let Some(stats) = mapper.cache_stats() {
        info!(hits = stats.hits, computations = stats.computations, "query cache");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_limit(args: &[&str]) -> Option<f64> {
        let mut argv = vec!["pepmap", "map", "-i", "proteins.fm", "peptides.txt"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Map { limit_x, no_limit_x, .. } => x_fraction_limit(limit_x, no_limit_x),
            Commands::Index { .. } => panic!("expected map"),
        }
    }

    #[test]
    fn x_limit_defaults_and_can_be_disabled() {
        assert_eq!(map_limit(&[]), Some(0.25));
        assert_eq!(map_limit(&["--limit-x", "0.5"]), Some(0.5));
        assert_eq!(map_limit(&["--no-limit-x"]), None);
    }

    #[test]
    fn x_limit_flags_conflict() {
        let argv = ["pepmap", "map", "-i", "p.fm", "q.txt", "--limit-x", "0.5", "--no-limit-x"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
