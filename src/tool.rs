// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! CLI tool for exploring size-tiered compaction decisions

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use humansize::{SizeFormatter, BINARY};
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stcs::compaction::{
    pruned_buckets_and_hotness, CompactionStrategy, MergeTask, Merger, SizeTiered,
    SizeTieredOptions, WorkerPool, DEFAULT_BUCKET_HIGH, DEFAULT_BUCKET_LOW,
};
use stcs::{CompactionLog, Config, ReadMeter, Table, Thresholds};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};

    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};
}

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

pub fn init_tracing(quiet: bool, verbose: u8) -> (bool, LevelFilter) {
    let is_verbose = !quiet && verbose > 0;

    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // Bridge log crate macros to tracing (for library code that uses log::*)
    tracing_log::LogTracer::init().expect("Failed to set log tracer");

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("STCS_LOG")
        .from_env_lossy();

    let subscriber = Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        die!("INTERNAL ERROR: setting default tracing::subscriber failed");
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing_panic::panic_hook(info);
        prev_hook(info); // daisy-chain to old panic hook
    }));

    (is_verbose, level_filter)
}

fn parse_size_as_u64(s: &str) -> Result<u64, String> {
    parse_size::Config::new()
        .with_binary()
        .parse_size(s)
        .map_err(|e| e.to_string())
}

fn format_size(bytes: u64) -> String {
    SizeFormatter::new(bytes, BINARY).to_string()
}

/// CLI tool for exploring size-tiered compaction decisions
#[derive(Parser, Debug)]
#[command(name = "stcs")]
#[command(about = "CLI tool for exploring size-tiered compaction decisions")]
struct ToolArgs {
    /// Suppress all output except for errors. This overrides the -v flag.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Args, Debug, Clone)]
struct StrategyArgs {
    /// Lower similarity ratio of a bucket
    #[arg(long, default_value_t = DEFAULT_BUCKET_LOW)]
    bucket_low: f64,

    /// Upper similarity ratio of a bucket
    #[arg(long, default_value_t = DEFAULT_BUCKET_HIGH)]
    bucket_high: f64,

    /// Tables below this size are bucketed together (e.g., "50MiB")
    #[arg(long, default_value = "50MiB", value_parser = parse_size_as_u64, value_name = "SIZE")]
    min_sstable_size: u64,

    /// Minimum number of tables in a compaction
    #[arg(long, default_value_t = stcs::DEFAULT_MIN_THRESHOLD)]
    min_threshold: usize,

    /// Maximum number of tables in a compaction
    #[arg(long, default_value_t = stcs::DEFAULT_MAX_THRESHOLD)]
    max_threshold: usize,
}

impl StrategyArgs {
    fn build(&self) -> stcs::Result<(SizeTiered, Thresholds)> {
        let options =
            SizeTieredOptions::new(self.bucket_low, self.bucket_high, self.min_sstable_size)?;
        let thresholds = Thresholds::new(self.min_threshold, self.max_threshold)?;
        Ok((SizeTiered::new(options), thresholds))
    }
}

#[derive(Subcommand, Debug, Clone)]
enum ToolCommand {
    /// Show buckets and the compaction choice for a list of tables
    ///
    /// Reads one table per line: `SIZE [READS_PER_SECOND]`, `#` starts a comment.
    Plan {
        /// Table list (reads stdin if omitted)
        file: Option<PathBuf>,

        #[command(flatten)]
        strategy: StrategyArgs,
    },

    /// Run a controller through a series of flushes with simulated merges
    Simulate {
        /// Number of flushes
        #[arg(short = 'n', long, default_value_t = 100)]
        flushes: usize,

        /// Size of each flushed table (e.g., "4MiB")
        #[arg(long, default_value = "4MiB", value_parser = parse_size_as_u64, value_name = "SIZE")]
        flush_size: u64,

        /// Number of merge threads
        #[arg(long, default_value_t = 2)]
        threads: usize,

        /// Directory to write a compaction log into
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,

        #[command(flatten)]
        strategy: StrategyArgs,
    },
}

fn parse_tables<R: BufRead>(reader: R) -> Result<Vec<Table>, String> {
    let mut tables = vec![];

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| e.to_string())?;
        let line = line.split('#').next().unwrap_or_default().trim();

        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();

        let size = parts
            .next()
            .map(parse_size_as_u64)
            .transpose()
            .map_err(|e| format!("line {}: {e}", idx + 1))?
            .unwrap_or_default();

        let rate = parts
            .next()
            .map(str::parse::<f64>)
            .transpose()
            .map_err(|e| format!("line {}: {e}", idx + 1))?
            .unwrap_or_default();

        let id = tables.len() as u64;
        tables.push(Table::with_read_meter(
            id,
            size,
            ReadMeter::restored(rate, rate),
        ));
    }

    // Same order the controller feeds the strategy
    tables.sort_by_key(|t| (t.size_on_disk(), t.id()));

    Ok(tables)
}

fn plan(file: Option<PathBuf>, args: &StrategyArgs) {
    let (strategy, thresholds) = match args.build() {
        Ok(x) => x,
        Err(e) => die!("Invalid options: {}", e),
    };

    let tables = match file {
        Some(path) => match std::fs::File::open(&path) {
            Ok(f) => parse_tables(BufReader::new(f)),
            Err(e) => die!("Could not open {}: {}", path.display(), e),
        },
        None => parse_tables(io::stdin().lock()),
    };

    let tables = match tables {
        Ok(tables) => tables,
        Err(e) => die!("Invalid table list: {}", e),
    };

    let total = tables.iter().map(Table::size_on_disk).sum::<u64>();
    println!("tables: {} ({})", tables.len(), format_size(total));

    let buckets = strategy.buckets(&tables);

    println!("buckets:");
    for (idx, bucket) in buckets.iter().enumerate() {
        println!(
            "  #{idx}: {} tables, avg {}: {:?}",
            bucket.len(),
            format_size(bucket.average_size()),
            bucket.iter().map(Table::id).collect::<Vec<_>>(),
        );
    }

    let ranked = pruned_buckets_and_hotness(
        buckets,
        thresholds.min_threshold(),
        thresholds.max_threshold(),
    );

    println!("actionable:");
    for (idx, bucket) in ranked.iter().enumerate() {
        println!(
            "  #{idx}: hotness {:.3}, {} tables, avg {}",
            bucket.hotness,
            bucket.tables.len(),
            format_size(bucket.average_size),
        );
    }

    match ranked.first() {
        Some(top) => println!(
            "chosen: {:?}",
            top.tables.iter().map(Table::id).collect::<Vec<_>>()
        ),
        None => println!("chosen: nothing"),
    }

    println!(
        "pending: {}",
        strategy.estimated_pending(&tables, &thresholds)
    );
}

/// Pretends to merge tables, writing one table of the combined size
struct SimulatedMerger;

impl Merger for SimulatedMerger {
    fn merge(&self, task: &MergeTask) -> stcs::Result<Vec<Table>> {
        debug!("merging {:?}", task);
        Ok(vec![Table::new(task.next_table_id(), task.input_size())])
    }
}

fn simulate(
    flushes: usize,
    flush_size: u64,
    threads: usize,
    log_dir: Option<PathBuf>,
    args: &StrategyArgs,
) {
    let (strategy, thresholds) = match args.build() {
        Ok(x) => x,
        Err(e) => die!("Invalid options: {}", e),
    };

    let pool = match WorkerPool::new(threads, Arc::new(SimulatedMerger)) {
        Ok(pool) => pool,
        Err(e) => die!("Could not start worker pool: {}", e),
    };

    let mut config = Config::new("simulation", "table")
        .strategy(strategy)
        .thresholds(thresholds);

    if let Some(dir) = log_dir {
        match CompactionLog::new(&dir) {
            Ok(log) => config = config.event_sink(Arc::new(log)),
            Err(e) => die!("Could not open compaction log in {}: {}", dir.display(), e),
        }
    }

    let controller = config.open(Arc::new(pool));
    controller.enable();

    for _ in 0..flushes {
        let table = Table::new(controller.next_table_id(), flush_size);
        controller.on_flush(vec![table]);
    }

    let start = Instant::now();

    while controller.metrics().running() > 0 || controller.estimate_pending_compactions() > 0 {
        if start.elapsed() > Duration::from_secs(60) {
            die!("Compactions did not settle within 60s");
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    let tables = controller.live_tables();
    let metrics = controller.metrics();

    println!(
        "flushed {} tables of {}, ran {} compactions (write amp {:.2})",
        metrics.tables_flushed(),
        format_size(flush_size),
        metrics.completed(),
        metrics.write_amplification(),
    );

    let mut sizes = tables
        .iter()
        .map(|t| (t.size_on_disk(), t.id()))
        .collect::<Vec<_>>();
    sizes.sort_unstable_by(|a, b| b.cmp(a));

    println!("tables: {}", sizes.len());
    for (size, id) in sizes {
        println!("  {id}: {}", format_size(size));
    }
}

fn main() {
    let args = ToolArgs::parse();
    let (_, level_filter) = init_tracing(args.quiet, args.verbose);

    let cmd = ToolArgs::command();

    info!(
        "starting {} ({} {}), log level: {level_filter}",
        cmd.get_name(),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    match args.command {
        ToolCommand::Plan { file, strategy } => plan(file, &strategy),
        ToolCommand::Simulate {
            flushes,
            flush_size,
            threads,
            log_dir,
            strategy,
        } => simulate(flushes, flush_size, threads, log_dir, &strategy),
    }
}
