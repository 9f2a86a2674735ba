use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use csp_engine::{Prng, ProcessGraph, Status, SymTable};
use csp_syntax::{parse_script, Diagnostics};

mod tracer;

use tracer::{Options, Tracer};

/// Interactive tracer for CSP scripts
#[derive(Parser, Debug)]
#[command(name = "trace")]
#[command(about = "Trace a script of CSP equations, one event at a time", long_about = None)]
struct Args {
    /// Print the alphabet, one event per line, and exit
    #[arg(short = 'A')]
    alphabet_only: bool,

    /// Do not print the alphabet at the beginning
    #[arg(short = 'a')]
    no_alphabet: bool,

    /// Print events, if accepted
    #[arg(short = 'e')]
    echo_events: bool,

    /// Do not print the current process after each event
    #[arg(short = 'p')]
    no_process: bool,

    /// Do not print the set of acceptable events
    #[arg(short = 'v')]
    no_acceptable: bool,

    /// Trace automatically for up to N events chosen by the PRNG
    #[arg(short = 'P', value_name = "N")]
    play: Option<usize>,

    /// Fix the PRNG seed (a fixed seed reproduces the whole trace)
    #[arg(short = 's', value_name = "SEED")]
    seed: Option<u64>,

    /// The CSP script to trace
    source: std::path::PathBuf,
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            1
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let source = std::fs::read_to_string(&args.source).with_context(|| {
        format!("unable to open {} for reading", args.source.display())
    })?;

    let file = args.source.display().to_string();
    let mut graph = ProcessGraph::new();
    let mut symtab = SymTable::new();
    let mut diags = Diagnostics::new(file, &source);
    let Some(root) = parse_script(&source, &mut graph, &mut symtab, &mut diags)
    else {
        return Ok(1);
    };

    let prng = match args.seed {
        Some(seed) => Prng::seeded(seed),
        None => Prng::from_entropy(),
    };
    let status = Status::new(prng);

    let opts = Options {
        alphabet_only: args.alphabet_only,
        show_alphabet: !args.no_alphabet,
        echo_events: args.echo_events,
        show_process: !args.no_process,
        show_acceptable: !args.no_acceptable,
        auto_events: args.play,
    };
    Tracer::new(graph, root, status, diags, opts).run()
}
