//! Dependency scoring CLI
//!
//! Scores system typed dependencies against gold annotations, in either
//! predicate form (`reln(gov-idx, dep-idx)`, one sentence per blank
//! line) or CoNLL-X tabular form.
//!
//! ```bash
//! depscore -g gold.deps -s system.deps -v
//! depscore -g gold.conll -s system.conll --conllx --json-output
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

use treedep::conllx::read_conllx_file;
use treedep::dependency::TypedDependency;
use treedep::depsfile::read_deps_file;
use treedep::relation::RelationRegistry;
use treedep::scoring::DependencyScoring;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Score system dependencies against gold annotations.
#[derive(Parser, Debug)]
#[command(name = "depscore")]
#[command(about = "Score typed dependencies against gold annotations")]
#[command(version)]
struct Args {
    /// Gold dependency file
    #[arg(short = 'g', long = "gold")]
    gold: PathBuf,

    /// System dependency file
    #[arg(short = 's', long = "system")]
    system: PathBuf,

    /// Print per-error counts
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Inputs are CoNLL-X tabular files (reports attachment scores)
    #[arg(long)]
    conllx: bool,

    /// Emit the report as JSON
    #[arg(long = "json-output")]
    json_output: bool,

    /// Drop dependencies whose dependent is punctuation
    #[arg(long)]
    nopunc: bool,
}

fn read(
    path: &PathBuf,
    conllx: bool,
    registry: &Arc<RelationRegistry>,
) -> anyhow::Result<Vec<Vec<TypedDependency>>> {
    let deps = if conllx {
        read_conllx_file(path, Arc::clone(registry))
            .with_context(|| format!("reading CoNLL-X file {}", path.display()))?
    } else {
        read_deps_file(path, Arc::clone(registry))
            .with_context(|| format!("reading dependency file {}", path.display()))?
    };
    Ok(deps)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let registry = Arc::new(RelationRegistry::with_builtins());

    let gold = read(&args.gold, args.conllx, &registry)?;
    let system = read(&args.system, args.conllx, &registry)?;

    let scorer = DependencyScoring::new(&gold, &registry, args.nopunc);
    let score = scorer.score(&system, &registry)?;

    // CoNLL-X input implies a shared tokenization, so the one-to-one
    // attachment report applies; predicate form gets precision/recall
    let report = if args.conllx {
        score.attachment_report(args.json_output)?
    } else {
        score.f_score_report(args.verbose, args.json_output)
    };
    println!("{report}");
    Ok(())
}
