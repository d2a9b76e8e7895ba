use anyhow::Result;
use clap::Parser;
use ranker::{run, ParamOverrides, RunConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "ranker")]
#[command(about = "Score and rank candidate documents for each query", long_about = None)]
struct Args {
    /// Scoring function: plnr, bm25 or custom
    scorer: String,
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Queries CSV (QueryId, Query Description)
    #[arg(long)]
    queries: PathBuf,
    /// Candidate documents CSV (DocumentId)
    #[arg(long, default_value = "documents.csv")]
    documents: PathBuf,
    /// Output file [default: ranking_<scorer>.txt]
    #[arg(long)]
    output: Option<PathBuf>,
    /// Length normalization strength (plnr, bm25)
    #[arg(long)]
    b: Option<f64>,
    /// Term frequency saturation (bm25)
    #[arg(long)]
    k1: Option<f64>,
    /// Query term frequency saturation (bm25)
    #[arg(long)]
    k3: Option<f64>,
    /// Positional vs collection weight (custom)
    #[arg(long)]
    lmd: Option<f64>,
    /// Additive smoothing (custom)
    #[arg(long)]
    sm: Option<f64>,
    /// Score each query's documents on all cores
    #[arg(long, default_value_t = false)]
    parallel: bool,
    /// Abort the whole run (writing nothing) after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let cfg = RunConfig {
        scorer: args.scorer,
        index: args.index,
        queries: args.queries,
        documents: args.documents,
        output: args.output,
        params: ParamOverrides { b: args.b, k1: args.k1, k3: args.k3, lmd: args.lmd, sm: args.sm },
        parallel: args.parallel,
        timeout: args.timeout_secs.map(Duration::from_secs),
    };
    let summary = run(&cfg)?;
    tracing::info!(output = %summary.output.display(), queries = summary.queries, documents = summary.documents, "done");
    Ok(())
}
