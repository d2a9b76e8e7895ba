use anyhow::{Context, Result};
use retrieval_core::persist::{load_index, IndexPaths};
use retrieval_core::tokenizer::analyze_query;
use retrieval_core::{evaluate_with, ConfigError, DocId, EvalOptions, RankedList, Ranker, ScorerKind, ScoringFunction};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

pub const OUTPUT_HEADER: [&str; 2] = ["queryid", "DocumentId"];

#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{}: missing column `{column}`", .path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("{}, record {record}: {source}", .path.display())]
    Record {
        path: PathBuf,
        record: usize,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRecord {
    #[serde(rename = "QueryId")]
    pub query_id: String,
    #[serde(rename = "Query Description")]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct DocumentRecord {
    #[serde(rename = "DocumentId")]
    document_id: DocId,
}

/// Command-line overrides of the scoring parameters; unset fields keep the defaults.
#[derive(Debug, Clone, Default)]
pub struct ParamOverrides {
    pub b: Option<f64>,
    pub k1: Option<f64>,
    pub k3: Option<f64>,
    pub lmd: Option<f64>,
    pub sm: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub scorer: String,
    pub index: PathBuf,
    pub queries: PathBuf,
    pub documents: PathBuf,
    /// Defaults to `ranking_<scorer>.txt` in the working directory.
    pub output: Option<PathBuf>,
    pub params: ParamOverrides,
    pub parallel: bool,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub queries: usize,
    pub documents: usize,
    pub failed: usize,
}

/// Resolve the scorer name and apply overrides. Fails before any input is touched.
pub fn build_scoring_function(scorer: &str, params: &ParamOverrides) -> Result<ScoringFunction, ConfigError> {
    let kind: ScorerKind = scorer.parse()?;
    let mut function = ScoringFunction::with_defaults(kind);
    match &mut function {
        ScoringFunction::PivotedLengthNorm { b } => {
            override_param(b, params.b);
            ignored(kind, &[("k1", params.k1), ("k3", params.k3), ("lmd", params.lmd), ("sm", params.sm)]);
        }
        ScoringFunction::Bm25 { k1, b, k3 } => {
            override_param(k1, params.k1);
            override_param(b, params.b);
            override_param(k3, params.k3);
            ignored(kind, &[("lmd", params.lmd), ("sm", params.sm)]);
        }
        ScoringFunction::CustomHybrid { lmd, sm } => {
            override_param(lmd, params.lmd);
            override_param(sm, params.sm);
            ignored(kind, &[("b", params.b), ("k1", params.k1), ("k3", params.k3)]);
        }
    }
    function.validate()?;
    Ok(function)
}

fn override_param(slot: &mut f64, value: Option<f64>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn ignored(kind: ScorerKind, params: &[(&str, Option<f64>)]) {
    for (name, value) in params {
        if value.is_some() {
            tracing::warn!(scorer = %kind, param = *name, "parameter does not apply to this scorer, ignoring");
        }
    }
}

fn open_csv(path: &Path, columns: &[&'static str]) -> Result<csv::Reader<File>, InputError> {
    let read_err = |source| InputError::Read { path: path.to_path_buf(), source };
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path).map_err(read_err)?;
    let headers = rdr.headers().map_err(read_err)?.clone();
    for column in columns {
        if !headers.iter().any(|h| h == *column) {
            return Err(InputError::MissingColumn { path: path.to_path_buf(), column: *column });
        }
    }
    Ok(rdr)
}

/// Queries CSV with `QueryId` and `Query Description` columns; extra columns are ignored.
pub fn load_queries(path: &Path) -> Result<Vec<QueryRecord>, InputError> {
    let mut rdr = open_csv(path, &["QueryId", "Query Description"])?;
    let mut queries = Vec::new();
    for (i, row) in rdr.deserialize::<QueryRecord>().enumerate() {
        let record = row.map_err(|source| InputError::Record { path: path.to_path_buf(), record: i + 1, source })?;
        queries.push(record);
    }
    tracing::info!(path = %path.display(), count = queries.len(), "queries loaded");
    Ok(queries)
}

/// Candidate document ids from the `DocumentId` column.
pub fn load_documents(path: &Path) -> Result<Vec<DocId>, InputError> {
    let mut rdr = open_csv(path, &["DocumentId"])?;
    let mut docs = Vec::new();
    for (i, row) in rdr.deserialize::<DocumentRecord>().enumerate() {
        let record = row.map_err(|source| InputError::Record { path: path.to_path_buf(), record: i + 1, source })?;
        docs.push(record.document_id);
    }
    tracing::info!(path = %path.display(), count = docs.len(), "candidate documents loaded");
    Ok(docs)
}

/// Write `queryid,DocumentId` rows in ranked order. The file appears only once fully written.
pub fn write_rankings<'a, I>(path: &Path, rankings: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a RankedList)>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(dir).with_context(|| format!("creating temp file in {}", dir.display()))?;
    {
        let mut w = csv::Writer::from_writer(tmp.as_file());
        w.write_record(OUTPUT_HEADER)?;
        for (query_id, ranked) in rankings {
            for doc_id in ranked.doc_ids() {
                w.write_record([query_id, doc_id])?;
            }
        }
        w.flush()?;
    }
    tmp.persist(path).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn run(cfg: &RunConfig) -> Result<RunSummary> {
    let function = build_scoring_function(&cfg.scorer, &cfg.params)?;
    let output = cfg.output.clone().unwrap_or_else(|| PathBuf::from(format!("ranking_{}.txt", function.kind())));

    let index = load_index(&IndexPaths::new(&cfg.index)).context("loading index")?;
    let documents = load_documents(&cfg.documents)?;
    let queries = load_queries(&cfg.queries)?;

    tracing::info!(scorer = %function.kind(), ?function, "initializing ranker");
    let ranker = Ranker::new(function, index)?;
    let opts = EvalOptions { parallel: cfg.parallel, deadline: cfg.timeout.map(|t| Instant::now() + t), cancel: None };

    let mut rankings = Vec::with_capacity(queries.len());
    let mut failed = 0;
    for (i, q) in queries.iter().enumerate() {
        tracing::info!(query_id = %q.query_id, n = i + 1, total = queries.len(), "evaluating query");
        let query = analyze_query(&q.description);
        if query.is_empty() {
            tracing::warn!(query_id = %q.query_id, "query has no terms after analysis");
        }
        let ranked = evaluate_with(&ranker, &query, &documents, &opts)
            .with_context(|| format!("evaluating query {}", q.query_id))?;
        failed += ranked.failed;
        rankings.push((q.query_id.as_str(), ranked));
    }

    write_rankings(&output, rankings.iter().map(|(id, r)| (*id, r)))?;
    tracing::info!(output = %output.display(), queries = queries.len(), failed, "rankings written");
    Ok(RunSummary { output, queries: queries.len(), documents: documents.len(), failed })
}
