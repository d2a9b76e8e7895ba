use ranker::{load_documents, load_queries, run, InputError, ParamOverrides, RunConfig};
use retrieval_core::persist::{save_index, IndexPaths};
use retrieval_core::tokenizer::tokenize;
use retrieval_core::{ConfigError, MemoryIndex};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn build_tiny_index(dir: &Path) {
    let mut index = MemoryIndex::new();
    let docs = [
        ("101", "Rust ownership and borrowing explained. Rust programs avoid data races."),
        ("102", "Garbage collection pauses in managed runtimes"),
        ("103", "Learning rust: borrowing rules for beginners"),
        ("104", "Python generators and iterators"),
        ("105", "Memory allocators written in C"),
        ("106", "How compilers and linkers cooperate"),
    ];
    for (id, text) in docs {
        index.add_document(id, tokenize(text));
    }
    save_index(&IndexPaths::new(dir.join("index")), &index).unwrap();
    fs::write(dir.join("documents.csv"), "DocumentId\n101\n102\n103\n404\n").unwrap();
    fs::write(
        dir.join("queries.csv"),
        "QueryId,Query Description\n1,rust borrowing\n2,\"garbage collection, pauses\"\n",
    )
    .unwrap();
}

fn config(dir: &Path, scorer: &str) -> RunConfig {
    RunConfig {
        scorer: scorer.to_string(),
        index: dir.join("index"),
        queries: dir.join("queries.csv"),
        documents: dir.join("documents.csv"),
        output: Some(dir.join(format!("ranking_{scorer}.txt"))),
        params: ParamOverrides::default(),
        parallel: false,
        timeout: None,
    }
}

#[test]
fn writes_ranked_rows_for_every_query() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let summary = run(&config(dir.path(), "bm25")).unwrap();
    assert_eq!(summary.queries, 2);
    assert_eq!(summary.documents, 4);
    // "404" is not in the index, once per query
    assert_eq!(summary.failed, 2);

    let out = fs::read_to_string(&summary.output).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "queryid,DocumentId");
    assert_eq!(lines.len(), 1 + 2 * 4);
    assert!(lines[1..5].iter().all(|l| l.starts_with("1,")));
    assert!(lines[5..].iter().all(|l| l.starts_with("2,")));
    assert_eq!(lines[5], "2,102");
    let q1_top: Vec<&str> = lines[1..3].iter().map(|l| &l[2..]).collect();
    assert!(q1_top.contains(&"101") && q1_top.contains(&"103"), "{q1_top:?}");
}

#[test]
fn every_scorer_produces_the_same_row_set() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    for scorer in ["plnr", "bm25", "custom"] {
        let mut cfg = config(dir.path(), scorer);
        cfg.parallel = scorer == "custom";
        let summary = run(&cfg).unwrap();
        let mut rows: Vec<String> = fs::read_to_string(summary.output).unwrap().lines().skip(1).map(String::from).collect();
        rows.sort();
        assert_eq!(rows, vec!["1,101", "1,102", "1,103", "1,404", "2,101", "2,102", "2,103", "2,404"], "{scorer}");
    }
}

#[test]
fn unknown_scorer_aborts_before_output() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let cfg = config(dir.path(), "tfidf");

    let err = run(&cfg).unwrap_err();
    assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::UnknownScorer("tfidf".into())));
    assert!(!cfg.output.unwrap().exists());
}

#[test]
fn invalid_parameter_override_is_fatal() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let mut cfg = config(dir.path(), "bm25");
    cfg.params.b = Some(2.0);
    let err = run(&cfg).unwrap_err();
    assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::InvalidParameter { name: "b", .. })));
    assert!(!cfg.output.unwrap().exists());
}

#[test]
fn malformed_queries_file_aborts_run() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    fs::write(dir.path().join("queries.csv"), "Id,Text\n1,rust\n").unwrap();

    let err = load_queries(&dir.path().join("queries.csv")).unwrap_err();
    assert!(matches!(err, InputError::MissingColumn { column: "QueryId", .. }));

    let cfg = config(dir.path(), "plnr");
    let err = run(&cfg).unwrap_err();
    assert!(err.downcast_ref::<InputError>().is_some());
    assert!(!cfg.output.unwrap().exists());
}

#[test]
fn short_query_row_reports_its_record_number() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queries.csv");
    fs::write(&path, "QueryId,Query Description\n1,rust\n2,a,b\n").unwrap();

    let err = load_queries(&path).unwrap_err();
    assert!(matches!(err, InputError::Record { record: 2, .. }), "{err:?}");
}

#[test]
fn unreadable_documents_file_is_a_read_error() {
    let dir = tempdir().unwrap();
    let err = load_documents(&dir.path().join("nope.csv")).unwrap_err();
    assert!(matches!(err, InputError::Read { .. }), "{err:?}");
}

#[test]
fn documents_without_id_column_abort_run() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    fs::write(dir.path().join("documents.csv"), "DocId\n101\n102\n").unwrap();

    let cfg = config(dir.path(), "bm25");
    let err = run(&cfg).unwrap_err();
    assert!(
        matches!(err.downcast_ref::<InputError>(), Some(InputError::MissingColumn { column: "DocumentId", .. })),
        "{err:?}"
    );
    assert!(!cfg.output.unwrap().exists());
}

#[test]
fn expired_deadline_leaves_previous_output_untouched() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let mut cfg = config(dir.path(), "bm25");
    let output = cfg.output.clone().unwrap();
    fs::write(&output, "previous").unwrap();

    cfg.timeout = Some(Duration::ZERO);
    assert!(run(&cfg).is_err());
    assert_eq!(fs::read_to_string(&output).unwrap(), "previous");
}
