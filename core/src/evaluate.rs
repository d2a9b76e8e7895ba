//! Per-query evaluation: score every candidate document and rank the results.
//!
//! Failure policy: a document whose score cannot be computed (missing from the
//! index, malformed entry, undefined arithmetic) ranks with a score of 0. The
//! failure is logged and counted in [`RankedList::failed`] but never returned to
//! the caller, so one bad document cannot abort a query.

use crate::error::{Cancelled, ScoreError};
use crate::index::{DocId, IndexStatsSource};
use crate::scoring::{Query, Ranker};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEntry {
    pub doc_id: DocId,
    pub score: f64,
}

/// Documents in descending score order; equal scores are ordered by ascending document id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedList {
    pub entries: Vec<ScoreEntry>,
    /// Number of candidates whose score fell back to 0 because scoring failed.
    pub failed: usize,
}

impl RankedList {
    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn doc_ids(&self) -> impl Iterator<Item = &str> { self.entries.iter().map(|e| e.doc_id.as_str()) }
}

#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// Score documents on the rayon pool instead of the calling thread.
    pub parallel: bool,
    pub deadline: Option<Instant>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl EvalOptions {
    fn should_stop(&self) -> bool {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }
}

/// Scores every candidate sequentially and ranks them. Duplicate ids are scored once.
pub fn evaluate<S, I, D>(ranker: &Ranker<S>, query: &Query, candidates: I) -> RankedList
where
    S: IndexStatsSource,
    I: IntoIterator<Item = D>,
    D: AsRef<str>,
{
    let ids = dedup(candidates);
    let scored = ids.iter().map(|id| score_one(ranker, query, id)).collect();
    rank(scored)
}

/// Like [`evaluate`], honouring cancellation and optionally scoring in parallel.
/// Cancellation is checked before each document; a cancelled run yields no list.
pub fn evaluate_with<S, I, D>(
    ranker: &Ranker<S>,
    query: &Query,
    candidates: I,
    opts: &EvalOptions,
) -> Result<RankedList, Cancelled>
where
    S: IndexStatsSource + Sync,
    I: IntoIterator<Item = D>,
    D: AsRef<str>,
{
    let ids = dedup(candidates);
    let guarded = |id: &String| {
        if opts.should_stop() {
            return Err(Cancelled);
        }
        Ok(score_one(ranker, query, id))
    };
    let scored: Vec<(ScoreEntry, bool)> = if opts.parallel {
        ids.par_iter().map(guarded).collect::<Result<_, _>>()?
    } else {
        ids.iter().map(guarded).collect::<Result<_, _>>()?
    };
    Ok(rank(scored))
}

fn dedup<I, D>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = D>,
    D: AsRef<str>,
{
    let unique: BTreeSet<String> = candidates.into_iter().map(|d| d.as_ref().to_string()).collect();
    unique.into_iter().collect()
}

/// The bool marks a failed score that was replaced by 0.
fn score_one<S: IndexStatsSource>(ranker: &Ranker<S>, query: &Query, doc_id: &str) -> (ScoreEntry, bool) {
    let outcome = ranker.score(query, doc_id);
    let failed = outcome.is_err();
    let score = absorb_failure(doc_id, outcome);
    (ScoreEntry { doc_id: doc_id.to_string(), score }, failed)
}

fn absorb_failure(doc_id: &str, outcome: Result<f64, ScoreError>) -> f64 {
    match outcome {
        Ok(score) => score,
        Err(err) => {
            tracing::debug!(doc_id, error = %err, "scoring failed, using 0");
            0.0
        }
    }
}

fn rank(scored: Vec<(ScoreEntry, bool)>) -> RankedList {
    let failed = scored.iter().filter(|(_, f)| *f).count();
    let mut entries: Vec<ScoreEntry> = scored.into_iter().map(|(e, _)| e).collect();
    entries.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id)));
    if failed > 0 {
        tracing::warn!(failed, candidates = entries.len(), "some documents could not be scored");
    }
    RankedList { entries, failed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, score: f64) -> (ScoreEntry, bool) {
        (ScoreEntry { doc_id: id.into(), score }, false)
    }

    #[test]
    fn ties_break_on_ascending_doc_id() {
        let ranked = rank(vec![entry("c", 1.0), entry("a", 1.0), entry("b", 2.0), entry("d", -0.5)]);
        assert_eq!(ranked.doc_ids().collect::<Vec<_>>(), vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn zero_ties_with_negative_scores_below() {
        let ranked = rank(vec![entry("x", -1.0), entry("y", 0.0), (ScoreEntry { doc_id: "z".into(), score: 0.0 }, true)]);
        assert_eq!(ranked.doc_ids().collect::<Vec<_>>(), vec!["y", "z", "x"]);
        assert_eq!(ranked.failed, 1);
    }

    #[test]
    fn raised_flag_stops_evaluation() {
        let flag = Arc::new(AtomicBool::new(true));
        let opts = EvalOptions { cancel: Some(flag), ..Default::default() };
        assert!(opts.should_stop());
        assert!(!EvalOptions::default().should_stop());
    }
}
