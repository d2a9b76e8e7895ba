//! Relevance scoring over cached index statistics.
//!
//! Three formulas share one evaluation skeleton: fetch the document vector,
//! intersect it with the distinct query terms, and sum a per-term contribution
//! computed from the term's query/document frequencies and its collection
//! statistics. Only the contribution differs between variants.

use crate::cache::StatsCache;
use crate::error::{ConfigError, LookupError, ScoreError};
use crate::index::{CollectionStats, IndexStatsSource, TermPositions};
use std::fmt;
use std::str::FromStr;

/// An analyzed query. Term order and repetition are both significant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    terms: Vec<String>,
}

impl Query {
    pub fn new(terms: Vec<String>) -> Self { Self { terms } }

    pub fn terms(&self) -> &[String] { &self.terms }

    pub fn len(&self) -> usize { self.terms.len() }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() }

    /// c(w, q)
    pub fn term_frequency(&self, term: &str) -> usize {
        self.terms.iter().filter(|t| t.as_str() == term).count()
    }

    pub fn first_position(&self, term: &str) -> Option<usize> {
        self.terms.iter().position(|t| t == term)
    }

    /// Distinct terms in order of first occurrence.
    pub fn distinct_terms(&self) -> impl Iterator<Item = &str> {
        self.terms
            .iter()
            .enumerate()
            .filter(move |(i, t)| self.first_position(t) == Some(*i))
            .map(|(_, t)| t.as_str())
    }
}

impl<T: Into<String>> FromIterator<T> for Query {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// Names accepted on the command line for each scoring function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScorerKind {
    PivotedLengthNorm,
    Bm25,
    CustomHybrid,
}

impl ScorerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScorerKind::PivotedLengthNorm => "plnr",
            ScorerKind::Bm25 => "bm25",
            ScorerKind::CustomHybrid => "custom",
        }
    }
}

impl FromStr for ScorerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plnr" => Ok(ScorerKind::PivotedLengthNorm),
            "bm25" => Ok(ScorerKind::Bm25),
            "custom" => Ok(ScorerKind::CustomHybrid),
            other => Err(ConfigError::UnknownScorer(other.to_string())),
        }
    }
}

impl fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoringFunction {
    PivotedLengthNorm { b: f64 },
    Bm25 { k1: f64, b: f64, k3: f64 },
    CustomHybrid { lmd: f64, sm: f64 },
}

impl ScoringFunction {
    pub const PLN_B: f64 = 0.5;
    pub const BM25_K1: f64 = 1.2;
    pub const BM25_B: f64 = 0.3;
    pub const BM25_K3: f64 = 1.5;
    pub const HYBRID_LMD: f64 = 0.6;
    pub const HYBRID_SM: f64 = 0.2;

    /// The variant for `kind` with its default parameters.
    pub fn with_defaults(kind: ScorerKind) -> Self {
        match kind {
            ScorerKind::PivotedLengthNorm => ScoringFunction::PivotedLengthNorm { b: Self::PLN_B },
            ScorerKind::Bm25 => {
                ScoringFunction::Bm25 { k1: Self::BM25_K1, b: Self::BM25_B, k3: Self::BM25_K3 }
            }
            ScorerKind::CustomHybrid => {
                ScoringFunction::CustomHybrid { lmd: Self::HYBRID_LMD, sm: Self::HYBRID_SM }
            }
        }
    }

    pub fn kind(&self) -> ScorerKind {
        match self {
            ScoringFunction::PivotedLengthNorm { .. } => ScorerKind::PivotedLengthNorm,
            ScoringFunction::Bm25 { .. } => ScorerKind::Bm25,
            ScoringFunction::CustomHybrid { .. } => ScorerKind::CustomHybrid,
        }
    }

    pub fn needs_positions(&self) -> bool { matches!(self, ScoringFunction::CustomHybrid { .. }) }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            ScoringFunction::PivotedLengthNorm { b } => unit_interval("b", b),
            ScoringFunction::Bm25 { k1, b, k3 } => {
                non_negative("k1", k1)?;
                unit_interval("b", b)?;
                non_negative("k3", k3)
            }
            ScoringFunction::CustomHybrid { lmd, sm } => {
                unit_interval("lmd", lmd)?;
                if !sm.is_finite() || sm <= 0.0 {
                    return Err(ConfigError::InvalidParameter {
                        name: "sm",
                        value: sm,
                        reason: "must be finite and greater than 0",
                    });
                }
                Ok(())
            }
        }
    }
}

fn unit_interval(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidParameter { name, value, reason: "must lie in [0, 1]" });
    }
    Ok(())
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        let reason = "must be finite and non-negative";
        return Err(ConfigError::InvalidParameter { name, value, reason });
    }
    Ok(())
}

/// Inputs to one term's contribution, all as f64.
struct TermInputs {
    /// c(w, q)
    qtf: f64,
    /// c(w, d)
    tf: f64,
    df: f64,
    cf: f64,
    doc_length: f64,
}

/// A scoring function bound to the statistics cache it reads from.
pub struct Ranker<S> {
    function: ScoringFunction,
    cache: StatsCache<S>,
    stats: CollectionStats,
    avg_dl: f64,
}

impl<S: IndexStatsSource> Ranker<S> {
    pub fn new(function: ScoringFunction, source: S) -> Result<Self, ConfigError> {
        function.validate()?;
        let stats = source.collection_stats().validate()?;
        let avg_dl = stats.average_document_length();
        tracing::debug!(
            scorer = %function.kind(),
            ?function,
            documents = stats.document_count,
            avg_dl,
            "ranker ready"
        );
        Ok(Self { function, cache: StatsCache::new(source), stats, avg_dl })
    }

    pub fn function(&self) -> &ScoringFunction { &self.function }

    pub fn cache(&self) -> &StatsCache<S> { &self.cache }

    /// Relevance of `doc_id` for `query`. A document sharing no term with the query scores 0.
    pub fn score(&self, query: &Query, doc_id: &str) -> Result<f64, ScoreError> {
        let vector = self.cache.get_document_vector(doc_id)?;
        let shared: Vec<&str> =
            query.distinct_terms().filter(|t| vector.contains_key(*t)).collect();
        if shared.is_empty() {
            return Ok(0.0);
        }
        let doc_length: u64 = vector.values().map(|&tf| u64::from(tf)).sum();
        let positions = if self.function.needs_positions() {
            Some(self.cache.get_term_positions(doc_id)?)
        } else {
            None
        };

        let mut rank_score = 0.0_f64;
        for term in shared {
            let ts = self.cache.get_term_stats(term)?;
            if ts.document_frequency == 0 {
                return Err(LookupError::ZeroDocumentFrequency(term.to_string()).into());
            }
            let t = TermInputs {
                qtf: query.term_frequency(term) as f64,
                tf: f64::from(vector[term]),
                df: ts.document_frequency as f64,
                cf: ts.collection_frequency as f64,
                doc_length: doc_length as f64,
            };
            rank_score += match self.function {
                ScoringFunction::PivotedLengthNorm { b } => self.pivoted_length_norm(b, &t),
                ScoringFunction::Bm25 { k1, b, k3 } => self.bm25(k1, b, k3, &t),
                ScoringFunction::CustomHybrid { lmd, sm } => {
                    let mean_pos = positions.as_deref().and_then(|p| mean_position(p, term));
                    let Some(mean_pos) = mean_pos else {
                        let (doc_id, term) = (doc_id.to_string(), term.to_string());
                        return Err(LookupError::MissingPositions { doc_id, term }.into());
                    };
                    // Every shared term comes from the query, so it has a position there.
                    let q_pos = query.first_position(term).unwrap_or(0) as f64;
                    self.custom_hybrid(lmd, sm, &t, q_pos, query.len() as f64, mean_pos)
                }
            };
        }

        if rank_score.is_nan() {
            return Err(ScoreError::UndefinedScore(doc_id.to_string()));
        }
        Ok(rank_score)
    }

    fn pivoted_length_norm(&self, b: f64, t: &TermInputs) -> f64 {
        let n = self.stats.document_count as f64;
        let norm_tf = (1.0 + (1.0 + t.tf.ln()).ln()) / (1.0 - b + b * t.doc_length / self.avg_dl);
        let idf = ((n + 1.0) / t.df).ln();
        t.qtf * norm_tf * idf
    }

    fn bm25(&self, k1: f64, b: f64, k3: f64, t: &TermInputs) -> f64 {
        let n = self.stats.document_count as f64;
        let idf = ((n - t.df + 0.5) / (t.df + 0.5)).ln();
        let length_norm = 1.0 - b + b * t.doc_length / self.avg_dl;
        let norm_tf = ((k1 + 1.0) * t.tf) / (k1 * length_norm + t.tf);
        let norm_qtf = ((k3 + 1.0) * t.qtf) / (k3 + t.qtf);
        idf * norm_tf * norm_qtf
    }

    fn custom_hybrid(
        &self,
        lmd: f64,
        sm: f64,
        t: &TermInputs,
        q_pos: f64,
        q_len: f64,
        mean_pos: f64,
    ) -> f64 {
        let n = self.stats.document_count as f64;
        let total_terms = self.stats.total_term_count as f64;
        // later query terms and earlier document occurrences weigh more
        let trp_q = q_pos / q_len;
        let trp_d = ((t.doc_length + 1.0).ln() / (mean_pos + 1.0).ln()).ln();
        let collection_importance = (t.cf / total_terms) * (n / t.df);
        let idf = (n / t.df).ln();
        let positional = t.tf.ln() / (t.qtf * trp_q * trp_d + sm);
        lmd * positional + (1.0 - lmd) * (collection_importance * idf + sm)
    }
}

fn mean_position(positions: &TermPositions, term: &str) -> Option<f64> {
    let plist = positions.get(term).filter(|p| !p.is_empty())?;
    let sum: f64 = plist.iter().map(|&p| p as f64).sum();
    Some(sum / plist.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scorer_names() {
        assert_eq!("plnr".parse::<ScorerKind>().unwrap(), ScorerKind::PivotedLengthNorm);
        assert_eq!("bm25".parse::<ScorerKind>().unwrap(), ScorerKind::Bm25);
        assert_eq!("custom".parse::<ScorerKind>().unwrap(), ScorerKind::CustomHybrid);
        assert_eq!("tfidf".parse::<ScorerKind>(), Err(ConfigError::UnknownScorer("tfidf".into())));
    }

    #[test]
    fn query_counts_and_positions() {
        let q: Query = ["fox", "dog", "fox"].into_iter().collect();
        assert_eq!(q.term_frequency("fox"), 2);
        assert_eq!(q.first_position("fox"), Some(0));
        assert_eq!(q.first_position("dog"), Some(1));
        assert_eq!(q.distinct_terms().collect::<Vec<_>>(), vec!["fox", "dog"]);
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        assert!(ScoringFunction::PivotedLengthNorm { b: 1.5 }.validate().is_err());
        assert!(ScoringFunction::Bm25 { k1: -1.0, b: 0.3, k3: 1.5 }.validate().is_err());
        assert!(ScoringFunction::CustomHybrid { lmd: 0.6, sm: 0.0 }.validate().is_err());
        assert!(ScoringFunction::Bm25 { k1: f64::NAN, b: 0.3, k3: 1.5 }.validate().is_err());
        for kind in [ScorerKind::PivotedLengthNorm, ScorerKind::Bm25, ScorerKind::CustomHybrid] {
            assert!(ScoringFunction::with_defaults(kind).validate().is_ok());
        }
    }

    #[test]
    fn mean_position_requires_occurrences() {
        let mut p = TermPositions::new();
        p.insert("fox".into(), vec![1, 5]);
        p.insert("dog".into(), vec![]);
        assert_eq!(mean_position(&p, "fox"), Some(3.0));
        assert_eq!(mean_position(&p, "dog"), None);
        assert_eq!(mean_position(&p, "cat"), None);
    }
}
