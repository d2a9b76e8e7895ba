//! Document scoring for ad-hoc retrieval.
//!
//! A [`Ranker`] pairs one [`ScoringFunction`] with a [`StatsCache`] over an
//! [`IndexStatsSource`]; [`evaluate`] runs it across a candidate set and ranks
//! the result.

pub mod cache;
pub mod error;
pub mod evaluate;
pub mod index;
pub mod persist;
pub mod scoring;
pub mod tokenizer;

pub use cache::StatsCache;
pub use error::{Cancelled, ConfigError, LookupError, ScoreError};
pub use evaluate::{evaluate, evaluate_with, EvalOptions, RankedList, ScoreEntry};
pub use index::*;
pub use scoring::{Query, Ranker, ScorerKind, ScoringFunction};
