//! Run-scoped memoization of index lookups.
//!
//! Nothing is ever evicted: a run touches a bounded, known set of documents and
//! query terms, so the maps grow to that set and are dropped with the ranker.

use crate::error::LookupError;
use crate::index::{DocumentVector, IndexStatsSource, TermPositions, TermStats};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct StatsCache<S> {
    source: S,
    doc_vectors: RwLock<HashMap<String, Arc<DocumentVector>>>,
    term_stats: RwLock<HashMap<String, TermStats>>,
    positions: RwLock<HashMap<String, Arc<TermPositions>>>,
}

impl<S: IndexStatsSource> StatsCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            doc_vectors: RwLock::new(HashMap::new()),
            term_stats: RwLock::new(HashMap::new()),
            positions: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_document_vector(&self, doc_id: &str) -> Result<Arc<DocumentVector>, LookupError> {
        memoize(&self.doc_vectors, doc_id, |id| self.source.document_vector(id).map(Arc::new))
    }

    pub fn get_term_stats(&self, term: &str) -> Result<TermStats, LookupError> {
        memoize(&self.term_stats, term, |t| self.source.term_stats(t))
    }

    pub fn get_term_positions(&self, doc_id: &str) -> Result<Arc<TermPositions>, LookupError> {
        memoize(&self.positions, doc_id, |id| self.source.term_positions(id).map(Arc::new))
    }

    pub fn cached_documents(&self) -> usize { self.doc_vectors.read().len() }

    pub fn cached_terms(&self) -> usize { self.term_stats.read().len() }

    pub fn cached_positions(&self) -> usize { self.positions.read().len() }
}

/// Failed fetches are not stored. Two threads racing on the same key may both
/// fetch; the first insert wins and both observe the same value afterwards.
fn memoize<V: Clone>(
    map: &RwLock<HashMap<String, V>>,
    key: &str,
    fetch: impl FnOnce(&str) -> Result<V, LookupError>,
) -> Result<V, LookupError> {
    if let Some(hit) = map.read().get(key) {
        return Ok(hit.clone());
    }
    let fetched = fetch(key)?;
    tracing::trace!(key, "cache fill");
    Ok(map.write().entry(key.to_string()).or_insert(fetched).clone())
}
