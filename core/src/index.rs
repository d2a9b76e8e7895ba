use crate::error::{ConfigError, LookupError};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

pub type DocId = String;
pub type Position = usize;

/// term -> raw frequency within one document
pub type DocumentVector = HashMap<String, u32>;
/// term -> ordered token offsets within one document
pub type TermPositions = HashMap<String, Vec<Position>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionStats {
    pub document_count: u64,
    pub total_term_count: u64,
}

impl CollectionStats {
    /// Rejects an empty collection; every length-normalized formula divides by the document count.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.document_count == 0 {
            return Err(ConfigError::EmptyCollection);
        }
        Ok(self)
    }

    pub fn average_document_length(&self) -> f64 {
        self.total_term_count as f64 / self.document_count as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermStats {
    pub document_frequency: u64,
    pub collection_frequency: u64,
}

/// Read side of an inverted index, as consumed by the scoring engine.
pub trait IndexStatsSource {
    fn collection_stats(&self) -> CollectionStats;
    fn document_vector(&self, doc_id: &str) -> Result<DocumentVector, LookupError>;
    fn term_stats(&self, term: &str) -> Result<TermStats, LookupError>;
    fn term_positions(&self, doc_id: &str) -> Result<TermPositions, LookupError>;
}

impl<T: IndexStatsSource + ?Sized> IndexStatsSource for &T {
    fn collection_stats(&self) -> CollectionStats { (**self).collection_stats() }
    fn document_vector(&self, doc_id: &str) -> Result<DocumentVector, LookupError> { (**self).document_vector(doc_id) }
    fn term_stats(&self, term: &str) -> Result<TermStats, LookupError> { (**self).term_stats(term) }
    fn term_positions(&self, doc_id: &str) -> Result<TermPositions, LookupError> { (**self).term_positions(doc_id) }
}

impl<T: IndexStatsSource + ?Sized> IndexStatsSource for Arc<T> {
    fn collection_stats(&self) -> CollectionStats { (**self).collection_stats() }
    fn document_vector(&self, doc_id: &str) -> Result<DocumentVector, LookupError> { (**self).document_vector(doc_id) }
    fn term_stats(&self, term: &str) -> Result<TermStats, LookupError> { (**self).term_stats(term) }
    fn term_positions(&self, doc_id: &str) -> Result<TermPositions, LookupError> { (**self).term_positions(doc_id) }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct IndexedDoc {
    pub vector: DocumentVector,
    pub positions: TermPositions,
}

/// Forward + vocabulary index held entirely in memory.
///
/// Documents are added already analyzed, as `(term, position)` pairs in the shape
/// [`crate::tokenizer::tokenize`] produces. Document and collection frequencies and
/// the total term count are maintained on insert.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryIndex {
    pub(crate) docs: HashMap<DocId, IndexedDoc>,
    pub(crate) terms: HashMap<String, TermStats>,
    pub(crate) total_term_count: u64,
}

impl MemoryIndex {
    pub fn new() -> Self { Self::default() }

    /// Adds one analyzed document. Returns false (and changes nothing) if the id is already indexed.
    pub fn add_document<I, T>(&mut self, doc_id: impl Into<DocId>, tokens: I) -> bool
    where
        I: IntoIterator<Item = (T, usize)>,
        T: Into<String>,
    {
        let doc_id = doc_id.into();
        let slot = match self.docs.entry(doc_id) {
            Entry::Occupied(e) => {
                tracing::warn!(doc_id = %e.key(), "document already indexed, skipping");
                return false;
            }
            Entry::Vacant(e) => e,
        };

        let mut doc = IndexedDoc::default();
        for (term, pos) in tokens {
            let term = term.into();
            *doc.vector.entry(term.clone()).or_insert(0) += 1;
            doc.positions.entry(term).or_default().push(pos);
        }
        for plist in doc.positions.values_mut() {
            plist.sort_unstable();
        }

        for (term, tf) in doc.vector.iter() {
            let stats = self.terms.entry(term.clone()).or_insert(TermStats { document_frequency: 0, collection_frequency: 0 });
            stats.document_frequency += 1;
            stats.collection_frequency += u64::from(*tf);
            self.total_term_count += u64::from(*tf);
        }
        slot.insert(doc);
        true
    }

    pub fn num_terms(&self) -> usize { self.terms.len() }

    fn doc(&self, doc_id: &str) -> Result<&IndexedDoc, LookupError> {
        self.docs.get(doc_id).ok_or_else(|| LookupError::DocumentNotFound(doc_id.to_string()))
    }
}

impl IndexStatsSource for MemoryIndex {
    fn collection_stats(&self) -> CollectionStats {
        CollectionStats { document_count: self.docs.len() as u64, total_term_count: self.total_term_count }
    }

    fn document_vector(&self, doc_id: &str) -> Result<DocumentVector, LookupError> {
        Ok(self.doc(doc_id)?.vector.clone())
    }

    fn term_stats(&self, term: &str) -> Result<TermStats, LookupError> {
        self.terms.get(term).copied().ok_or_else(|| LookupError::TermNotFound(term.to_string()))
    }

    fn term_positions(&self, doc_id: &str) -> Result<TermPositions, LookupError> {
        Ok(self.doc(doc_id)?.positions.clone())
    }
}
