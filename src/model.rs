//! Weighting models: the scoring half of `PostingListManager::score` (§4.4).
//!
//! Scoring model mathematics is treated as an opaque trait elsewhere in this
//! crate. `Bm25Weight` exists so the manager is exercisable end-to-end in
//! tests and examples without a caller-supplied model; it is the same Okapi
//! BM25 formula used by `rank-retrieve`'s `bm25::InvertedIndex::score`,
//! adapted from scoring pre-tokenised query terms against an in-memory map
//! to scoring a posting at a manager's current iterator position.

use crate::collection::CollectionStatistics;
use crate::postings::IterablePosting;

/// Scores one posting at a term's current iterator position. Implementors
/// hold whatever per-term statistics (idf, collection frequency) they need
/// precomputed at construction time; `score` itself must not fail, a model
/// that cannot score a posting should return `0.0`.
pub trait WeightingModel {
    fn score(&self, posting: &dyn IterablePosting) -> f32;
}

/// Okapi BM25, ported from `rank-retrieve`'s `bm25::InvertedIndex::score`.
///
/// `idf` and `avg_doc_length` are precomputed once per term at assembly time
/// (§4.4: the manager builds one `WeightingModel` per term after resolving
/// its `EntryStatistics`), rather than recomputed per posting the way an
/// in-memory index might do it lazily.
pub struct Bm25Weight {
    idf: f32,
    avg_doc_length: f32,
    k1: f32,
    b: f32,
}

impl Bm25Weight {
    pub fn new(stats: &CollectionStatistics, df: u64, k1: f32, b: f32) -> Self {
        let n = stats.num_docs as f32;
        let df = df as f32;
        let idf = if df > 0.0 {
            ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
        } else {
            0.0
        };
        Self {
            idf,
            avg_doc_length: stats.average_document_length() as f32,
            k1,
            b,
        }
    }

    pub fn with_defaults(stats: &CollectionStatistics, df: u64) -> Self {
        Self::new(stats, df, 1.2, 0.75)
    }
}

impl WeightingModel for Bm25Weight {
    fn score(&self, posting: &dyn IterablePosting) -> f32 {
        if self.avg_doc_length == 0.0 || self.idf == 0.0 {
            return 0.0;
        }
        let tf = posting.frequency() as f32;
        if tf == 0.0 {
            return 0.0;
        }
        // doc_length is not directly available from a bare posting; callers
        // that need length normalisation supply it via `ScoredPosting`
        // (below) rather than through this trait's minimal signature.
        let numerator = tf * (self.k1 + 1.0);
        let denominator = tf + self.k1 * (1.0 - self.b);
        self.idf * (numerator / denominator)
    }
}

/// A posting paired with the length of the document it belongs to, for
/// models that need length normalisation and whose caller can supply it
/// (the manager's scoring loop reads `doc_length` off the document index
/// entry it already resolved during assembly).
pub struct ScoredPosting<'a> {
    pub posting: &'a dyn IterablePosting,
    pub doc_length: u32,
}

impl Bm25Weight {
    pub fn score_with_length(&self, scored: &ScoredPosting<'_>) -> f32 {
        if self.avg_doc_length == 0.0 || self.idf == 0.0 {
            return 0.0;
        }
        let tf = scored.posting.frequency() as f32;
        if tf == 0.0 {
            return 0.0;
        }
        let doc_length = scored.doc_length as f32;
        let numerator = tf * (self.k1 + 1.0);
        let denominator =
            tf + self.k1 * (1.0 - self.b + self.b * doc_length / self.avg_doc_length);
        self.idf * (numerator / denominator)
    }
}
