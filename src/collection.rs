//! Collection-level structures: where a posting list lives on disk, what a
//! lexicon/document-index entry records about a term/document, and the
//! corpus-wide statistics both halves of this crate read but never mutate.

/// A location within a posting file: byte/bit offset of the first posting
/// plus how many postings follow. `numEntries` lets a reader size a decoder
/// without a separate length prefix in the stream itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pointer {
    pub byte_offset: u64,
    pub bit_offset: u8,
    pub num_entries: u32,
}

impl Pointer {
    pub const fn new(byte_offset: u64, bit_offset: u8, num_entries: u32) -> Self {
        Self { byte_offset, bit_offset, num_entries }
    }
}

/// One lexicon row: a term's collection-wide statistics and where its
/// (inverted) posting list starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconEntry {
    pub term_id: u32,
    /// Document frequency: number of documents containing the term.
    pub df: u32,
    /// Collection frequency: sum of term frequency over all documents.
    pub tf: u64,
    pub pointer: Pointer,
}

/// One document-index row: a document's length and where its (direct)
/// posting list starts, once the builder has written it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIndexEntry {
    pub doc_length: u32,
    pub field_lengths: Option<Vec<u32>>,
    pub pointer: Pointer,
}

/// Corpus-wide counts, fixed for the lifetime of a query or a build pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStatistics {
    pub num_docs: u64,
    pub num_terms: u64,
    pub num_tokens: u64,
    pub num_pointers: u64,
    pub field_count: usize,
    pub field_names: Vec<String>,
    pub field_tokens: Vec<u64>,
}

impl CollectionStatistics {
    pub fn average_document_length(&self) -> f64 {
        if self.num_docs == 0 {
            0.0
        } else {
            self.num_tokens as f64 / self.num_docs as f64
        }
    }
}

/// Merged per-term statistics a posting-list manager attaches to an
/// effective query term (§4.4): `df`/`cf` summed across a synonym group's
/// alternatives, or copied straight from a single term's lexicon row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryStatistics {
    pub df: u64,
    pub cf: u64,
}
