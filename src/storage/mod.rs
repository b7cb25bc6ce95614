//! The external collaborators this crate consumes (§6): `Index`, `Lexicon`,
//! `PostingIndex`, `CompressionConfiguration`, `DocumentIndexBuilder`, plus a
//! filesystem-backed implementation of all five (`storage::fs`) built on the
//! `Directory` abstraction below.

pub mod directory;
pub mod fs;

use std::io::{Read, Write};

use crate::collection::{CollectionStatistics, DocumentIndexEntry, LexiconEntry, Pointer};
use crate::error::IndexResult;
use crate::postings::IterablePosting;

pub use directory::{Directory, FsDirectory, MemoryDirectory};

/// A named collection of structures (posting files, lexicons, document
/// indexes) plus string-keyed properties. Mirrors the property-bag index
/// object the original system configures through `*.properties` rather than
/// a dedicated config format (§10.3).
pub trait Index {
    fn has_structure(&self, name: &str) -> bool;
    fn open_input(&self, name: &str) -> IndexResult<Box<dyn Read>>;
    fn add_structure(&mut self, name: &str, path: &str) -> IndexResult<()>;
    fn flush(&mut self) -> IndexResult<()>;
    fn property(&self, key: &str) -> Option<String>;
    fn set_property(&mut self, key: &str, value: &str);
}

/// Term dictionary: maps a term string to its lexicon row.
pub trait Lexicon {
    fn lookup(&self, term: &str) -> Option<LexiconEntry>;

    /// Iterate all entries in ascending termId order.
    fn iter(&self) -> Box<dyn Iterator<Item = (u32, LexiconEntry)> + '_>;
}

/// Posting decoder: turns a `Pointer` into a forward cursor over the
/// structure it points into (inverted or direct, the trait does not care
/// which).
pub trait PostingIndex {
    fn postings(&self, pointer: Pointer) -> IndexResult<Box<dyn IterablePosting>>;
}

/// Owns the posting codec's on-disk shape: where a fresh posting stream is
/// opened for writing, and how the resulting structure's properties are
/// recorded against an `Index` (§6 persisted-layout table). `stats` is
/// passed to `write_index_properties` so the destination's `*.fields`
/// property actually mirrors the source collection's field configuration,
/// rather than the compression codec's own default.
pub trait CompressionConfiguration {
    fn posting_output_stream(&self, path: &str) -> IndexResult<Box<dyn Write>>;
    fn write_index_properties(
        &self,
        index: &mut dyn Index,
        structure_name: &str,
        stats: &CollectionStatistics,
    ) -> IndexResult<()>;
    fn file_extension(&self) -> &str;
}

/// Accumulates document-index rows during a rewrite pass (§4.3: "rewrite
/// document index from offsets scratch") and commits them atomically.
pub trait DocumentIndexBuilder {
    fn append(&mut self, entry: DocumentIndexEntry) -> IndexResult<()>;

    /// Consumes the builder, performing the atomic rename over the
    /// structure it replaces. Only called once the full rewrite has
    /// succeeded.
    fn finish(self: Box<Self>) -> IndexResult<()>;
}
