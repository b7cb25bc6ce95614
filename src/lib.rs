//! Out-of-core inverted-to-direct index transposition and query-time
//! posting-list management for the `rank-*` ecosystem.
//!
//! This crate covers two subsystems that sit on either side of a built
//! inverted index:
//!
//! - **Direct-index construction** ([`direct_index`]): rewrites an
//!   existing inverted index (docId -> postings, grouped by term) into a
//!   direct index (termId -> postings, grouped by document), under a
//!   bounded token budget per pass rather than all at once. Field lengths,
//!   when the source collection tracks fields, are carried along the
//!   rewritten document index so per-field scoring stays available on the
//!   direct side too.
//! - **Posting-list management** ([`manager`]): assembles the iterators,
//!   merged statistics and weighting models a query needs at evaluation
//!   time, including OR-merging synonym groups into a single iterator and
//!   dropping terms a low-IDF filter rules out of scoring.
//!
//! # Module map
//!
//! | Module | Purpose |
//! |---|---|
//! | [`bitcodec`] | Bit-level gamma/unary/binary codec underlying every posting list |
//! | [`postings`] | Lazy forward-only posting iterators, including an OR-merge |
//! | [`direct_index`] | Multi-pass transposition builder |
//! | [`manager`] | Query-time posting-list assembly, scoring, synonym merging |
//! | [`storage`] | External collaborator traits (`Index`, `Lexicon`, ...) plus a filesystem implementation |
//! | [`collection`] | Shared data model: pointers, lexicon/document-index rows, collection statistics |
//! | [`model`] | Weighting models (`Bm25Weight`) a manager scores postings with |
//! | [`config`] | Property-bag configuration and the manager plugin registry |
//! | [`error`] | The crate's error type |
//!
//! # Example
//!
//! ```rust
//! use rank_index::bitcodec::{BitReader, BitWriter};
//!
//! let mut w = BitWriter::new();
//! w.write_gamma(5);
//! w.write_gamma(12);
//! let bytes = w.into_bytes();
//!
//! let mut r = BitReader::new(&bytes);
//! assert_eq!(r.read_gamma().unwrap(), 5);
//! assert_eq!(r.read_gamma().unwrap(), 12);
//! ```

pub mod bitcodec;
pub mod collection;
pub mod config;
pub mod direct_index;
pub mod error;
pub mod manager;
pub mod model;
pub mod postings;
pub mod storage;

pub use error::{IndexError, IndexResult};

/// Re-export of the types most callers need to wire a build or a query
/// together, mirroring the sibling crate's own `prelude` convention.
pub mod prelude {
    pub use crate::collection::{
        CollectionStatistics, DocumentIndexEntry, EntryStatistics, LexiconEntry, Pointer,
    };
    pub use crate::config::{Inverted2DirectConfig, ManagerConfig, ManagerPlugin};
    pub use crate::direct_index::{build, BuildReport};
    pub use crate::error::{IndexError, IndexResult};
    pub use crate::manager::{PostingListManager, QueryTerm};
    pub use crate::model::{Bm25Weight, WeightingModel};
    pub use crate::postings::{IterablePosting, Posting, EOL};
    pub use crate::storage::{
        CompressionConfiguration, Directory, DocumentIndexBuilder, Index, Lexicon, PostingIndex,
    };
}
