//! Posting iterators: lazy forward-only cursors over decoded posting lists.
//!
//! An `IterablePosting` is the one abstraction both halves of this crate
//! share: the direct-index builder decodes inverted postings through one to
//! traverse the source index (§4.3.2), and the posting-list manager hands
//! one per query term to whatever ranking driver consumes it (§4.4).

mod basic;
mod field_aware;
mod merge;

pub use basic::BasicPostingIterator;
pub use field_aware::FieldAwarePostingIterator;
pub use merge::MergedPostingIterator;

use crate::error::IndexResult;

/// Sentinel returned by `next`/`next_from` once a posting list is exhausted.
/// Document IDs never reach this value in practice, so reusing `u32::MAX`
/// avoids introducing a second return type for the common case.
pub const EOL: u32 = u32::MAX;

/// One posting: a document carrying a term (inverted side) or a term
/// carrying a document (direct side), plus its frequency and, if the index
/// tracks fields, its per-field frequencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub id: u32,
    pub tf: u32,
    pub field_freqs: Option<Vec<u32>>,
}

/// A lazy forward-only cursor over a decoded posting list.
///
/// `next`/`next_from` mutate the cursor and return the new current id (or
/// [`EOL`]); `doc_id`/`frequency`/`field_frequencies` read the id the cursor
/// is currently positioned at without advancing. Calling an accessor before
/// the first `next()` call is a caller bug (mirrors the external contract
/// in §4.2: the manager's `prepare(first_move: true)` is what performs that
/// first `next()`).
pub trait IterablePosting {
    /// Advance one posting. Returns [`EOL`] once exhausted.
    fn next(&mut self) -> IndexResult<u32>;

    /// Advance to the first posting with `id >= target`. The default
    /// implementation repeats `next()`, which is always correct; codecs
    /// that can skip without fully decoding intermediate postings should
    /// override this.
    fn next_from(&mut self, target: u32) -> IndexResult<u32> {
        loop {
            let id = self.next()?;
            if id == EOL || id >= target {
                return Ok(id);
            }
        }
    }

    fn doc_id(&self) -> u32;
    fn frequency(&self) -> u32;
    fn field_frequencies(&self) -> Option<&[u32]> {
        None
    }

    /// Number of postings in the list. Used to size the header a direct
    /// posting list is re-decoded with (§4.3: `pointer.numEntries`).
    fn len_postings(&self) -> usize;

    fn close(&mut self) {}
}

/// Either concrete decoder, picked once per posting list by whether the
/// index tracks fields (§9 "iterator polymorphism ... as distinct
/// variants"). The direct-index builder's inverted traversal decodes every
/// list in the stream through one of these without boxing, since each
/// list's lifetime is scoped to a single loop iteration.
pub enum AnyPostingIterator<'a> {
    Basic(BasicPostingIterator<'a>),
    FieldAware(FieldAwarePostingIterator<'a>),
}

impl<'a> AnyPostingIterator<'a> {
    pub fn new(bytes: &'a [u8], num_postings: usize, num_fields: usize) -> Self {
        if num_fields > 0 {
            Self::FieldAware(FieldAwarePostingIterator::new(bytes, num_postings, num_fields))
        } else {
            Self::Basic(BasicPostingIterator::new(bytes, num_postings))
        }
    }
}

impl<'a> IterablePosting for AnyPostingIterator<'a> {
    fn next(&mut self) -> IndexResult<u32> {
        match self {
            Self::Basic(it) => it.next(),
            Self::FieldAware(it) => it.next(),
        }
    }

    fn next_from(&mut self, target: u32) -> IndexResult<u32> {
        match self {
            Self::Basic(it) => it.next_from(target),
            Self::FieldAware(it) => it.next_from(target),
        }
    }

    fn doc_id(&self) -> u32 {
        match self {
            Self::Basic(it) => it.doc_id(),
            Self::FieldAware(it) => it.doc_id(),
        }
    }

    fn frequency(&self) -> u32 {
        match self {
            Self::Basic(it) => it.frequency(),
            Self::FieldAware(it) => it.frequency(),
        }
    }

    fn field_frequencies(&self) -> Option<&[u32]> {
        match self {
            Self::Basic(it) => it.field_frequencies(),
            Self::FieldAware(it) => it.field_frequencies(),
        }
    }

    fn len_postings(&self) -> usize {
        match self {
            Self::Basic(it) => it.len_postings(),
            Self::FieldAware(it) => it.len_postings(),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Basic(it) => it.close(),
            Self::FieldAware(it) => it.close(),
        }
    }
}
