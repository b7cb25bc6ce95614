use crate::bitcodec::{BitReader, BitWriter};
use crate::error::IndexResult;
use crate::postings::{IterablePosting, EOL};

/// Decodes a posting list with no per-field frequencies: each posting is
/// `(idGap: gamma, tf: gamma)`. The first posting's "gap" is its absolute
/// id (§4.3: "the first entry stores the absolute termId/docId"), biased by
/// +1 on the wire since gamma codes cannot represent zero and id 0 is
/// valid; every later gap is a difference of strictly ascending ids and is
/// therefore always >= 1 on its own.
pub struct BasicPostingIterator<'a> {
    reader: BitReader<'a>,
    remaining: usize,
    current_id: u32,
    current_tf: u32,
    started: bool,
}

impl<'a> BasicPostingIterator<'a> {
    pub fn new(bytes: &'a [u8], num_postings: usize) -> Self {
        Self::at(bytes, 0, 0, num_postings)
    }

    pub fn at(bytes: &'a [u8], byte_offset: u64, bit_offset: u8, num_postings: usize) -> Self {
        Self {
            reader: BitReader::at(bytes, byte_offset, bit_offset),
            remaining: num_postings,
            current_id: 0,
            current_tf: 0,
            started: false,
        }
    }

    /// Encode a sequence of `(id, tf)` pairs (already in ascending, gap-ready
    /// order) into a fresh in-memory buffer. Used by the direct-index
    /// builder to materialise a completed document's postings and by tests
    /// that need a self-contained posting list.
    pub fn encode(postings: &[(u32, u32)]) -> Vec<u8> {
        let mut w = BitWriter::new();
        let mut prev: Option<u32> = None;
        for &(id, tf) in postings {
            match prev {
                None => w.write_gamma(id + 1),
                Some(p) => w.write_gamma(id - p),
            }
            prev = Some(id);
            w.write_gamma(tf);
        }
        w.into_bytes()
    }
}

impl<'a> IterablePosting for BasicPostingIterator<'a> {
    fn next(&mut self) -> IndexResult<u32> {
        if self.remaining == 0 {
            self.current_id = EOL;
            return Ok(EOL);
        }
        self.remaining -= 1;
        let gap = self.reader.read_gamma()?;
        self.current_id = if !self.started { gap - 1 } else { self.current_id + gap };
        self.started = true;
        self.current_tf = self.reader.read_gamma()?;
        Ok(self.current_id)
    }

    fn doc_id(&self) -> u32 {
        self.current_id
    }

    fn frequency(&self) -> u32 {
        self.current_tf
    }

    fn len_postings(&self) -> usize {
        self.remaining + if self.started && self.current_id != EOL { 1 } else { 0 }
    }
}
