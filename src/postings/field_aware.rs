use crate::bitcodec::{BitReader, BitWriter};
use crate::error::IndexResult;
use crate::postings::{IterablePosting, EOL};

/// Decodes a posting list with per-field frequencies: each posting is
/// `(idGap: gamma, tf: gamma, fieldTf[0..F]: gamma each)`.
///
/// Field frequencies may legitimately be zero (a term can occur in some
/// fields of a document and not others), so each is biased by +1 on the
/// wire the same way the first posting's absolute id is, and unbiased on
/// read.
pub struct FieldAwarePostingIterator<'a> {
    reader: BitReader<'a>,
    remaining: usize,
    num_fields: usize,
    current_id: u32,
    current_tf: u32,
    current_fields: Vec<u32>,
    started: bool,
}

impl<'a> FieldAwarePostingIterator<'a> {
    pub fn new(bytes: &'a [u8], num_postings: usize, num_fields: usize) -> Self {
        Self::at(bytes, 0, 0, num_postings, num_fields)
    }

    pub fn at(
        bytes: &'a [u8],
        byte_offset: u64,
        bit_offset: u8,
        num_postings: usize,
        num_fields: usize,
    ) -> Self {
        Self {
            reader: BitReader::at(bytes, byte_offset, bit_offset),
            remaining: num_postings,
            num_fields,
            current_id: 0,
            current_tf: 0,
            current_fields: vec![0; num_fields],
            started: false,
        }
    }

    /// Encode `(id, tf, fieldTfs)` triples, analogous to
    /// `BasicPostingIterator::encode`.
    pub fn encode(postings: &[(u32, u32, Vec<u32>)]) -> Vec<u8> {
        let mut w = BitWriter::new();
        let mut prev: Option<u32> = None;
        for (id, tf, fields) in postings {
            match prev {
                None => w.write_gamma(id + 1),
                Some(p) => w.write_gamma(id - p),
            }
            prev = Some(*id);
            w.write_gamma(*tf);
            for &f in fields {
                w.write_gamma(f + 1);
            }
        }
        w.into_bytes()
    }
}

impl<'a> IterablePosting for FieldAwarePostingIterator<'a> {
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
        for slot in self.current_fields.iter_mut() {
            *slot = self.reader.read_gamma()? - 1;
        }
        Ok(self.current_id)
    }

    fn doc_id(&self) -> u32 {
        self.current_id
    }

    fn frequency(&self) -> u32 {
        self.current_tf
    }

    fn field_frequencies(&self) -> Option<&[u32]> {
        Some(&self.current_fields)
    }

    fn len_postings(&self) -> usize {
        self.remaining + if self.started && self.current_id != EOL { 1 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_field_frequencies() {
        let postings = vec![
            (7u32, 3u32, vec![2u32, 1u32]),
            (12, 1, vec![0, 1]),
            (15, 4, vec![4, 0]),
        ];
        let bytes = FieldAwarePostingIterator::encode(&postings);
        let mut it = FieldAwarePostingIterator::new(&bytes, postings.len(), 2);
        for (id, tf, fields) in &postings {
            assert_eq!(it.next().unwrap(), *id);
            assert_eq!(it.frequency(), *tf);
            assert_eq!(it.field_frequencies().unwrap(), fields.as_slice());
        }
        assert_eq!(it.next().unwrap(), EOL);
    }
}
