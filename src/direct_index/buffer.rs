use crate::bitcodec::BitWriter;

/// Accumulates one document's direct postings during a transposition pass
/// (§3 "In-Memory Direct Posting Buffer"). `traverse_inverted_file` appends
/// to these in ascending termId order (the traversal visits the lexicon in
/// termId order and emits into every buffer whose window contains the
/// posting's docId), so each buffer only ever needs to track the previous
/// termId it wrote to gap-encode the next one.
pub struct DirectPostingBuffer {
    writer: BitWriter,
    prev_term_id: Option<u32>,
    df: u32,
    tf: u64,
    field_tf: Option<Vec<u64>>,
}

impl DirectPostingBuffer {
    pub fn new(num_fields: usize) -> Self {
        Self {
            writer: BitWriter::new(),
            prev_term_id: None,
            df: 0,
            tf: 0,
            field_tf: if num_fields > 0 { Some(vec![0; num_fields]) } else { None },
        }
    }

    /// Append a term's posting into this document's buffer. `term_freq` is
    /// the occurrence count within this document; `field_freqs`, if
    /// present, must have one entry per tracked field.
    pub fn push(&mut self, term_id: u32, term_freq: u32, field_freqs: Option<&[u32]>) {
        match self.prev_term_id {
            None => self.writer.write_gamma(term_id + 1),
            Some(p) => self.writer.write_gamma(term_id - p),
        }
        self.prev_term_id = Some(term_id);
        self.writer.write_gamma(term_freq);
        self.df += 1;
        self.tf += term_freq as u64;

        if let (Some(sums), Some(freqs)) = (self.field_tf.as_mut(), field_freqs) {
            for (slot, &f) in sums.iter_mut().zip(freqs) {
                self.writer.write_gamma(f + 1);
                *slot += f as u64;
            }
        }
    }

    pub fn df(&self) -> u32 {
        self.df
    }

    pub fn tf(&self) -> u64 {
        self.tf
    }

    pub fn field_tf(&self) -> Option<&[u64]> {
        self.field_tf.as_deref()
    }

    /// Consume the buffer, applying the padding quirk (§4.1): two sentinel
    /// `write_gamma(1)` calls and a byte-align pad, so a posting decoder
    /// that overreads its logical end never reads past the buffer.
    pub fn into_padded_bytes(mut self) -> Vec<u8> {
        self.writer.write_gamma(1);
        self.writer.write_gamma(1);
        self.writer.pad();
        self.writer.into_bytes()
    }
}
