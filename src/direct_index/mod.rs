//! §4.3 Direct-Index Builder: out-of-core inverted-to-direct transposition.
//!
//! `build` is the whole pipeline described in §4.3's
//! pseudocode: repeatedly size a token-budgeted window of documents
//! (`scan_document_index_for_tokens`), traverse the inverted index once per
//! window gathering postings into per-document buffers
//! (`traverse_inverted_file`), flush those buffers to the direct posting
//! output stream, and finally rewrite the document index with the new
//! pointers. Everything here is single-threaded and sequential (§5).

pub mod buffer;

pub use buffer::DirectPostingBuffer;

use std::io::{Read, Write};

use crate::collection::{CollectionStatistics, DocumentIndexEntry, Pointer};
use crate::config::Inverted2DirectConfig;
use crate::error::{IndexError, IndexResult};
use crate::postings::{AnyPostingIterator, IterablePosting, EOL};
use crate::storage::fs::{
    read_document_index_entry, read_inverted_entry, OffsetsScratchReader, OffsetsScratchWriter,
};
use crate::storage::{CompressionConfiguration, DocumentIndexBuilder, Index};

const MIN_SUPPORTED_VERSION: f64 = 2.0;

/// Summary of a completed build. `tokens_observed` vs. the collection
/// statistics' `num_tokens` is the advisory token-mismatch check (§7,
/// §8 invariant 5 caveat: "when the source is consistent"), a mismatch is
/// logged via `log::warn!` and recorded here, never turned into an `Err`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub passes: u32,
    pub docs_processed: u64,
    pub tokens_observed: u64,
    pub token_mismatch: Option<(u64, u64)>,
}

/// Runs every §4.3 precondition check, in order, returning the first
/// violation. Each failure is a distinct diagnostic string and the index is
/// left untouched (no structure has been registered or opened for writing
/// yet at this point).
fn check_preconditions(index: &dyn Index) -> IndexResult<()> {
    if !index.has_structure("inverted") {
        return Err(IndexError::PreconditionFailure(
            "source structure 'inverted' does not exist".to_string(),
        ));
    }
    if index.has_structure("direct") {
        return Err(IndexError::PreconditionFailure(
            "destination structure 'direct' already exists".to_string(),
        ));
    }
    let version: f64 = index
        .property("index.version")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0);
    if version < MIN_SUPPORTED_VERSION {
        return Err(IndexError::PreconditionFailure(format!(
            "index version {version} is below the minimum supported {MIN_SUPPORTED_VERSION} \
             (older versions may not have aligned termIds)"
        )));
    }
    if index.property("lexicon.termids").as_deref() != Some("aligned") {
        return Err(IndexError::PreconditionFailure(
            "index does not declare lexicon.termids = aligned".to_string(),
        ));
    }
    Ok(())
}

/// §4.3.1: advance `reader` (the document-index input stream), summing
/// `docLength`, until the running sum reaches or exceeds `budget` tokens.
/// Returns the number of documents consumed, always at least 1 if the
/// stream has any document remaining. The stream is advanced destructively:
/// calling this again resumes immediately after the last document consumed.
pub fn scan_document_index_for_tokens(reader: &mut dyn Read, budget: u64) -> IndexResult<usize> {
    let mut consumed = 0usize;
    let mut tokens = 0u64;
    while tokens < budget {
        match read_document_index_entry(reader)? {
            None => break,
            Some(entry) => {
                tokens += entry.doc_length as u64;
                consumed += 1;
            }
        }
    }
    Ok(consumed)
}

/// §4.3.2: scan every term's posting list in the inverted stream, in the
/// order it appears, writing each posting whose docId falls in
/// `[first_docid, first_docid + buffers.len())` into the matching buffer.
/// `buffers[j].push` already performs the absolute-vs-gap termId encoding
/// (§3 "first entry stores the absolute termId, subsequent entries store
/// gaps") by tracking the previous termId it wrote, which is exactly what
/// the reference pseudocode's `usedFlag` array exists to drive (a buffer with
/// `df() == 0` has never been pushed to, so no separate flag is needed).
///
/// Returns the total token count (sum of `tf`) observed in this pass, for
/// the end-of-build token-mismatch check (§7).
pub fn traverse_inverted_file(
    reader: &mut dyn Read,
    first_docid: u32,
    buffers: &mut [DirectPostingBuffer],
    num_fields: usize,
) -> IndexResult<u64> {
    if buffers.is_empty() {
        return Ok(0);
    }
    let last_docid = first_docid + buffers.len() as u32 - 1;
    let mut tokens = 0u64;

    while let Some(record) = read_inverted_entry(reader)? {
        let mut it = AnyPostingIterator::new(&record.bytes, record.num_postings as usize, num_fields);
        let mut id = it.next_from(first_docid)?;
        if id == EOL || id > last_docid {
            continue;
        }
        while id <= last_docid {
            let j = (id - first_docid) as usize;
            buffers[j].push(record.term_id, it.frequency(), it.field_frequencies());
            tokens += it.frequency() as u64;
            id = it.next()?;
            if id == EOL {
                break;
            }
        }
    }

    Ok(tokens)
}

/// Tracks how many bytes have been written to the direct posting stream so
/// far, since `dyn Write` alone cannot report a position. Kept as a wrapper
/// rather than requiring `Seek` because `CompressionConfiguration`'s output
/// streams (§6) are write-only by contract.
struct CountingWriter<'a> {
    inner: &'a mut dyn Write,
    written: u64,
}

impl<'a> Write for CountingWriter<'a> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Runs the full transposition pipeline against the already-open `index`,
/// using `compression` to open the destination posting stream and
/// `scratch_dir` to stage the transient offsets file. `new_document_index_builder`
/// is called once, after the transposition passes complete, to start the
/// document-index rewrite; it is a closure rather than a plain argument so
/// callers can defer picking a provisional path until the structure name is
/// known.
pub fn build(
    index: &mut dyn Index,
    stats: &CollectionStatistics,
    compression: &dyn CompressionConfiguration,
    scratch_create: impl FnOnce() -> IndexResult<Box<dyn Write>>,
    scratch_open_read: impl FnOnce() -> IndexResult<Box<dyn Read>>,
    scratch_delete: impl FnOnce() -> IndexResult<()>,
    new_document_index_builder: impl FnOnce() -> IndexResult<Box<dyn DocumentIndexBuilder>>,
    config: &Inverted2DirectConfig,
) -> IndexResult<BuildReport> {
    check_preconditions(index)?;

    let direct_path = format!("direct.{}", compression.file_extension());
    let mut direct_out = compression.posting_output_stream(&direct_path).map_err(|e| {
        log::error!("failed to open direct posting output stream: {e}");
        e
    })?;
    let mut counting = CountingWriter { inner: direct_out.as_mut(), written: 0 };

    let mut scratch_writer = OffsetsScratchWriter::new(scratch_create()?);

    let mut doc_index_stream = index.open_input("document").map_err(|e| {
        log::error!("failed to open document-index input stream: {e}");
        e
    })?;

    let total_docs = stats.num_docs;
    let num_fields = stats.field_count;

    let mut first_docid: u64 = 0;
    let mut passes: u32 = 0;
    let mut tokens_observed: u64 = 0;
    let mut last_pointer = Pointer::new(0, 0, 0);

    while first_docid < total_docs {
        let n = scan_document_index_for_tokens(doc_index_stream.as_mut(), config.process_tokens)?;
        if n == 0 {
            break;
        }
        log::debug!("pass {passes}: window of {n} documents starting at doc {first_docid}");

        let mut inverted_stream = index.open_input("inverted")?;
        let mut buffers: Vec<DirectPostingBuffer> =
            (0..n).map(|_| DirectPostingBuffer::new(num_fields)).collect();

        let pass_tokens = traverse_inverted_file(
            inverted_stream.as_mut(),
            first_docid as u32,
            &mut buffers,
            num_fields,
        )?;
        tokens_observed += pass_tokens;
        drop(inverted_stream);

        last_pointer = flush_pass_counted(buffers, &mut counting, &mut scratch_writer, last_pointer)?;

        first_docid += n as u64;
        passes += 1;
        log::info!("completed pass {passes}: {first_docid}/{total_docs} documents transposed");
    }

    if first_docid != total_docs {
        return Err(IndexError::MalformedStream(format!(
            "document index exhausted after {first_docid} of {total_docs} documents"
        )));
    }

    counting.flush()?;
    drop(counting);
    drop(direct_out);
    scratch_writer.finish()?;

    // Rewrite the document index: a fresh pass over the same structure,
    // paired one-to-one with the offsets scratch file written above.
    let mut doc_index_stream = index.open_input("document")?;
    let mut scratch_reader = OffsetsScratchReader::new(scratch_open_read()?);
    let mut document_index_builder = new_document_index_builder()?;

    let mut docs_processed: u64 = 0;
    while let Some(old_entry) = read_document_index_entry(doc_index_stream.as_mut())? {
        let pointer = scratch_reader.read_entry()?.ok_or_else(|| {
            IndexError::MalformedStream(
                "offsets scratch file exhausted before document index".to_string(),
            )
        })?;
        document_index_builder.append(DocumentIndexEntry {
            doc_length: old_entry.doc_length,
            field_lengths: old_entry.field_lengths,
            pointer,
        })?;
        docs_processed += 1;
    }
    document_index_builder.finish()?;

    index.add_structure("direct", &direct_path)?;
    compression.write_index_properties(index, "direct", stats)?;
    index.flush()?;

    scratch_delete()?;

    let token_mismatch = if tokens_observed != stats.num_tokens {
        log::warn!(
            "token count mismatch after build: expected {} (collection statistics), observed {}",
            stats.num_tokens,
            tokens_observed
        );
        Some((stats.num_tokens, tokens_observed))
    } else {
        None
    };

    Ok(BuildReport { passes, docs_processed, tokens_observed, token_mismatch })
}

/// Flushes one pass's buffers to the direct posting output stream in docId
/// order, writing `(byteOffset, bitOffset, df)` rows to the offsets
/// scratch file as it goes (§4.3 main loop body). Every posting list is
/// byte-aligned on write (`into_padded_bytes` always ends on a byte
/// boundary), so a fresh list always starts at `bit_offset = 0`. Returns
/// the pointer of the last non-empty document written, for empty
/// documents later in the same or a subsequent pass to inherit (§3
/// invariant 3).
fn flush_pass_counted(
    buffers: Vec<DirectPostingBuffer>,
    direct_out: &mut CountingWriter<'_>,
    scratch: &mut OffsetsScratchWriter,
    mut last_pointer: Pointer,
) -> IndexResult<Pointer> {
    for buffer in buffers {
        let df = buffer.df();
        let pointer = if df > 0 {
            let bytes = buffer.into_padded_bytes();
            let byte_offset = direct_out.written;
            direct_out.write_all(&bytes)?;
            let pointer = Pointer::new(byte_offset, 0, df);
            last_pointer = pointer;
            pointer
        } else {
            Pointer::new(last_pointer.byte_offset, last_pointer.bit_offset, 0)
        };
        scratch.write_entry(pointer)?;
    }
    Ok(last_pointer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postings::BasicPostingIterator;
    use crate::storage::fs::{
        write_document_index_entry, write_inverted_entry, BasicCompressionConfiguration, FsDocumentIndexBuilder,
        FsIndex,
    };
    use crate::storage::{Directory, MemoryDirectory};
    use std::sync::Arc;

    fn fixture_index(dir: Arc<dyn Directory>) -> FsIndex {
        let mut index = FsIndex::open(dir).unwrap();
        index.set_property("index.version", "2.0");
        index.set_property("lexicon.termids", "aligned");
        index
    }

    fn write_document_index(dir: &dyn Directory, path: &str, lengths: &[u32]) {
        let mut buf = Vec::new();
        for &len in lengths {
            write_document_index_entry(
                &mut buf,
                &DocumentIndexEntry { doc_length: len, field_lengths: None, pointer: Pointer::new(0, 0, 0) },
            )
            .unwrap();
        }
        dir.atomic_write(path, &buf).unwrap();
    }

    fn write_inverted_index(dir: &dyn Directory, path: &str, postings: &[(u32, &[(u32, u32)])]) {
        let mut buf = Vec::new();
        for (term_id, list) in postings {
            let encoded = BasicPostingIterator::encode(list);
            write_inverted_entry(&mut buf, *term_id, list.len() as u32, &encoded).unwrap();
        }
        dir.atomic_write(path, &buf).unwrap();
    }

    fn stats(num_docs: u64, num_tokens: u64) -> CollectionStatistics {
        CollectionStatistics {
            num_docs,
            num_terms: 0,
            num_tokens,
            num_pointers: 0,
            field_count: 0,
            field_names: Vec::new(),
            field_tokens: Vec::new(),
        }
    }

    /// §8 scenario S1: budget 4, two passes, verifying the exact direct
    /// output named by the scenario.
    #[test]
    fn scenario_s1_small_budget_multi_pass_transposition() {
        let dir: Arc<dyn Directory> = Arc::new(MemoryDirectory::new());
        write_document_index(dir.as_ref(), "document", &[2, 3, 5]);
        write_inverted_index(
            dir.as_ref(),
            "inverted",
            &[
                (0, &[(0, 2), (2, 1)]),
                (1, &[(1, 3)]),
                (2, &[(0, 1), (1, 1), (2, 4)]),
            ],
        );

        let mut index = fixture_index(dir.clone());
        index.add_structure("document", "document").unwrap();
        index.add_structure("inverted", "inverted").unwrap();

        let compression = BasicCompressionConfiguration::new(dir.clone());
        let s = stats(3, 2 + 3 + 1 + 1 + 1 + 4);
        let config = Inverted2DirectConfig { process_tokens: 4 };

        let report = run_build(&mut index, &s, &compression, dir.clone(), &config);

        assert_eq!(report.passes, 2);
        assert_eq!(report.docs_processed, 3);
        assert!(report.token_mismatch.is_none());

        let bytes = read_direct_bytes(dir.as_ref());
        let doc_entries = read_doc_entries(dir.as_ref());
        assert_eq!(doc_entries.len(), 3);

        let expected = [
            vec![(0u32, 2u32), (2, 1)],
            vec![(1u32, 3u32), (2, 1)],
            vec![(0u32, 1u32), (2, 4)],
        ];
        for (entry, expected_postings) in doc_entries.iter().zip(expected.iter()) {
            let mut it = BasicPostingIterator::at(
                &bytes,
                entry.pointer.byte_offset,
                entry.pointer.bit_offset,
                entry.pointer.num_entries as usize,
            );
            for &(id, tf) in expected_postings {
                assert_eq!(it.next().unwrap(), id);
                assert_eq!(it.frequency(), tf);
            }
        }
        assert_eq!(doc_entries[0].doc_length, 2);
        assert_eq!(doc_entries[1].doc_length, 3);
        assert_eq!(doc_entries[2].doc_length, 5);
    }

    /// §8 scenario S2: same input, budget large enough for a single pass,
    /// identical direct output.
    #[test]
    fn scenario_s2_large_budget_single_pass_matches_multi_pass() {
        let dir: Arc<dyn Directory> = Arc::new(MemoryDirectory::new());
        write_document_index(dir.as_ref(), "document", &[2, 3, 5]);
        write_inverted_index(
            dir.as_ref(),
            "inverted",
            &[
                (0, &[(0, 2), (2, 1)]),
                (1, &[(1, 3)]),
                (2, &[(0, 1), (1, 1), (2, 4)]),
            ],
        );

        let mut index = fixture_index(dir.clone());
        index.add_structure("document", "document").unwrap();
        index.add_structure("inverted", "inverted").unwrap();

        let compression = BasicCompressionConfiguration::new(dir.clone());
        let s = stats(3, 12);
        let config = Inverted2DirectConfig { process_tokens: 100_000_000 };

        let report = run_build(&mut index, &s, &compression, dir.clone(), &config);
        assert_eq!(report.passes, 1);

        let doc_entries = read_doc_entries(dir.as_ref());
        assert_eq!(doc_entries.len(), 3);
        assert_eq!(doc_entries[0].pointer.num_entries, 2);
        assert_eq!(doc_entries[1].pointer.num_entries, 2);
        assert_eq!(doc_entries[2].pointer.num_entries, 2);
    }

    /// §8 scenario S3: an empty document reuses the preceding pointer with
    /// `num_entries = 0`.
    #[test]
    fn scenario_s3_empty_document_shares_preceding_pointer() {
        let dir: Arc<dyn Directory> = Arc::new(MemoryDirectory::new());
        write_document_index(dir.as_ref(), "document", &[2, 0, 1]);
        write_inverted_index(
            dir.as_ref(),
            "inverted",
            &[(0, &[(0, 2)]), (1, &[(2, 1)])],
        );

        let mut index = fixture_index(dir.clone());
        index.add_structure("document", "document").unwrap();
        index.add_structure("inverted", "inverted").unwrap();

        let compression = BasicCompressionConfiguration::new(dir.clone());
        let s = stats(3, 3);
        let config = Inverted2DirectConfig::default();

        run_build(&mut index, &s, &compression, dir.clone(), &config);

        let doc_entries = read_doc_entries(dir.as_ref());
        assert_eq!(doc_entries[1].pointer.num_entries, 0);
        assert_eq!(doc_entries[1].pointer, Pointer::new(doc_entries[0].pointer.byte_offset, doc_entries[0].pointer.bit_offset, 0));
    }

    /// §8 scenario S6: non-aligned termIds abort the build before anything
    /// is registered.
    #[test]
    fn scenario_s6_non_aligned_termids_aborts_cleanly() {
        let dir: Arc<dyn Directory> = Arc::new(MemoryDirectory::new());
        write_document_index(dir.as_ref(), "document", &[1]);
        write_inverted_index(dir.as_ref(), "inverted", &[(0, &[(0, 1)])]);

        let mut index = FsIndex::open(dir.clone()).unwrap();
        index.set_property("index.version", "2.0");
        index.set_property("lexicon.termids", "scattered");
        index.add_structure("document", "document").unwrap();
        index.add_structure("inverted", "inverted").unwrap();

        let compression = BasicCompressionConfiguration::new(dir.clone());
        let s = stats(1, 1);
        let config = Inverted2DirectConfig::default();

        let result = build(
            &mut index,
            &s,
            &compression,
            || dir.create_file("direct.offsets.tmp"),
            || dir.open_file("direct.offsets.tmp"),
            || dir.delete("direct.offsets.tmp"),
            || {
                Ok(Box::new(FsDocumentIndexBuilder::new(
                    dir.clone(),
                    "document.tmp".to_string(),
                    "document".to_string(),
                )) as Box<dyn DocumentIndexBuilder>)
            },
            &config,
        );

        assert!(matches!(result, Err(IndexError::PreconditionFailure(_))));
        assert!(!index.has_structure("direct"));
    }

    /// §8 scenario S4: with a field-aware index, per-field frequencies
    /// survive the inverted-to-direct rewrite unchanged.
    #[test]
    fn scenario_s4_field_frequencies_preserved() {
        use crate::postings::FieldAwarePostingIterator;

        let dir: Arc<dyn Directory> = Arc::new(MemoryDirectory::new());
        write_document_index(dir.as_ref(), "document", &[0, 0, 0, 0, 0, 0, 0, 10]);

        let mut buf = Vec::new();
        let encoded = FieldAwarePostingIterator::encode(&[(7u32, 3u32, vec![2u32, 1])]);
        write_inverted_entry(&mut buf, 5, 1, &encoded).unwrap();
        dir.atomic_write("inverted", &buf).unwrap();

        let mut index = fixture_index(dir.clone());
        index.add_structure("document", "document").unwrap();
        index.add_structure("inverted", "inverted").unwrap();

        let compression = BasicCompressionConfiguration::new(dir.clone());
        let s = CollectionStatistics {
            num_docs: 8,
            num_terms: 0,
            num_tokens: 3,
            num_pointers: 0,
            field_count: 2,
            field_names: vec!["title".to_string(), "body".to_string()],
            field_tokens: Vec::new(),
        };
        let config = Inverted2DirectConfig::default();

        // The source has a single document (docId 7); pad its window so
        // `traverse_inverted_file` covers docId 7 at index 7.
        let report = run_build(&mut index, &s, &compression, dir.clone(), &config);
        assert_eq!(report.passes, 1);

        let bytes = read_direct_bytes(dir.as_ref());
        let doc_entries = read_doc_entries(dir.as_ref());
        let entry = &doc_entries[7];
        assert_eq!(entry.pointer.num_entries, 1);

        let mut it = crate::postings::FieldAwarePostingIterator::at(
            &bytes,
            entry.pointer.byte_offset,
            entry.pointer.bit_offset,
            entry.pointer.num_entries as usize,
            2,
        );
        assert_eq!(it.next().unwrap(), 5);
        assert_eq!(it.frequency(), 3);
        assert_eq!(it.field_frequencies(), Some(&[2u32, 1u32][..]));

        // §6: the destination structure's properties mirror the source
        // collection's field configuration, not the codec's own default.
        assert_eq!(index.property("direct.fields").as_deref(), Some("true"));
        assert_eq!(index.property("direct.fieldcount").as_deref(), Some("2"));
        assert_eq!(index.property("direct.fieldnames").as_deref(), Some("title,body"));
    }

    fn run_build(
        index: &mut FsIndex,
        stats: &CollectionStatistics,
        compression: &BasicCompressionConfiguration,
        dir: Arc<dyn Directory>,
        config: &Inverted2DirectConfig,
    ) -> BuildReport {
        build(
            index,
            stats,
            compression,
            || dir.create_file("direct.offsets.tmp"),
            || dir.open_file("direct.offsets.tmp"),
            || dir.delete("direct.offsets.tmp"),
            || {
                Ok(Box::new(FsDocumentIndexBuilder::new(
                    dir.clone(),
                    "document.tmp".to_string(),
                    "document".to_string(),
                )) as Box<dyn DocumentIndexBuilder>)
            },
            config,
        )
        .unwrap()
    }

    fn read_direct_bytes(dir: &dyn Directory) -> Vec<u8> {
        let mut bytes = Vec::new();
        dir.open_file("direct.bposting").unwrap().read_to_end(&mut bytes).unwrap();
        bytes
    }

    fn read_doc_entries(dir: &dyn Directory) -> Vec<DocumentIndexEntry> {
        let mut bytes = Vec::new();
        dir.open_file("document").unwrap().read_to_end(&mut bytes).unwrap();
        crate::storage::fs::read_document_index(&bytes).unwrap()
    }
}
