//! §4.4 Posting-List Manager: the query-time coordinator that turns a
//! parsed query into the parallel-array structure a ranking driver walks.
//!
//! `QueryTerm` replaces the original `QueryTerm -> MultiQueryTerm ->
//! SynonymTerm` inheritance hierarchy with a tagged variant (§9): a
//! `Synonym` opens every alternative's posting list through the lexicon,
//! sums their statistics, and wraps the iterators in a `MergedPostingIterator`
//! so the manager still only ever holds one `IterablePosting` per effective
//! term.

use crate::collection::{CollectionStatistics, EntryStatistics};
use crate::config::{resolve_plugins, ManagerConfig};
use crate::error::{IndexError, IndexResult};
use crate::model::WeightingModel;
use crate::postings::{IterablePosting, MergedPostingIterator};
use crate::storage::{Index, Lexicon, PostingIndex};

/// A query term prior to assembly. `required` marks a MUST-match operand;
/// once assembled its position feeds `PostingListManager::required_mask`.
#[derive(Debug, Clone)]
pub enum QueryTerm {
    Single { text: String, key_freq: f32, required: bool },
    /// A synonym group (`#syn(...)` in the original query syntax, §8 S5):
    /// any alternative matching is enough to match the group.
    Synonym { alternatives: Vec<String>, display: String, key_freq: f32, required: bool },
}

impl QueryTerm {
    pub fn single(text: impl Into<String>) -> Self {
        Self::Single { text: text.into(), key_freq: 1.0, required: false }
    }

    pub fn synonym(alternatives: Vec<String>, display: impl Into<String>) -> Self {
        Self::Synonym { alternatives, display: display.into(), key_freq: 1.0, required: false }
    }

    pub fn with_key_freq(mut self, key_freq: f32) -> Self {
        match &mut self {
            Self::Single { key_freq: k, .. } | Self::Synonym { key_freq: k, .. } => *k = key_freq,
        }
        self
    }

    pub fn required(mut self) -> Self {
        match &mut self {
            Self::Single { required, .. } | Self::Synonym { required, .. } => *required = true,
        }
        self
    }

    pub fn display(&self) -> &str {
        match self {
            Self::Single { text, .. } => text,
            Self::Synonym { display, .. } => display,
        }
    }

    pub fn key_frequency(&self) -> f32 {
        match self {
            Self::Single { key_freq, .. } | Self::Synonym { key_freq, .. } => *key_freq,
        }
    }

    pub fn is_required(&self) -> bool {
        match self {
            Self::Single { required, .. } | Self::Synonym { required, .. } => *required,
        }
    }

    /// Resolves this term against the lexicon and posting index, producing
    /// a single iterator and merged statistics, or `None` if it matches
    /// nothing (§4.4: unseen lexicon entry for a single term, or every
    /// alternative of a synonym group unseen).
    fn resolve(
        &self,
        lexicon: &dyn Lexicon,
        postings: &dyn PostingIndex,
    ) -> IndexResult<Option<(Box<dyn IterablePosting>, EntryStatistics)>> {
        match self {
            Self::Single { text, .. } => {
                let Some(entry) = lexicon.lookup(text) else { return Ok(None) };
                let it = postings.postings(entry.pointer)?;
                Ok(Some((it, EntryStatistics { df: entry.df as u64, cf: entry.tf })))
            }
            Self::Synonym { alternatives, .. } => {
                let mut members: Vec<Box<dyn IterablePosting>> = Vec::new();
                let mut stats = EntryStatistics::default();
                for alt in alternatives {
                    let Some(entry) = lexicon.lookup(alt) else { continue };
                    members.push(postings.postings(entry.pointer)?);
                    stats.df += entry.df as u64;
                    stats.cf += entry.tf;
                }
                if members.is_empty() {
                    return Ok(None);
                }
                let merged = MergedPostingIterator::new(members)?;
                Ok(Some((Box::new(merged), stats)))
            }
        }
    }
}

/// Per-query assembly of iterators, weighting models, merged statistics
/// and the required-term bitmask (§4.4). Owned by a single query-evaluation
/// thread; not `Send`/`Sync` (its `IterablePosting` cursors are not
/// designed for cross-thread sharing, §5).
pub struct PostingListManager {
    postings: Vec<Box<dyn IterablePosting>>,
    models: Vec<Vec<Box<dyn WeightingModel>>>,
    stats: Vec<EntryStatistics>,
    terms: Vec<String>,
    key_freqs: Vec<f32>,
    required_mask: u64,
    num_terms: usize,
    prepared: bool,
}

impl PostingListManager {
    /// Assembles a manager from parsed query terms (§4.4 "Assembly
    /// protocol"). `model_factory` builds the weighting models for one
    /// effective term from its merged statistics; callers that need a
    /// different model per term (rather than one factory for all) can
    /// branch on `EntryStatistics` or on the term text passed alongside it.
    pub fn assemble(
        index: &dyn Index,
        lexicon: &dyn Lexicon,
        postings_index: &dyn PostingIndex,
        stats: &CollectionStatistics,
        query_terms: &[QueryTerm],
        config: &ManagerConfig,
        model_factory: impl Fn(&str, &EntryStatistics) -> Vec<Box<dyn WeightingModel>>,
    ) -> IndexResult<Self> {
        let low_idf_threshold =
            (stats.num_docs as f64 * config.low_idf_df_threshold_fraction).round() as u64;

        let mut manager = Self {
            postings: Vec::new(),
            models: Vec::new(),
            stats: Vec::new(),
            terms: Vec::new(),
            key_freqs: Vec::new(),
            required_mask: 0,
            num_terms: 0,
            prepared: false,
        };

        for term in query_terms {
            let Some((posting, entry_stats)) = term.resolve(lexicon, postings_index)? else {
                log::debug!("query term '{}' resolved to nothing, skipping", term.display());
                continue;
            };
            if config.ignore_low_idf_terms && entry_stats.df > low_idf_threshold {
                log::debug!(
                    "query term '{}' dropped by low-idf filtering (df={}, threshold={})",
                    term.display(),
                    entry_stats.df,
                    low_idf_threshold
                );
                continue;
            }

            let effective_index = manager.postings.len();
            if effective_index >= u64::BITS as usize {
                return Err(IndexError::PreconditionFailure(
                    "too many effective query terms for a u64 required-term bitmask".to_string(),
                ));
            }
            if term.is_required() {
                manager.required_mask |= 1 << effective_index;
            }
            manager.models.push(model_factory(term.display(), &entry_stats));
            manager.stats.push(entry_stats);
            manager.terms.push(term.display().to_string());
            manager.key_freqs.push(term.key_frequency());
            manager.postings.push(posting);
        }

        if let Some(csv) = index.property("matching.postinglist.manager.plugins") {
            for plugin in resolve_plugins(&csv) {
                plugin.apply(&mut manager, index);
            }
        }

        Ok(manager)
    }

    /// Finalises `num_terms` and, if `first_move`, advances every iterator
    /// one step so the first `doc_id()`/`score()` call is valid. Must be
    /// called exactly once before scoring (§4.4).
    pub fn prepare(&mut self, first_move: bool) -> IndexResult<()> {
        self.num_terms = self.postings.len();
        if first_move {
            for posting in self.postings.iter_mut() {
                posting.next()?;
            }
        }
        self.prepared = true;
        Ok(())
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn len(&self) -> usize {
        self.num_terms
    }

    pub fn is_empty(&self) -> bool {
        self.num_terms == 0
    }

    pub fn num_terms(&self) -> usize {
        self.num_terms
    }

    pub fn required_mask(&self) -> u64 {
        self.required_mask
    }

    fn check_index(&self, i: usize) -> IndexResult<()> {
        if i >= self.num_terms {
            return Err(IndexError::IndexOutOfRange { index: i, len: self.num_terms });
        }
        Ok(())
    }

    pub fn posting(&self, i: usize) -> IndexResult<&dyn IterablePosting> {
        self.check_index(i)?;
        Ok(self.postings[i].as_ref())
    }

    pub fn posting_mut(&mut self, i: usize) -> IndexResult<&mut dyn IterablePosting> {
        self.check_index(i)?;
        Ok(self.postings[i].as_mut())
    }

    pub fn statistics(&self, i: usize) -> IndexResult<EntryStatistics> {
        self.check_index(i)?;
        Ok(self.stats[i])
    }

    pub fn term(&self, i: usize) -> IndexResult<&str> {
        self.check_index(i)?;
        Ok(&self.terms[i])
    }

    pub fn key_frequency(&self, i: usize) -> IndexResult<f32> {
        self.check_index(i)?;
        Ok(self.key_freqs[i])
    }

    /// Sums `model.score(posting)` over term `i`'s weighting models at the
    /// iterator's current position (§4.4 `score(i)`).
    pub fn score(&self, i: usize) -> IndexResult<f32> {
        self.check_index(i)?;
        let posting = self.postings[i].as_ref();
        Ok(self.models[i].iter().map(|model| model.score(posting)).sum())
    }

    /// Closes every iterator. Idempotent: each `IterablePosting::close`
    /// implementation tolerates repeated calls (§4.4).
    pub fn close(&mut self) {
        for posting in self.postings.iter_mut() {
            posting.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bm25Weight;
    use crate::postings::BasicPostingIterator;
    use crate::storage::fs::{FsIndex, FsLexicon, FsPostingIndex};
    use crate::storage::MemoryDirectory;
    use crate::collection::{LexiconEntry, Pointer};
    use std::sync::Arc;

    fn stats(num_docs: u64) -> CollectionStatistics {
        CollectionStatistics {
            num_docs,
            num_terms: 0,
            num_tokens: num_docs * 10,
            num_pointers: 0,
            field_count: 0,
            field_names: Vec::new(),
            field_tokens: Vec::new(),
        }
    }

    fn build_posting_index(lists: &[&[(u32, u32)]]) -> (FsPostingIndex, Vec<Pointer>) {
        let mut bytes = Vec::new();
        let mut pointers = Vec::new();
        for list in lists {
            let offset = bytes.len() as u64;
            bytes.extend(BasicPostingIterator::encode(list));
            pointers.push(Pointer::new(offset, 0, list.len() as u32));
        }
        (FsPostingIndex::new(bytes), pointers)
    }

    fn model_factory(s: &CollectionStatistics) -> impl Fn(&str, &EntryStatistics) -> Vec<Box<dyn WeightingModel>> + '_ {
        move |_term, entry| vec![Box::new(Bm25Weight::with_defaults(s, entry.df)) as Box<dyn WeightingModel>]
    }

    /// §8 invariant 6: `posting(i).doc_id()` after `prepare(true)` equals
    /// the first docId in the underlying list.
    #[test]
    fn prepare_first_move_positions_iterator_at_first_posting() {
        let (posting_index, pointers) =
            build_posting_index(&[&[(3u32, 2u32), (7, 1)]]);
        let mut lexicon = FsLexicon::new();
        lexicon.insert(
            "cat".to_string(),
            LexiconEntry { term_id: 0, df: 2, tf: 3, pointer: pointers[0] },
        );

        let dir: Arc<dyn crate::storage::Directory> = Arc::new(MemoryDirectory::new());
        let index = FsIndex::open(dir).unwrap();
        let s = stats(100);

        let mut manager = PostingListManager::assemble(
            &index,
            &lexicon,
            &posting_index,
            &s,
            &[QueryTerm::single("cat")],
            &ManagerConfig::default(),
            model_factory(&s),
        )
        .unwrap();
        manager.prepare(true).unwrap();

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.posting(0).unwrap().doc_id(), 3);
        assert!(manager.score(0).unwrap() > 0.0);
    }

    /// §8 scenario S5: a synonym group merges df/cf by summation and wraps
    /// both alternatives' posting lists in one OR-merged iterator.
    #[test]
    fn synonym_term_merges_statistics_and_postings() {
        let (posting_index, pointers) = build_posting_index(&[
            &[(0u32, 1u32), (4, 2)],
            &[(1u32, 1u32), (4, 3)],
        ]);
        let mut lexicon = FsLexicon::new();
        lexicon.insert(
            "cat".to_string(),
            LexiconEntry { term_id: 0, df: 10, tf: 25, pointer: pointers[0] },
        );
        lexicon.insert(
            "kitten".to_string(),
            LexiconEntry { term_id: 1, df: 4, tf: 7, pointer: pointers[1] },
        );

        let dir: Arc<dyn crate::storage::Directory> = Arc::new(MemoryDirectory::new());
        let index = FsIndex::open(dir).unwrap();
        let s = stats(1000);

        let mut manager = PostingListManager::assemble(
            &index,
            &lexicon,
            &posting_index,
            &s,
            &[QueryTerm::synonym(vec!["cat".to_string(), "kitten".to_string()], "cat kitten")],
            &ManagerConfig::default(),
            model_factory(&s),
        )
        .unwrap();

        assert_eq!(manager.len(), 1);
        let entry_stats = manager.statistics(0).unwrap();
        assert_eq!(entry_stats.df, 14);
        assert_eq!(entry_stats.cf, 32);

        manager.prepare(true).unwrap();
        assert_eq!(manager.posting(0).unwrap().doc_id(), 0);
        let mut docids = vec![manager.posting(0).unwrap().doc_id()];
        while manager.posting_mut(0).unwrap().next().unwrap() != crate::postings::EOL {
            docids.push(manager.posting(0).unwrap().doc_id());
        }
        assert_eq!(docids, vec![0, 1, 4]);
    }

    /// An unseen term does not leave a hole: `required_mask` indexes the
    /// effective position, not the original query position.
    #[test]
    fn unresolved_term_is_skipped_without_a_hole() {
        let (posting_index, pointers) = build_posting_index(&[&[(0u32, 1u32)]]);
        let mut lexicon = FsLexicon::new();
        lexicon.insert(
            "known".to_string(),
            LexiconEntry { term_id: 0, df: 1, tf: 1, pointer: pointers[0] },
        );

        let dir: Arc<dyn crate::storage::Directory> = Arc::new(MemoryDirectory::new());
        let index = FsIndex::open(dir).unwrap();
        let s = stats(10);

        let mut manager = PostingListManager::assemble(
            &index,
            &lexicon,
            &posting_index,
            &s,
            &[
                QueryTerm::single("missing"),
                QueryTerm::single("known").required(),
            ],
            &ManagerConfig::default(),
            model_factory(&s),
        )
        .unwrap();
        manager.prepare(true).unwrap();

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.term(0).unwrap(), "known");
        assert_eq!(manager.required_mask(), 0b1);
    }

    #[test]
    fn out_of_range_index_errors() {
        let dir: Arc<dyn crate::storage::Directory> = Arc::new(MemoryDirectory::new());
        let index = FsIndex::open(dir).unwrap();
        let lexicon = FsLexicon::new();
        let (posting_index, _) = build_posting_index(&[]);
        let s = stats(10);

        let mut manager = PostingListManager::assemble(
            &index,
            &lexicon,
            &posting_index,
            &s,
            &[],
            &ManagerConfig::default(),
            model_factory(&s),
        )
        .unwrap();
        manager.prepare(true).unwrap();

        assert!(matches!(
            manager.score(0),
            Err(IndexError::IndexOutOfRange { index: 0, len: 0 })
        ));
    }
}
