//! Recognised configuration keys (§6) and the manager plugin registry
//! (§9, §10.3).
//!
//! Both configs mirror how the original system reads `*.properties`
//! through its index object rather than a dedicated config file format:
//! `from_properties` reads the same string-keyed lookup `Index` already
//! exposes, so configuration has exactly one source instead of a second
//! loading path this crate would have to invent.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::manager::PostingListManager;
use crate::storage::Index;

pub const DEFAULT_PROCESS_TOKENS: u64 = 100_000_000;
pub const DEFAULT_LOW_IDF_DF_THRESHOLD_FRACTION: f64 = 0.25;

/// Configuration for `direct_index::build` (§6 `inverted2direct.*`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inverted2DirectConfig {
    /// Token budget per transposition pass; controls window size and
    /// therefore peak memory.
    pub process_tokens: u64,
}

impl Default for Inverted2DirectConfig {
    fn default() -> Self {
        Self { process_tokens: DEFAULT_PROCESS_TOKENS }
    }
}

impl Inverted2DirectConfig {
    pub fn from_properties(index: &dyn Index) -> Self {
        let process_tokens = index
            .property("inverted2direct.processtokens")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PROCESS_TOKENS);
        Self { process_tokens }
    }
}

/// Configuration for `PostingListManager::assemble` (§6 `ignore.low.idf.terms`,
/// `matching.postinglist.manager.plugins`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManagerConfig {
    pub ignore_low_idf_terms: bool,
    /// Fraction of `num_docs` above which a term's `df` is considered "low
    /// IDF" and dropped during assembly when `ignore_low_idf_terms` is set.
    /// Not named directly in §6 (which treats the threshold as
    /// "implementation-configurable"); this crate exposes it as a field
    /// rather than hard-coding it.
    pub low_idf_df_threshold_fraction: f64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            ignore_low_idf_terms: true,
            low_idf_df_threshold_fraction: DEFAULT_LOW_IDF_DF_THRESHOLD_FRACTION,
        }
    }
}

impl ManagerConfig {
    pub fn from_properties(index: &dyn Index) -> Self {
        let ignore_low_idf_terms = index
            .property("ignore.low.idf.terms")
            .map(|v| v == "true")
            .unwrap_or(true);
        Self { ignore_low_idf_terms, ..Self::default() }
    }
}

/// A registered manager plugin (§4.4 "Plugin hook"): runs once per query,
/// in registration order, after initial term assembly, and may mutate the
/// manager's parallel arrays in place.
pub trait ManagerPlugin: Send + Sync {
    fn apply(&self, manager: &mut PostingListManager, index: &dyn Index);
}

type PluginFactory = fn() -> Box<dyn ManagerPlugin>;

fn registry() -> &'static Mutex<HashMap<String, PluginFactory>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, PluginFactory>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers a plugin factory under `id`. Call during process startup; a
/// process-wide `OnceLock`-guarded map replaces the dynamic class loading
/// the original system used for this (§9); there is no reflection
/// mechanism to imitate here.
pub fn register_plugin(id: &str, factory: PluginFactory) {
    registry().lock().unwrap().insert(id.to_string(), factory);
}

/// Resolves a comma-delimited plugin id list (the
/// `matching.postinglist.manager.plugins` property) against the registry,
/// preserving the listed order. Unknown ids are silently skipped rather
/// than failing assembly, a query should still run without a plugin that
/// was never registered in this process.
pub(crate) fn resolve_plugins(csv: &str) -> Vec<Box<dyn ManagerPlugin>> {
    if csv.trim().is_empty() {
        return Vec::new();
    }
    let reg = registry().lock().unwrap();
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|id| reg.get(id).map(|factory| factory()))
        .collect()
}
