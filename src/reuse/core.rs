//! Core reuse: a cached unsat core applies when all its clauses occur in the
//! query. Containment is textual; the query is not re-checked.

use std::time::Instant;

use crate::expr::Expr;
use crate::solution::Core;
use crate::stats::Stats;
use crate::store::KeyStore;

/// Find a cached core contained in `target`.
///
/// Fetches the `k` entries nearest to `key` (no size filter) and returns the
/// first non-empty core whose every clause appears parenthesized in the
/// canonical form of `target`.
pub fn find_core(store: &KeyStore<Core>, key: f64, target: &Expr, k: usize, stats: &Stats) -> Option<Core> {
    let candidates = stats
        .core_extraction_time
        .time(|| store.nearest(key, k, None));

    let testing = Instant::now();
    let found = candidates
        .iter()
        .map(|entry| entry.payload())
        .filter(|core| !core.is_empty())
        .find(|core| {
            stats.cores_tested.incr();
            core.is_contained_in(target)
        })
        .cloned();
    stats.core_testing_time.record_since(testing);

    if found.is_some() {
        stats.cores_reused.incr();
    }
    found
}
