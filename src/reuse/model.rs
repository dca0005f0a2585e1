//! Model reuse: nearest-K candidates re-evaluated under the strict evaluator.

use std::time::Instant;

use crate::error::TraversalError;
use crate::expr::Expr;
use crate::expr::eval::Evaluator;
use crate::solution::Model;
use crate::stats::Stats;
use crate::store::KeyStore;

/// Find a cached model that satisfies `target`.
///
/// Fetches the `k` entries whose key is nearest to `key` among those with at
/// most `size` variables, and accepts the first one under which `target`
/// evaluates to true. A candidate that divides by zero is rejected; any other
/// traversal error aborts the lookup. The accepted model is trimmed to
/// `size` assignments.
pub fn find_model(
    store: &KeyStore<Model>,
    key: f64,
    target: &Expr,
    size: usize,
    k: usize,
    stats: &Stats,
) -> Result<Option<Model>, TraversalError> {
    let candidates = stats
        .model_extraction_time
        .time(|| store.nearest(key, k, Some(size)));

    let testing = Instant::now();
    let mut accepted = None;
    for candidate in &candidates {
        let model = candidate.payload();
        let verdict = stats
            .model_evaluation_time
            .time(|| Evaluator::new(model).satisfies(target));
        match verdict {
            Ok(true) => {
                stats.models_reused.incr();
                accepted = Some(trim_model(model, size, stats));
                break;
            }
            Ok(false) => stats.models_tested.incr(),
            Err(TraversalError::DivisionByZero { operator }) => {
                stats.models_tested.incr();
                tracing::debug!(%operator, model = %model, "candidate model divides by zero, rejected");
            }
            Err(e) => {
                stats.model_testing_time.record_since(testing);
                return Err(e);
            }
        }
    }
    stats.model_testing_time.record_since(testing);
    Ok(accepted)
}

/// Trim a reused model to the query's variable count.
///
/// A model with exactly `size` assignments is returned unchanged, a larger
/// one keeps its first `size` assignments in variable order. A smaller one
/// cannot come out of a size-filtered lookup; it is logged and counted as a
/// cache inconsistency and returned as-is.
pub fn trim_model(model: &Model, size: usize, stats: &Stats) -> Model {
    match model.len().cmp(&size) {
        std::cmp::Ordering::Equal => model.clone(),
        std::cmp::Ordering::Greater => model.trimmed(size),
        std::cmp::Ordering::Less => {
            tracing::warn!(
                model_size = model.len(),
                query_size = size,
                "cache inconsistency: reused model has fewer assignments than the query"
            );
            stats.cache_inconsistencies.incr();
            model.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Constant, Variable};
    use crate::store::CacheEntry;

    fn x() -> Variable {
        Variable::int("x", -100, 100)
    }

    fn y() -> Variable {
        Variable::int("y", -100, 100)
    }

    fn z() -> Variable {
        Variable::int("z", -100, 100)
    }

    fn model(values: &[(Variable, i64)]) -> Model {
        values
            .iter()
            .map(|(v, c)| (v.clone(), Constant::Int(*c)))
            .collect()
    }

    fn both_below(bound: i64) -> Expr {
        Expr::and(
            Expr::lt(Expr::var(x()), Expr::int(bound)),
            Expr::lt(Expr::var(y()), Expr::int(bound)),
        )
    }

    #[test]
    fn accepts_first_satisfying_candidate() {
        let store = KeyStore::new();
        store.insert(CacheEntry::new(10.0, 2, model(&[(x(), 9), (y(), 9)])));
        store.insert(CacheEntry::new(11.0, 2, model(&[(x(), 1), (y(), 1)])));
        let stats = Stats::new();

        let found = find_model(&store, 10.0, &both_below(5), 2, 10, &stats).unwrap();
        assert_eq!(found, Some(model(&[(x(), 1), (y(), 1)])));
        let snap = stats.snapshot();
        // Only the rejected candidate counts as tested.
        assert_eq!(snap.models_tested, 1);
        assert_eq!(snap.models_reused, 1);
    }

    #[test]
    fn no_valid_candidate_is_none() {
        let store = KeyStore::new();
        store.insert(CacheEntry::new(1.0, 2, model(&[(x(), 50), (y(), 50)])));
        let stats = Stats::new();
        assert_eq!(find_model(&store, 1.0, &both_below(5), 2, 10, &stats).unwrap(), None);
        assert_eq!(
            find_model(&KeyStore::new(), 1.0, &both_below(5), 2, 10, &stats).unwrap(),
            None
        );
        assert_eq!(stats.snapshot().models_reused, 0);
    }

    #[test]
    fn larger_candidates_are_filtered_out() {
        let store = KeyStore::new();
        store.insert(CacheEntry::new(0.0, 3, model(&[(x(), 0), (y(), 0), (z(), 0)])));
        let stats = Stats::new();
        assert_eq!(find_model(&store, 0.0, &both_below(5), 2, 10, &stats).unwrap(), None);
        assert_eq!(stats.snapshot().models_tested, 0);
    }

    #[test]
    fn missing_variables_evaluate_to_zero() {
        let store = KeyStore::new();
        store.insert(CacheEntry::new(3.0, 1, model(&[(x(), 2)])));
        let stats = Stats::new();
        let found = find_model(&store, 3.0, &both_below(5), 2, 10, &stats).unwrap();
        // A one-variable model for a two-variable query is an inconsistency.
        assert_eq!(found, Some(model(&[(x(), 2)])));
        assert_eq!(stats.snapshot().cache_inconsistencies, 1);
    }

    #[test]
    fn division_by_zero_rejects_only_that_candidate() {
        // x % y == 0
        let target = Expr::eq(Expr::modulo(Expr::var(x()), Expr::var(y())), Expr::int(0));
        let store = KeyStore::new();
        store.insert(CacheEntry::new(0.0, 2, model(&[(x(), 4), (y(), 0)])));
        store.insert(CacheEntry::new(1.0, 2, model(&[(x(), 4), (y(), 2)])));
        let stats = Stats::new();

        let found = find_model(&store, 0.0, &target, 2, 10, &stats).unwrap();
        assert_eq!(found, Some(model(&[(x(), 4), (y(), 2)])));
        assert_eq!(stats.snapshot().models_tested, 1);
    }

    #[test]
    fn other_traversal_errors_abort() {
        let target = Expr::and(Expr::var(x()), Expr::lt(Expr::var(y()), Expr::int(1)));
        let store = KeyStore::new();
        store.insert(CacheEntry::new(0.0, 2, model(&[(x(), 0), (y(), 0)])));
        let stats = Stats::new();
        assert!(matches!(
            find_model(&store, 0.0, &target, 2, 10, &stats),
            Err(TraversalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn trim_keeps_first_assignments_in_variable_order() {
        let stats = Stats::new();
        let full = model(&[(z(), 3), (x(), 1), (y(), 2)]);

        let trimmed = trim_model(&full, 2, &stats);
        assert_eq!(trimmed, model(&[(x(), 1), (y(), 2)]));
        assert_eq!(trim_model(&full, 3, &stats), full);
        assert_eq!(trim_model(&full, 2, &stats), trimmed);
        assert_eq!(stats.snapshot().cache_inconsistencies, 0);

        assert_eq!(trim_model(&full, 5, &stats), full);
        assert_eq!(stats.snapshot().cache_inconsistencies, 1);
    }
}
