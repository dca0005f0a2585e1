//! Persistence and recovery tests for the grulia engine.
//!
//! These tests verify that cached models and cores survive an engine
//! restart (shutdown flush + warm load) through the redb backing store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use grulia::engine::{Engine, EngineConfig, Source};
use grulia::error::OracleError;
use grulia::expr::{Expr, Variable};
use grulia::oracle::{BoundedOracle, Oracle, OracleOutcome};
use grulia::store::backing::BackingStore;
use grulia::store::durable::{DB_FILE, DurableStore};

#[derive(Default)]
struct CountingOracle {
    inner: BoundedOracle,
    calls: AtomicUsize,
}

impl Oracle for CountingOracle {
    fn solve(&self, expr: &Expr) -> Result<OracleOutcome, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.solve(expr)
    }
}

fn var(name: &str) -> Expr {
    Expr::var(Variable::int(name, -10, 10))
}

fn persistent_config(dir: &std::path::Path) -> EngineConfig {
    EngineConfig {
        reference_values: vec![100, 1000],
        data_dir: Some(dir.to_path_buf()),
        ..Default::default()
    }
}

fn persistent_engine(dir: &std::path::Path) -> (Engine, Arc<CountingOracle>) {
    let oracle = Arc::new(CountingOracle::default());
    let engine = Engine::new(persistent_config(dir), oracle.clone()).unwrap();
    (engine, oracle)
}

fn both_below(bound: i64) -> Expr {
    Expr::and(Expr::lt(var("x"), Expr::int(bound)), Expr::lt(var("y"), Expr::int(bound)))
}

fn contradiction() -> Expr {
    Expr::and(Expr::lt(var("x"), Expr::int(0)), Expr::gt(var("x"), Expr::int(7)))
}

#[test]
fn entries_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    // First session: populate both stores and flush.
    {
        let (engine, oracle) = persistent_engine(dir.path());
        engine.resolve(&both_below(5)).unwrap();
        engine.resolve(&contradiction()).unwrap();
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
        let report = engine.shutdown();
        assert_eq!(report.written, 2);
        assert_eq!(report.dropped, 0);
    }
    assert!(dir.path().join(DB_FILE).exists());

    // Second session: warm start answers without the oracle.
    {
        let (engine, oracle) = persistent_engine(dir.path());
        let info = engine.info();
        assert!(info.persistent);
        assert_eq!((info.sat_entries, info.unsat_entries), (1, 1));
        assert_eq!(engine.stats().entries_warm_loaded, 2);

        let sat = engine.resolve(&both_below(6)).unwrap();
        assert_eq!(sat.source, Source::ModelReuse);

        let wider = Expr::and(contradiction(), Expr::eq(var("y"), Expr::int(1)));
        let unsat = engine.resolve(&wider).unwrap();
        assert_eq!(unsat.source, Source::CoreReuse);

        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn reflushing_overwrites_instead_of_duplicating() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let (engine, _) = persistent_engine(dir.path());
        engine.resolve(&both_below(5)).unwrap();
        engine.shutdown();
    }
    {
        let (engine, _) = persistent_engine(dir.path());
        // Different variables: not reusable, goes to the oracle.
        engine
            .resolve(&Expr::and(Expr::lt(var("p"), Expr::int(-2)), Expr::lt(var("q"), Expr::int(-2))))
            .unwrap();
        assert_eq!(engine.info().sat_entries, 2);
        engine.shutdown();
    }
    {
        let (engine, _) = persistent_engine(dir.path());
        assert_eq!(engine.info().sat_entries, 2);
    }

    let store = DurableStore::open(dir.path()).unwrap();
    assert_eq!(store.keys_matching("grulia:sat:*").unwrap().len(), 2);
    assert!(store.keys_matching("grulia:unsat:*").unwrap().is_empty());
}

#[test]
fn prefixes_partition_one_database() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let (engine, _) = persistent_engine(dir.path());
        engine.resolve(&both_below(5)).unwrap();
        engine.shutdown();
    }

    let other = EngineConfig {
        store_prefix: "other".into(),
        ..persistent_config(dir.path())
    };
    let engine = Engine::new(other, Arc::new(BoundedOracle::default())).unwrap();
    assert_eq!(engine.info().sat_entries, 0);
}

#[test]
fn undecodable_entries_are_skipped_on_warm_load() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let store = DurableStore::open(dir.path()).unwrap();
        store.put("grulia:sat:00000000000000000000", b"garbage").unwrap();
    }

    let (engine, _) = persistent_engine(dir.path());
    assert_eq!(engine.info().sat_entries, 0);
    assert_eq!(engine.stats().entries_warm_loaded, 0);
}

#[test]
fn memory_only_engine_persists_nothing() {
    let engine = Engine::new(
        EngineConfig {
            reference_values: vec![100, 1000],
            ..Default::default()
        },
        Arc::new(BoundedOracle::default()),
    )
    .unwrap();
    engine.resolve(&both_below(5)).unwrap();
    let report = engine.shutdown();
    assert_eq!(report.written, 0);
}
