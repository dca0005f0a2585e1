//! Engine facade: top-level API for the grulia cache.
//!
//! The `Engine` owns the sat-delta metric, the model and core stores, the
//! oracle and the optional backing store, and resolves queries through the
//! cheapest applicable path: reference probe, model reuse, core reuse, and
//! finally one oracle call whose answer is cached.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, GruliaError, GruliaResult, OracleError, TraversalError};
use crate::expr::Expr;
use crate::expr::eval::satisfies;
use crate::metric::{self, DEFAULT_REFERENCE_VALUES, SatDelta, SatDeltaMetric};
use crate::oracle::bounded::DEFAULT_MAX_ASSIGNMENTS;
use crate::oracle::{Oracle, OracleOutcome, Verdict};
use crate::reuse::{find_core, find_model};
use crate::solution::{Core, Model};
use crate::stats::{Stats, StatsSnapshot};
use crate::store::backing::BackingStore;
use crate::store::durable::DurableStore;
use crate::store::{CacheEntry, FlushReport, KeyStore};

/// Configuration for the grulia engine.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Candidates fetched per model or core lookup (default: 10).
    #[serde(default = "default_k")]
    pub k: usize,
    /// Probe values of the sat-delta metric, tried in order.
    #[serde(default = "default_reference_values")]
    pub reference_values: Vec<i64>,
    /// Key prefix of persisted entries in the backing store.
    #[serde(default = "default_store_prefix")]
    pub store_prefix: String,
    /// Data directory for persistence. `None` for memory-only mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Settings of the bundled oracle.
    #[serde(default)]
    pub oracle: OracleConfig,
}

/// Settings of the bundled [`crate::oracle::BoundedOracle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Largest number of assignments the oracle will enumerate.
    #[serde(default = "default_max_assignments")]
    pub max_assignments: u64,
}

fn default_k() -> usize {
    10
}
fn default_reference_values() -> Vec<i64> {
    DEFAULT_REFERENCE_VALUES.to_vec()
}
fn default_store_prefix() -> String {
    "grulia".into()
}
fn default_max_assignments() -> u64 {
    DEFAULT_MAX_ASSIGNMENTS
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_assignments: default_max_assignments(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            reference_values: default_reference_values(),
            store_prefix: default_store_prefix(),
            data_dir: None,
            oracle: OracleConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::ConfigRead {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| EngineError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let content = self.to_toml().map_err(|message| EngineError::ConfigParse {
            path: path.display().to_string(),
            message,
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::ConfigWrite {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| EngineError::ConfigWrite {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.k == 0 {
            return Err(EngineError::InvalidConfig {
                message: "k must be > 0".into(),
            });
        }
        if self.reference_values.is_empty() {
            return Err(EngineError::InvalidConfig {
                message: "reference_values must not be empty".into(),
            });
        }
        if self.store_prefix.is_empty() || self.store_prefix.contains(['*', ':']) {
            return Err(EngineError::InvalidConfig {
                message: "store_prefix must be non-empty and contain neither '*' nor ':'".into(),
            });
        }
        Ok(())
    }
}

/// Which path answered a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// A reference probe satisfied the query (sat-delta zero).
    ReferenceProbe,
    /// A cached model satisfied the query.
    ModelReuse,
    /// A cached unsat core is contained in the query.
    CoreReuse,
    /// The oracle decided the query.
    Oracle,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::ReferenceProbe => write!(f, "reference-probe"),
            Source::ModelReuse => write!(f, "model-reuse"),
            Source::CoreReuse => write!(f, "core-reuse"),
            Source::Oracle => write!(f, "oracle"),
        }
    }
}

/// Answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub verdict: Verdict,
    pub source: Source,
    pub sat_delta: SatDelta,
}

/// The grulia solution-reuse cache.
pub struct Engine {
    config: EngineConfig,
    metric: SatDeltaMetric,
    models: KeyStore<Model>,
    cores: KeyStore<Core>,
    oracle: Arc<dyn Oracle>,
    backing: Option<Arc<dyn BackingStore>>,
    stats: Stats,
}

impl Engine {
    /// Create a new engine with the given configuration.
    ///
    /// With a `data_dir`, entries are warm-loaded from the redb store in that
    /// directory and flushed back on [`Engine::persist`].
    pub fn new(config: EngineConfig, oracle: Arc<dyn Oracle>) -> GruliaResult<Self> {
        config.validate()?;
        let backing: Option<Arc<dyn BackingStore>> = match config.data_dir {
            Some(ref dir) => {
                let store = DurableStore::open(dir).map_err(|e| EngineError::DataDir {
                    path: dir.display().to_string(),
                    source: e,
                })?;
                Some(Arc::new(store))
            }
            None => None,
        };
        Self::build(config, oracle, backing)
    }

    /// Create an engine over an explicit backing store, ignoring `data_dir`.
    pub fn with_backing(
        config: EngineConfig,
        oracle: Arc<dyn Oracle>,
        backing: Arc<dyn BackingStore>,
    ) -> GruliaResult<Self> {
        Self::build(config, oracle, Some(backing))
    }

    fn build(
        config: EngineConfig,
        oracle: Arc<dyn Oracle>,
        backing: Option<Arc<dyn BackingStore>>,
    ) -> GruliaResult<Self> {
        config.validate()?;
        tracing::info!(
            k = config.k,
            references = ?config.reference_values,
            prefix = %config.store_prefix,
            persistent = backing.is_some(),
            "initializing grulia engine"
        );

        let engine = Self {
            metric: SatDeltaMetric::new(config.reference_values.clone()),
            models: KeyStore::new(),
            cores: KeyStore::new(),
            oracle,
            backing,
            stats: Stats::new(),
            config,
        };
        engine.warm_load();
        Ok(engine)
    }

    fn warm_load(&self) {
        let Some(backing) = self.backing.as_deref() else {
            return;
        };
        let start = Instant::now();
        let prefix = &self.config.store_prefix;
        let models = self.models.warm_load(backing, prefix);
        let cores = self.cores.warm_load(backing, prefix);
        self.stats.cache_load_time.record_since(start);
        self.stats.entries_warm_loaded.add((models + cores) as u64);
        tracing::info!(models, cores, elapsed_us = start.elapsed().as_micros() as u64, "warm load complete");
    }

    /// Resolve one query.
    ///
    /// Traversal errors abort only this query and leave the cache untouched;
    /// oracle errors likewise insert nothing.
    pub fn resolve(&self, expr: &Expr) -> GruliaResult<Resolution> {
        let start = Instant::now();
        self.stats.invocations.incr();
        let result = self.resolve_uncounted(expr);
        let elapsed = start.elapsed();
        self.stats.total_time.record(elapsed);
        if let Ok(resolution) = &result {
            if resolution.verdict.is_sat() {
                self.stats.sat_queries.incr();
                self.stats.sat_time.record(elapsed);
            } else {
                self.stats.unsat_queries.incr();
                self.stats.unsat_time.record(elapsed);
            }
        }
        result
    }

    fn resolve_uncounted(&self, expr: &Expr) -> GruliaResult<Resolution> {
        let sat_delta = self
            .stats
            .sat_delta_time
            .time(|| self.metric.delta(expr))
            .map_err(|e| self.traversal_failure(expr, e))?;

        if let Some(reference) = sat_delta.satisfied_by() {
            if let Some(model) = self
                .probe_model(expr, reference)
                .map_err(|e| self.traversal_failure(expr, e))?
            {
                self.stats.probe_hits.incr();
                tracing::debug!(expr = %expr, reference, "reference probe satisfies query");
                return Ok(Resolution {
                    verdict: Verdict::Sat(model),
                    source: Source::ReferenceProbe,
                    sat_delta,
                });
            }
        }

        let key = sat_delta.value();
        let size = expr.variables().len();
        let k = self.config.k;

        let model = self
            .stats
            .sat_cache_check_time
            .time(|| find_model(&self.models, key, expr, size, k, &self.stats))
            .map_err(|e| self.traversal_failure(expr, e))?;
        if let Some(model) = model {
            self.stats.sat_cache_hits.incr();
            tracing::debug!(expr = %expr, key, model = %model, "model reused");
            return Ok(Resolution {
                verdict: Verdict::Sat(model),
                source: Source::ModelReuse,
                sat_delta,
            });
        }
        self.stats.sat_cache_misses.incr();

        let core = self
            .stats
            .unsat_cache_check_time
            .time(|| find_core(&self.cores, key, expr, k, &self.stats));
        if let Some(core) = core {
            self.stats.unsat_cache_hits.incr();
            tracing::debug!(expr = %expr, key, core = %core, "core reused");
            return Ok(Resolution {
                verdict: Verdict::Unsat(core),
                source: Source::CoreReuse,
                sat_delta,
            });
        }
        self.stats.unsat_cache_misses.incr();

        // No store lock is held across the oracle call.
        self.stats.oracle_calls.incr();
        let verdict = self
            .stats
            .oracle_time
            .time(|| self.oracle.solve(expr))
            .and_then(OracleOutcome::into_verdict)
            .map_err(|e| self.oracle_failure(expr, e))?;

        match &verdict {
            Verdict::Sat(model) => {
                self.models.insert(CacheEntry::new(key, size, model.clone()));
                self.stats.sat_entries_added.incr();
            }
            Verdict::Unsat(core) => {
                self.cores.insert(CacheEntry::new(key, size, core.clone()));
                self.stats.unsat_entries_added.incr();
            }
        }
        tracing::debug!(expr = %expr, key, verdict = %verdict, "oracle answer cached");
        Ok(Resolution {
            verdict,
            source: Source::Oracle,
            sat_delta,
        })
    }

    /// The reference model of a zero sat-delta, if it is a real answer.
    ///
    /// The metric scores operators it cannot interpret as 0, so a zero delta
    /// is only a hint: the uniform assignment must lie inside every
    /// variable's domain and satisfy the query under the strict evaluator.
    /// Otherwise the query continues with the model lookup.
    fn probe_model(&self, expr: &Expr, reference: i64) -> Result<Option<Model>, TraversalError> {
        let variables = expr.variables();
        if let Some(outside) = variables
            .iter()
            .find(|v| reference < v.lower || reference > v.upper)
        {
            tracing::debug!(expr = %expr, reference, variable = %outside.name, "probe value outside domain");
            return Ok(None);
        }
        let model = metric::reference_model(expr, reference);
        match satisfies(expr, &model) {
            Ok(true) => Ok(Some(model)),
            Ok(false) | Err(TraversalError::DivisionByZero { .. }) => {
                tracing::debug!(expr = %expr, reference, "probe model rejected by evaluation");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn traversal_failure(&self, expr: &Expr, e: TraversalError) -> GruliaError {
        self.stats.traversal_errors.incr();
        tracing::error!(expr = %expr, error = %e, "query aborted by traversal error");
        e.into()
    }

    fn oracle_failure(&self, expr: &Expr, e: OracleError) -> GruliaError {
        self.stats.oracle_failures.incr();
        tracing::warn!(expr = %expr, error = %e, "oracle failed, nothing cached");
        e.into()
    }

    /// Resolve independent queries in parallel, one task per query.
    pub fn resolve_batch(&self, exprs: &[Expr]) -> Vec<GruliaResult<Resolution>> {
        use rayon::prelude::*;

        exprs.par_iter().map(|expr| self.resolve(expr)).collect()
    }

    /// The (memoized) sat-delta of an expression.
    pub fn sat_delta(&self, expr: &Expr) -> GruliaResult<SatDelta> {
        Ok(self.metric.delta(expr)?)
    }

    /// Flush both stores to the backing store.
    ///
    /// Best effort: failed writes are logged and reported as dropped. A
    /// memory-only engine writes nothing.
    pub fn persist(&self) -> FlushReport {
        let Some(backing) = self.backing.as_deref() else {
            return FlushReport::default();
        };
        let prefix = &self.config.store_prefix;
        let models = self.models.flush(backing, prefix);
        let cores = self.cores.flush(backing, prefix);
        let report = FlushReport {
            written: models.written + cores.written,
            dropped: models.dropped + cores.dropped,
        };
        tracing::info!(written = report.written, dropped = report.dropped, "cache flushed");
        report
    }

    /// Persist and consume the engine.
    pub fn shutdown(self) -> FlushReport {
        self.persist()
    }

    /// Drop every in-memory entry and recorded sat-delta.
    pub fn clear(&self) {
        self.models.clear();
        self.cores.clear();
        self.metric.table().clear();
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get engine info summary.
    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            k: self.config.k,
            reference_values: self.config.reference_values.clone(),
            store_prefix: self.config.store_prefix.clone(),
            sat_entries: self.models.len(),
            unsat_entries: self.cores.len(),
            recorded_deltas: self.metric.table().len(),
            persistent: self.backing.is_some(),
        }
    }
}

/// Summary information about the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInfo {
    pub k: usize,
    pub reference_values: Vec<i64>,
    pub store_prefix: String,
    pub sat_entries: usize,
    pub unsat_entries: usize,
    pub recorded_deltas: usize,
    pub persistent: bool,
}

impl fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "grulia engine info")?;
        writeln!(f, "  k:              {}", self.k)?;
        writeln!(f, "  references:     {:?}", self.reference_values)?;
        writeln!(f, "  store prefix:   {}", self.store_prefix)?;
        writeln!(f, "  sat entries:    {}", self.sat_entries)?;
        writeln!(f, "  unsat entries:  {}", self.unsat_entries)?;
        writeln!(f, "  deltas:         {}", self.recorded_deltas)?;
        writeln!(f, "  persistent:     {}", self.persistent)?;
        Ok(())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("models", &self.models.len())
            .field("cores", &self.cores.len())
            .field("persistent", &self.backing.is_some())
            .finish()
    }
}
