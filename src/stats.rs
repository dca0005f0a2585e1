//! Lock-free usage counters and phase timers.
//!
//! Every field is an independent atomic, so updates from concurrent queries
//! never contend on a lock. A [`StatsSnapshot`] is a plain copy suitable for
//! serialization or for the `key = value` report printed by the CLI.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Monotonic event counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Accumulated wall time in microseconds.
#[derive(Debug, Default)]
pub struct Timer(AtomicU64);

impl Timer {
    pub fn record(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.0.fetch_add(micros, Ordering::Relaxed);
    }

    /// Record the time elapsed since `start`.
    pub fn record_since(&self, start: Instant) {
        self.record(start.elapsed());
    }

    /// Run `f`, adding its wall time to this timer.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record_since(start);
        out
    }

    pub fn micros(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

macro_rules! define_stats {
    (
        counters { $($counter:ident => $counter_doc:literal,)* }
        timers { $($timer:ident => $timer_doc:literal,)* }
    ) => {
        /// Live counters and timers of an engine.
        #[derive(Debug, Default)]
        pub struct Stats {
            $(#[doc = $counter_doc] pub $counter: Counter,)*
            $(#[doc = $timer_doc] pub $timer: Timer,)*
        }

        /// Point-in-time copy of [`Stats`]. Timers are in microseconds.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct StatsSnapshot {
            $(#[doc = $counter_doc] pub $counter: u64,)*
            $(#[doc = $timer_doc] pub $timer: u64,)*
        }

        impl Stats {
            pub fn snapshot(&self) -> StatsSnapshot {
                StatsSnapshot {
                    $($counter: self.$counter.get(),)*
                    $($timer: self.$timer.micros(),)*
                }
            }
        }

        impl fmt::Display for StatsSnapshot {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                writeln!(f, "grulia cache statistics")?;
                $(writeln!(f, "  {:<24} = {}", stringify!($counter), self.$counter)?;)*
                $(writeln!(f, "  {:<24} = {} us", stringify!($timer), self.$timer)?;)*
                Ok(())
            }
        }
    };
}

define_stats! {
    counters {
        invocations => "Queries received.",
        sat_queries => "Queries answered satisfiable.",
        unsat_queries => "Queries answered unsatisfiable.",
        probe_hits => "Queries answered by a validated reference probe (sat-delta zero).",
        sat_cache_hits => "Queries answered by a reused model.",
        sat_cache_misses => "Model lookups that found no valid candidate.",
        unsat_cache_hits => "Queries answered by a reused core.",
        unsat_cache_misses => "Core lookups that found no contained candidate.",
        oracle_calls => "Oracle invocations.",
        models_tested => "Candidate models evaluated and rejected.",
        models_reused => "Candidate models evaluated and accepted.",
        cores_tested => "Candidate cores checked.",
        cores_reused => "Candidate cores accepted.",
        sat_entries_added => "Model entries inserted after an oracle call.",
        unsat_entries_added => "Core entries inserted after an oracle call.",
        entries_warm_loaded => "Entries loaded from the backing store at startup.",
        cache_inconsistencies => "Reused models smaller than the query.",
        traversal_errors => "Queries aborted by an expression traversal error.",
        oracle_failures => "Oracle calls that failed or answered malformed.",
    }
    timers {
        total_time => "Time spent resolving queries.",
        sat_time => "Time spent on queries answered satisfiable.",
        unsat_time => "Time spent on queries answered unsatisfiable.",
        cache_load_time => "Time spent warm-loading the stores.",
        sat_delta_time => "Time spent computing sat-deltas.",
        model_extraction_time => "Time spent fetching candidate models.",
        model_testing_time => "Time spent validating candidate models.",
        model_evaluation_time => "Time spent evaluating expressions under models.",
        core_extraction_time => "Time spent fetching candidate cores.",
        core_testing_time => "Time spent checking candidate cores.",
        sat_cache_check_time => "Time spent in model lookup overall.",
        unsat_cache_check_time => "Time spent in core lookup overall.",
        oracle_time => "Time spent inside the oracle.",
    }
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }
}
