// The struct-like variants in `error` (e.g. `TraversalError::UnsupportedOperator`)
// read their fields only inside derive-generated `Display` and `Diagnostic`
// code, which current rustc reports as `unused_assignments`.
#![allow(unused_assignments)]

//! # grulia
//!
//! An approximate solution-reuse cache for constraint solving. Before asking
//! an exact decision procedure (the oracle) whether a constraint is
//! satisfiable, grulia tries to answer from previously computed answers.
//!
//! ## Architecture
//!
//! - **Expressions** (`expr`): immutable, shared constraint trees with a
//!   cached canonical text form, a visitor seam and a strict evaluator
//! - **Sat-delta metric** (`metric`): reference-probe distance used as the
//!   cache key, memoized in a concurrent side table
//! - **Ordered-key stores** (`store`): nearest-K retrieval over cached models
//!   and unsat cores, persisted through redb
//! - **Reuse validators** (`reuse`): model re-evaluation and textual core
//!   containment
//! - **Oracle** (`oracle`): the exact fallback, with a bundled bounded
//!   enumerator
//! - **Engine** (`engine`): the per-query pipeline, configuration and
//!   statistics (`stats`)
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use grulia::engine::{Engine, EngineConfig};
//! use grulia::expr::{Expr, Variable};
//! use grulia::oracle::BoundedOracle;
//!
//! let engine = Engine::new(EngineConfig::default(), Arc::new(BoundedOracle::default())).unwrap();
//! let x = Expr::var(Variable::int("x", -100, 100));
//! let y = Expr::var(Variable::int("y", -100, 100));
//! let query = Expr::and(Expr::gt(x, Expr::int(5)), Expr::gt(y, Expr::int(5)));
//! let resolution = engine.resolve(&query).unwrap();
//! println!("{} via {}", resolution.verdict, resolution.source);
//! ```

pub mod engine;
pub mod error;
pub mod expr;
pub mod metric;
pub mod oracle;
pub mod reuse;
pub mod solution;
pub mod stats;
pub mod store;
