//! The sat-delta similarity metric.
//!
//! Sat-delta measures how far a reference assignment (every variable set to
//! the same probe value) is from satisfying an expression. Relational
//! operators yield the magnitude of their violation instead of a boolean,
//! conjunctions add violations and disjunctions keep the smallest one. An
//! expression is probed once per reference value: a probe that comes out as 0
//! already satisfies it; otherwise the mean over all probes becomes the key
//! under which solutions are cached.
//!
//! This fold is deliberately lenient: operators it does not know contribute 0
//! instead of failing, unlike the strict evaluator in [`crate::expr::eval`].

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::TraversalError;
use crate::expr::visit::binary_operands;
use crate::expr::{Constant, Expr, ExprVisitor, Operator, Variable};
use crate::solution::Model;

/// Reference probe values used when none are configured.
pub const DEFAULT_REFERENCE_VALUES: [i64; 3] = [-10_000, 0, 100];

/// Outcome of the sat-delta computation for one expression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatDelta {
    /// The probe with this reference value satisfies the expression.
    Satisfied { reference: i64, delta: f64 },
    /// No probe satisfies it; mean delta over all probes.
    Distance(f64),
}

impl SatDelta {
    /// The scalar used as the cache key.
    pub fn value(&self) -> f64 {
        match self {
            SatDelta::Satisfied { delta, .. } => *delta,
            SatDelta::Distance(delta) => *delta,
        }
    }

    /// The satisfying reference value, if a probe hit.
    pub fn satisfied_by(&self) -> Option<i64> {
        match self {
            SatDelta::Satisfied { reference, .. } => Some(*reference),
            SatDelta::Distance(_) => None,
        }
    }
}

/// One probe: every variable evaluates to `reference`.
struct Probe {
    reference: i64,
}

impl ExprVisitor for Probe {
    type Output = i64;

    fn visit_variable(&mut self, _variable: &Variable) -> Result<i64, TraversalError> {
        Ok(self.reference)
    }

    fn visit_constant(&mut self, constant: &Constant) -> Result<i64, TraversalError> {
        Ok(match constant {
            Constant::Int(v) => *v,
            Constant::BitVec { value, .. } => *value,
            Constant::Real(v) => v.round() as i64,
        })
    }

    fn visit_operation(&mut self, operator: Operator, operands: Vec<i64>) -> Result<i64, TraversalError> {
        let combine: fn(i64, i64) -> i64 = match operator {
            Operator::Lt => |l, r| if l >= r { l.wrapping_sub(r).wrapping_add(1) } else { 0 },
            Operator::Le => |l, r| if l > r { l.wrapping_sub(r) } else { 0 },
            Operator::Gt => |l, r| if l <= r { r.wrapping_sub(l).wrapping_add(1) } else { 0 },
            Operator::Ge => |l, r| if l < r { r.wrapping_sub(l) } else { 0 },
            Operator::Eq => |l, r| if l != r { l.wrapping_sub(r).wrapping_abs() } else { 0 },
            Operator::Ne => |l, r| if l == r { 1 } else { 0 },
            Operator::And | Operator::Add => |l, r| l.wrapping_add(r),
            Operator::Or => |l, r| l.min(r),
            Operator::Mul => |l, r| l.wrapping_mul(r),
            Operator::Sub => |l, r| r.wrapping_abs().wrapping_sub(l.wrapping_abs()).wrapping_abs(),
            Operator::Mod => |l, r| l.checked_rem(r).unwrap_or(0),
            _ => return Ok(0),
        };
        let (l, r) = binary_operands(operator, operands)?;
        Ok(combine(l, r))
    }
}

/// Sat-delta of `expr` under a single probe value.
pub fn probe(expr: &Expr, reference: i64) -> Result<i64, TraversalError> {
    expr.accept(&mut Probe { reference })
}

/// Run every probe in order, stopping at the first one that satisfies `expr`.
pub fn compute(expr: &Expr, references: &[i64]) -> Result<SatDelta, TraversalError> {
    if references.is_empty() {
        return Ok(SatDelta::Distance(0.0));
    }
    let mut total = 0.0;
    for &reference in references {
        let delta = probe(expr, reference)? as f64;
        if delta.round() == 0.0 {
            return Ok(SatDelta::Satisfied { reference, delta });
        }
        total += delta;
    }
    Ok(SatDelta::Distance(total / references.len() as f64))
}

/// The reference model of a satisfied probe: every variable set to `reference`.
pub fn reference_model(expr: &Expr, reference: i64) -> Model {
    Model::uniform(&expr.variables(), Constant::Int(reference))
}

/// Side table of computed sat-deltas, keyed by canonical expression text.
///
/// Each expression's delta is recorded once; later lookups return the
/// recorded value. Concurrent first computations race benignly: the first
/// insertion wins and every caller observes it.
#[derive(Debug, Default)]
pub struct DeltaTable {
    deltas: DashMap<String, SatDelta>,
}

impl DeltaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, expr: &Expr) -> Option<SatDelta> {
        self.deltas.get(expr.canonical()).map(|d| *d.value())
    }

    /// Return the recorded delta, computing and recording it on first use.
    /// The flag is `true` when this call performed the computation.
    pub fn get_or_compute(
        &self,
        expr: &Expr,
        references: &[i64],
    ) -> Result<(SatDelta, bool), TraversalError> {
        if let Some(delta) = self.get(expr) {
            return Ok((delta, false));
        }
        let delta = compute(expr, references)?;
        let recorded = *self
            .deltas
            .entry(expr.canonical().to_string())
            .or_insert(delta)
            .value();
        Ok((recorded, true))
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn clear(&self) {
        self.deltas.clear();
    }
}

/// Sat-delta metric over a fixed list of reference values.
#[derive(Debug)]
pub struct SatDeltaMetric {
    references: Vec<i64>,
    table: DeltaTable,
}

impl SatDeltaMetric {
    pub fn new(references: Vec<i64>) -> Self {
        Self {
            references,
            table: DeltaTable::new(),
        }
    }

    pub fn references(&self) -> &[i64] {
        &self.references
    }

    /// The (memoized) sat-delta of `expr`.
    pub fn delta(&self, expr: &Expr) -> Result<SatDelta, TraversalError> {
        self.table
            .get_or_compute(expr, &self.references)
            .map(|(delta, _)| delta)
    }

    pub fn table(&self) -> &DeltaTable {
        &self.table
    }
}

impl Default for SatDeltaMetric {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_VALUES.to_vec())
    }
}
