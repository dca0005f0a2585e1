//! Exhaustive oracle over bounded variable domains.

use crate::error::{OracleError, TraversalError};
use crate::expr::eval::satisfies;
use crate::expr::{Constant, Expr, Sort, Variable};
use crate::solution::{Core, Model};

use super::{Oracle, OracleOutcome};

/// Default assignment budget.
pub const DEFAULT_MAX_ASSIGNMENTS: u64 = 1_000_000;

/// Decides queries by enumerating every assignment of the variables'
/// declared domains.
///
/// Assignments are visited in lexicographic order of the name-ordered
/// variables, last variable fastest, so the returned model is the smallest
/// satisfying one in that order. Unsatisfiable queries get a core minimised
/// by deleting top-level conjuncts one at a time while the rest stays
/// unsatisfiable.
#[derive(Debug, Clone)]
pub struct BoundedOracle {
    max_assignments: u64,
}

impl BoundedOracle {
    pub fn new(max_assignments: u64) -> Self {
        Self { max_assignments }
    }

    pub fn max_assignments(&self) -> u64 {
        self.max_assignments
    }

    /// First satisfying assignment of `expr`, or `None` if there is none.
    pub fn find_model(&self, expr: &Expr) -> Result<Option<Model>, OracleError> {
        let variables: Vec<Variable> = expr.variables().into_iter().collect();
        if let Some(real) = variables.iter().find(|v| v.sort == Sort::Real) {
            return Err(OracleError::Failed {
                message: format!("variable {} has a real sort and cannot be enumerated", real.name),
            });
        }

        let assignments = variables
            .iter()
            .try_fold(1u128, |acc, v| acc.checked_mul(v.domain_size()))
            .unwrap_or(u128::MAX);
        if assignments > u128::from(self.max_assignments) {
            return Err(OracleError::SearchSpaceTooLarge {
                assignments,
                limit: self.max_assignments,
            });
        }
        if assignments == 0 {
            return Ok(None);
        }

        let mut values: Vec<i64> = variables.iter().map(|v| v.lower).collect();
        loop {
            let model: Model = variables
                .iter()
                .zip(&values)
                .map(|(v, &value)| (v.clone(), constant_for(v, value)))
                .collect();
            match satisfies(expr, &model) {
                Ok(true) => return Ok(Some(model)),
                Ok(false) | Err(TraversalError::DivisionByZero { .. }) => {}
                Err(e) => return Err(e.into()),
            }
            if !advance(&mut values, &variables) {
                return Ok(None);
            }
        }
    }

    /// Deletion-based minimisation over the top-level conjuncts of an
    /// unsatisfiable `expr`.
    pub fn minimize_core(&self, expr: &Expr) -> Result<Core, OracleError> {
        let mut clauses = expr.conjuncts();
        let mut i = 0;
        while i < clauses.len() && clauses.len() > 1 {
            let mut rest = clauses.clone();
            rest.remove(i);
            let still_unsat = match Expr::conjunction(rest.iter().cloned()) {
                Some(subset) => self.find_model(&subset)?.is_none(),
                None => false,
            };
            if still_unsat {
                clauses = rest;
            } else {
                i += 1;
            }
        }
        Ok(clauses.into_iter().collect())
    }
}

impl Default for BoundedOracle {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ASSIGNMENTS)
    }
}

impl Oracle for BoundedOracle {
    fn solve(&self, expr: &Expr) -> Result<OracleOutcome, OracleError> {
        match self.find_model(expr)? {
            Some(model) => {
                tracing::debug!(expr = %expr, model = %model, "bounded oracle: sat");
                Ok(OracleOutcome::sat(model))
            }
            None => {
                let core = self.minimize_core(expr)?;
                tracing::debug!(expr = %expr, core = %core, "bounded oracle: unsat");
                Ok(OracleOutcome::unsat(core))
            }
        }
    }
}

fn constant_for(variable: &Variable, value: i64) -> Constant {
    match variable.sort {
        Sort::BitVec { width } => Constant::BitVec { value, width },
        _ => Constant::Int(value),
    }
}

/// Step the odometer. Returns `false` once every assignment was visited.
fn advance(values: &mut [i64], variables: &[Variable]) -> bool {
    for i in (0..values.len()).rev() {
        if values[i] < variables[i].upper {
            values[i] += 1;
            for (value, variable) in values[i + 1..].iter_mut().zip(&variables[i + 1..]) {
                *value = variable.lower;
            }
            return true;
        }
    }
    false
}
