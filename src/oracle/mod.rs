//! The exact decision procedure consulted on a cache miss.
//!
//! The cache never decides satisfiability itself; when no probe, model or
//! core applies it calls an [`Oracle`] exactly once and caches the answer.

pub mod bounded;

use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::expr::Expr;
use crate::solution::{Core, Model};

pub use bounded::BoundedOracle;

/// Raw answer of an oracle.
///
/// A satisfiable answer must carry a model and an unsatisfiable one a core;
/// [`OracleOutcome::into_verdict`] enforces this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleOutcome {
    pub is_sat: bool,
    pub model: Option<Model>,
    pub core: Option<Core>,
}

impl OracleOutcome {
    pub fn sat(model: Model) -> Self {
        Self {
            is_sat: true,
            model: Some(model),
            core: None,
        }
    }

    pub fn unsat(core: Core) -> Self {
        Self {
            is_sat: false,
            model: None,
            core: Some(core),
        }
    }

    /// Validate the outcome.
    pub fn into_verdict(self) -> Result<Verdict, OracleError> {
        match (self.is_sat, self.model, self.core) {
            (true, Some(model), _) => Ok(Verdict::Sat(model)),
            (false, _, Some(core)) => Ok(Verdict::Unsat(core)),
            (true, None, _) => Err(OracleError::Malformed {
                message: "satisfiable answer without a model".into(),
            }),
            (false, _, None) => Err(OracleError::Malformed {
                message: "unsatisfiable answer without a core".into(),
            }),
        }
    }
}

/// A validated answer to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "witness", rename_all = "snake_case")]
pub enum Verdict {
    Sat(Model),
    Unsat(Core),
}

impl Verdict {
    pub fn is_sat(&self) -> bool {
        matches!(self, Verdict::Sat(_))
    }

    pub fn model(&self) -> Option<&Model> {
        match self {
            Verdict::Sat(model) => Some(model),
            Verdict::Unsat(_) => None,
        }
    }

    pub fn core(&self) -> Option<&Core> {
        match self {
            Verdict::Sat(_) => None,
            Verdict::Unsat(core) => Some(core),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Sat(model) => write!(f, "sat {model}"),
            Verdict::Unsat(core) => write!(f, "unsat {core}"),
        }
    }
}

/// An exact satisfiability decision procedure.
pub trait Oracle: Send + Sync {
    fn solve(&self, expr: &Expr) -> Result<OracleOutcome, OracleError>;
}

impl<F> Oracle for F
where
    F: Fn(&Expr) -> Result<OracleOutcome, OracleError> + Send + Sync,
{
    fn solve(&self, expr: &Expr) -> Result<OracleOutcome, OracleError> {
        self(expr)
    }
}
