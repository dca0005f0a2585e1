//! Solver answers that the cache stores and hands back: satisfying
//! assignments ([`Model`]) and unsatisfiable cores ([`Core`]).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::{Constant, Expr, Variable};

/// A satisfying assignment, ordered by variable.
///
/// Serialized as a list of `(variable, value)` pairs so that formats with
/// string-only map keys (JSON) can carry it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<(Variable, Constant)>", from = "Vec<(Variable, Constant)>")]
pub struct Model(BTreeMap<Variable, Constant>);

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the same value to every given variable.
    pub fn uniform<'a>(variables: impl IntoIterator<Item = &'a Variable>, value: Constant) -> Self {
        variables.into_iter().map(|v| (v.clone(), value)).collect()
    }

    pub fn insert(&mut self, variable: Variable, value: Constant) -> Option<Constant> {
        self.0.insert(variable, value)
    }

    pub fn get(&self, variable: &Variable) -> Option<&Constant> {
        self.0.get(variable)
    }

    /// Look a value up by variable name.
    pub fn value_of(&self, name: &str) -> Option<&Constant> {
        self.0.iter().find(|(v, _)| v.name == name).map(|(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Constant)> {
        self.0.iter()
    }

    /// Keep only the first `size` assignments in variable order.
    pub fn trimmed(&self, size: usize) -> Self {
        self.0
            .iter()
            .take(size)
            .map(|(v, c)| (v.clone(), *c))
            .collect()
    }
}

impl FromIterator<(Variable, Constant)> for Model {
    fn from_iter<I: IntoIterator<Item = (Variable, Constant)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<(Variable, Constant)>> for Model {
    fn from(pairs: Vec<(Variable, Constant)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<Model> for Vec<(Variable, Constant)> {
    fn from(model: Model) -> Self {
        model.0.into_iter().collect()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (variable, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={value}", variable.name)?;
        }
        write!(f, "}}")
    }
}

/// A set of clauses whose conjunction is unsatisfiable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Core(BTreeSet<Expr>);

impl Core {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, clause: Expr) -> bool {
        self.0.insert(clause)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clauses(&self) -> impl Iterator<Item = &Expr> {
        self.0.iter()
    }

    /// Whether every clause occurs parenthesized in the canonical form of
    /// `target`. An empty core is never contained.
    ///
    /// The canonical text omits variable domains, so every variable of the
    /// core must also occur in `target` with the same sort and bounds: a core
    /// that is only unsatisfiable over narrow domains says nothing about the
    /// same text over wider ones.
    pub fn is_contained_in(&self, target: &Expr) -> bool {
        if self.0.is_empty() {
            return false;
        }
        let text = target.canonical();
        if !self
            .0
            .iter()
            .all(|clause| text.contains(&format!("({})", clause.canonical())))
        {
            return false;
        }
        let target_variables = target.variables();
        self.0
            .iter()
            .all(|clause| clause.variables().is_subset(&target_variables))
    }
}

impl FromIterator<Expr> for Core {
    fn from_iter<I: IntoIterator<Item = Expr>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, clause) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{clause}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Variable {
        Variable::int(name, -10, 10)
    }

    #[test]
    fn trimmed_keeps_first_entries_in_variable_order() {
        let model: Model = [
            (var("z"), Constant::Int(3)),
            (var("a"), Constant::Int(1)),
            (var("m"), Constant::Int(2)),
        ]
        .into_iter()
        .collect();

        let trimmed = model.trimmed(2);
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed.value_of("a"), Some(&Constant::Int(1)));
        assert_eq!(trimmed.value_of("m"), Some(&Constant::Int(2)));
        assert_eq!(trimmed.value_of("z"), None);
        assert_eq!(model.trimmed(2), trimmed);
    }

    #[test]
    fn display_lists_assignments() {
        let model = Model::uniform(&[var("x"), var("y")], Constant::Int(0));
        assert_eq!(model.to_string(), "{x=0, y=0}");
    }

    #[test]
    fn model_serializes_to_json() {
        let model = Model::uniform(&[var("x"), var("y")], Constant::Int(3));
        let json = serde_json::to_string(&model).unwrap();
        let back: Model = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn core_containment_is_textual() {
        let x = Expr::var(var("x"));
        let y = Expr::var(var("y"));
        let c1 = Expr::lt(x.clone(), Expr::int(0));
        let c2 = Expr::gt(x.clone(), Expr::int(5));
        let core: Core = [c1.clone(), c2.clone()].into_iter().collect();

        let target = Expr::conjunction([c1.clone(), Expr::eq(y.clone(), Expr::int(1)), c2]).unwrap();
        assert!(core.is_contained_in(&target));

        let partial = Expr::and(c1, Expr::eq(y, Expr::int(1)));
        assert!(!core.is_contained_in(&partial));
    }

    #[test]
    fn core_over_other_domains_is_not_contained() {
        let narrow = Expr::var(var("x"));
        let wide = Expr::var(Variable::int("x", -100, 100));
        let core: Core = [Expr::lt(narrow, Expr::int(-50))].into_iter().collect();

        let target = Expr::and(Expr::lt(wide, Expr::int(-50)), Expr::gt(Expr::var(var("y")), Expr::int(0)));
        assert!(target.canonical().contains("(x<-50)"));
        assert!(!core.is_contained_in(&target));
    }

    #[test]
    fn empty_core_is_never_contained() {
        let target = Expr::lt(Expr::var(var("x")), Expr::int(0));
        assert!(!Core::new().is_contained_in(&target));
    }
}
