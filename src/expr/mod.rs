//! Immutable constraint expressions.
//!
//! An [`Expr`] is a cheaply clonable handle to a shared, never-mutated node:
//! a [`Variable`], a [`Constant`], or an operation combining operands under an
//! [`Operator`]. Every node lazily caches its canonical string form, which
//! defines equality, ordering and hashing and is the text that unsat-core
//! subsumption is tested against.
//!
//! Canonical form: variables print their name, constants their value, and
//! operations print infix (`L op R`) or prefix (`op X`) with every operand that
//! is itself an operation wrapped in parentheses, e.g. `(x<5)&&(y<5)`.

pub mod eval;
pub mod visit;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::TraversalError;

pub use visit::{ExprVisitor, VariableCollector};

/// Value domain of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    Int,
    Real,
    /// Signed bit-vector of the given width (at most 64).
    BitVec { width: u32 },
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Int => write!(f, "int"),
            Sort::Real => write!(f, "real"),
            Sort::BitVec { width } => write!(f, "bv{width}"),
        }
    }
}

/// A named variable with an inclusive domain `[lower, upper]`.
///
/// Variables order by name first, which is the deterministic key order used
/// when a reused model is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub sort: Sort,
    pub lower: i64,
    pub upper: i64,
}

impl Variable {
    /// An integer variable with domain `[lower, upper]`.
    pub fn int(name: impl Into<String>, lower: i64, upper: i64) -> Self {
        Self {
            name: name.into(),
            sort: Sort::Int,
            lower,
            upper,
        }
    }

    /// A real variable with domain `[lower, upper]`.
    pub fn real(name: impl Into<String>, lower: i64, upper: i64) -> Self {
        Self {
            name: name.into(),
            sort: Sort::Real,
            lower,
            upper,
        }
    }

    /// A signed bit-vector variable spanning the full range of its width.
    pub fn bitvec(name: impl Into<String>, width: u32) -> Self {
        let width = width.clamp(1, 64);
        let (lower, upper) = if width == 64 {
            (i64::MIN, i64::MAX)
        } else {
            (-(1i64 << (width - 1)), (1i64 << (width - 1)) - 1)
        };
        Self {
            name: name.into(),
            sort: Sort::BitVec { width },
            lower,
            upper,
        }
    }

    /// Number of values in the domain (zero if the bounds are inverted).
    pub fn domain_size(&self) -> u128 {
        if self.upper < self.lower {
            0
        } else {
            (self.upper as i128 - self.lower as i128 + 1) as u128
        }
    }
}

/// A typed literal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constant {
    Int(i64),
    Real(f64),
    BitVec { value: i64, width: u32 },
}

impl Constant {
    /// The integer view of this constant, if it has an exact one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Constant::Int(v) => Some(*v),
            Constant::BitVec { value, .. } => Some(*value),
            Constant::Real(_) => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Real(v) => write!(f, "{v}"),
            Constant::BitVec { value, .. } => write!(f, "{value}"),
        }
    }
}

/// Operator tag of an operation node. The arity of each operator is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Implies,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl Operator {
    /// Number of operands this operator takes.
    pub fn arity(self) -> usize {
        match self {
            Operator::Not | Operator::Neg => 1,
            _ => 2,
        }
    }

    /// Textual symbol used in the canonical form.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Implies => "=>",
            Operator::Not => "!",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Neg => "-",
            Operator::BitAnd => "&",
            Operator::BitOr => "|",
            Operator::BitXor => "^",
            Operator::Shl => "<<",
            Operator::Shr => ">>",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The three node kinds of an expression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    Var(Variable),
    Const(Constant),
    Op {
        operator: Operator,
        operands: Vec<Expr>,
    },
}

struct Node {
    kind: ExprKind,
    canonical: OnceLock<String>,
}

/// Shared, immutable expression handle.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "ExprKind", into = "ExprKind")]
pub struct Expr(Arc<Node>);

impl Expr {
    fn from_kind(kind: ExprKind) -> Self {
        Self(Arc::new(Node {
            kind,
            canonical: OnceLock::new(),
        }))
    }

    /// A variable leaf.
    pub fn var(variable: Variable) -> Self {
        Self::from_kind(ExprKind::Var(variable))
    }

    /// A constant leaf.
    pub fn constant(constant: Constant) -> Self {
        Self::from_kind(ExprKind::Const(constant))
    }

    /// An integer constant leaf.
    pub fn int(value: i64) -> Self {
        Self::constant(Constant::Int(value))
    }

    /// An operation node. Fails if the operand count does not match the
    /// operator's arity.
    pub fn operation(operator: Operator, operands: Vec<Expr>) -> Result<Self, TraversalError> {
        if operands.len() != operator.arity() {
            return Err(TraversalError::ArityMismatch {
                operator,
                expected: operator.arity(),
                actual: operands.len(),
            });
        }
        Ok(Self::from_kind(ExprKind::Op { operator, operands }))
    }

    fn binary(operator: Operator, lhs: Expr, rhs: Expr) -> Self {
        debug_assert_eq!(operator.arity(), 2);
        Self::from_kind(ExprKind::Op {
            operator,
            operands: vec![lhs, rhs],
        })
    }

    fn unary(operator: Operator, operand: Expr) -> Self {
        debug_assert_eq!(operator.arity(), 1);
        Self::from_kind(ExprKind::Op {
            operator,
            operands: vec![operand],
        })
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::Eq, lhs, rhs)
    }

    pub fn ne(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::Ne, lhs, rhs)
    }

    pub fn lt(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::Lt, lhs, rhs)
    }

    pub fn le(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::Le, lhs, rhs)
    }

    pub fn gt(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::Gt, lhs, rhs)
    }

    pub fn ge(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::Ge, lhs, rhs)
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::And, lhs, rhs)
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::Or, lhs, rhs)
    }

    pub fn implies(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::Implies, lhs, rhs)
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::Add, lhs, rhs)
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::Mul, lhs, rhs)
    }

    pub fn modulo(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(Operator::Mod, lhs, rhs)
    }

    pub fn not(operand: Expr) -> Self {
        Self::unary(Operator::Not, operand)
    }

    /// Fold clauses into a left-nested conjunction. Returns `None` for an
    /// empty iterator.
    pub fn conjunction(clauses: impl IntoIterator<Item = Expr>) -> Option<Self> {
        clauses.into_iter().reduce(Self::and)
    }

    /// The node kind.
    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    /// Whether this node is an operation.
    pub fn is_operation(&self) -> bool {
        matches!(self.0.kind, ExprKind::Op { .. })
    }

    /// The canonical string form, computed on first use and cached.
    pub fn canonical(&self) -> &str {
        self.0.canonical.get_or_init(|| render(self))
    }

    /// Distinct variables occurring in the expression, in name order.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut collector = VariableCollector::new();
        // The collector handles every node kind, so the walk cannot fail.
        let _ = self.accept(&mut collector);
        collector.into_variables()
    }

    /// Top-level conjuncts: the leaves of the maximal `And` spine rooted here.
    pub fn conjuncts(&self) -> Vec<Expr> {
        let mut out = Vec::new();
        let mut pending = vec![self.clone()];
        while let Some(expr) = pending.pop() {
            match expr.kind() {
                ExprKind::Op {
                    operator: Operator::And,
                    operands,
                } => pending.extend(operands.iter().rev().cloned()),
                _ => out.push(expr),
            }
        }
        out
    }
}

enum Piece<'a> {
    Node(&'a Expr),
    Operand(&'a Expr),
    Text(&'a str),
}

/// Render the canonical form into one buffer with an explicit work stack.
///
/// Operands reuse their cached text when present; otherwise they are written
/// inline and left uncached, so rendering a deep spine stays linear.
fn render(root: &Expr) -> String {
    let mut out = String::new();
    let mut pending = vec![Piece::Node(root)];

    while let Some(piece) = pending.pop() {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Operand(expr) if !expr.is_operation() => pending.push(Piece::Node(expr)),
            Piece::Operand(expr) => match expr.0.canonical.get() {
                Some(cached) => {
                    out.push('(');
                    out.push_str(cached);
                    out.push(')');
                }
                None => pending.extend([Piece::Text(")"), Piece::Node(expr), Piece::Text("(")]),
            },
            Piece::Node(expr) => match expr.kind() {
                ExprKind::Var(variable) => out.push_str(&variable.name),
                ExprKind::Const(constant) => out.push_str(&constant.to_string()),
                ExprKind::Op { operator, operands } => {
                    if let [operand] = operands.as_slice() {
                        pending.extend([Piece::Operand(operand), Piece::Text(operator.symbol())]);
                    } else {
                        for (i, operand) in operands.iter().enumerate().rev() {
                            pending.push(Piece::Operand(operand));
                            if i > 0 {
                                pending.push(Piece::Text(operator.symbol()));
                            }
                        }
                    }
                }
            },
        }
    }
    out
}

impl Drop for Node {
    /// Tear down uniquely owned operand chains iteratively, so dropping a
    /// deep tree does not recurse once per level.
    fn drop(&mut self) {
        let ExprKind::Op { operands, .. } = &mut self.kind else {
            return;
        };
        let mut pending = std::mem::take(operands);
        while let Some(expr) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(expr.0) {
                if let ExprKind::Op { operands, .. } = &mut node.kind {
                    pending.append(operands);
                }
            }
        }
    }
}

impl TryFrom<ExprKind> for Expr {
    type Error = TraversalError;

    fn try_from(kind: ExprKind) -> Result<Self, Self::Error> {
        match kind {
            ExprKind::Op { operator, operands } => Expr::operation(operator, operands),
            leaf => Ok(Expr::from_kind(leaf)),
        }
    }
}

impl From<Expr> for ExprKind {
    fn from(expr: Expr) -> Self {
        expr.0.kind.clone()
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.canonical() == other.canonical()
    }
}

impl Eq for Expr {}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical().cmp(other.canonical())
    }
}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expr").field(&self.canonical()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::var(Variable::int("x", -100, 100))
    }

    fn y() -> Expr {
        Expr::var(Variable::int("y", -100, 100))
    }

    #[test]
    fn canonical_form_parenthesizes_nested_operations() {
        let e = Expr::and(Expr::lt(x(), Expr::int(5)), Expr::lt(y(), Expr::int(5)));
        assert_eq!(e.canonical(), "(x<5)&&(y<5)");

        let sum = Expr::le(Expr::add(x(), y()), Expr::int(-3));
        assert_eq!(sum.to_string(), "(x+y)<=-3");

        let neg = Expr::not(Expr::eq(x(), Expr::int(0)));
        assert_eq!(neg.to_string(), "!(x==0)");
    }

    #[test]
    fn cached_operands_are_reused_when_rendering() {
        let inner = Expr::lt(x(), Expr::int(5));
        assert_eq!(inner.canonical(), "x<5");
        let e = Expr::not(Expr::or(inner.clone(), Expr::ge(y(), Expr::add(x(), Expr::int(1)))));
        assert_eq!(e.canonical(), "!((x<5)||(y>=(x+1)))");
    }

    #[test]
    fn deep_conjunctions_render_compare_and_drop() {
        let build = || Expr::conjunction((0..100_000).map(|i| Expr::gt(x(), Expr::int(i)))).unwrap();
        let e = build();
        let text = e.canonical();
        assert!(text.starts_with("((((("));
        assert!(text.ends_with(")&&(x>99999)"));
        assert_eq!(e.conjuncts().len(), 100_000);
        assert_eq!(e, build());
        drop(e);
    }

    #[test]
    fn shared_subtrees_survive_dropping_a_parent() {
        let shared = Expr::and(Expr::lt(x(), Expr::int(1)), Expr::gt(y(), Expr::int(2)));
        let parent = Expr::not(shared.clone());
        drop(parent);
        assert_eq!(shared.canonical(), "(x<1)&&(y>2)");
    }

    #[test]
    fn operation_rejects_wrong_arity() {
        let err = Expr::operation(Operator::Lt, vec![x()]).unwrap_err();
        assert_eq!(
            err,
            TraversalError::ArityMismatch {
                operator: Operator::Lt,
                expected: 2,
                actual: 1,
            }
        );
        assert!(Expr::operation(Operator::Not, vec![x()]).is_ok());
    }

    #[test]
    fn equality_and_ordering_follow_canonical_form() {
        let a = Expr::lt(x(), Expr::int(5));
        let b = Expr::lt(x(), Expr::int(5));
        let c = Expr::lt(y(), Expr::int(5));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
    }

    #[test]
    fn variables_are_distinct_and_sorted() {
        let e = Expr::and(
            Expr::lt(y(), x()),
            Expr::gt(x(), Expr::int(0)),
        );
        let names: Vec<_> = e.variables().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn conjuncts_flatten_and_spine_in_order() {
        let a = Expr::lt(x(), Expr::int(1));
        let b = Expr::lt(y(), Expr::int(2));
        let c = Expr::or(Expr::gt(x(), y()), Expr::eq(x(), Expr::int(3)));
        let e = Expr::conjunction([a.clone(), b.clone(), c.clone()]).unwrap();
        assert_eq!(e.conjuncts(), vec![a, b, c]);
        assert!(Expr::conjunction(Vec::new()).is_none());
    }

    #[test]
    fn json_round_trip_validates_arity() {
        let e = Expr::and(Expr::lt(x(), Expr::int(5)), Expr::not(Expr::eq(y(), Expr::int(1))));
        let json = serde_json::to_string(&e).unwrap();
        let back: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);

        let bad = r#"{"op":{"operator":"lt","operands":[{"const":{"int":1}}]}}"#;
        assert!(serde_json::from_str::<Expr>(bad).is_err());
    }

    #[test]
    fn bitvec_domain_matches_width() {
        let v = Variable::bitvec("b", 8);
        assert_eq!((v.lower, v.upper), (-128, 127));
        assert_eq!(v.domain_size(), 256);
        let wide = Variable::bitvec("w", 64);
        assert_eq!((wide.lower, wide.upper), (i64::MIN, i64::MAX));
    }
}
