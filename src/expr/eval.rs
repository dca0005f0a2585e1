//! Exact evaluation of an expression under a model.
//!
//! This is the strict evaluator: operators it cannot interpret and operand
//! type mismatches are [`TraversalError`]s. Variables missing from the model
//! evaluate to 0, as do real-valued assignments.

use std::fmt;

use crate::error::TraversalError;
use crate::solution::Model;

use super::visit::{binary_operands, unary_operand};
use super::{Constant, Expr, ExprVisitor, Operator, Variable};

const VISITOR: &str = "evaluator";

/// Result of evaluating a (sub)expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Evaluates expressions under a fixed model.
#[derive(Debug)]
pub struct Evaluator<'m> {
    model: &'m Model,
}

impl<'m> Evaluator<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self { model }
    }

    /// Evaluate `expr` to a value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, TraversalError> {
        expr.accept(self)
    }

    /// Evaluate a constraint; the root must be boolean.
    pub fn satisfies(&mut self, expr: &Expr) -> Result<bool, TraversalError> {
        match self.evaluate(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(TraversalError::NotBoolean {
                found: other.to_string(),
            }),
        }
    }
}

/// Whether `model` satisfies `expr`.
pub fn satisfies(expr: &Expr, model: &Model) -> Result<bool, TraversalError> {
    Evaluator::new(model).satisfies(expr)
}

fn ints(operator: Operator, lhs: Value, rhs: Value) -> Result<(i64, i64), TraversalError> {
    match (lhs, rhs) {
        (Value::Int(l), Value::Int(r)) => Ok((l, r)),
        _ => Err(TraversalError::TypeMismatch {
            operator,
            expected: "integer",
        }),
    }
}

fn bools(operator: Operator, lhs: Value, rhs: Value) -> Result<(bool, bool), TraversalError> {
    match (lhs, rhs) {
        (Value::Bool(l), Value::Bool(r)) => Ok((l, r)),
        _ => Err(TraversalError::TypeMismatch {
            operator,
            expected: "boolean",
        }),
    }
}

impl ExprVisitor for Evaluator<'_> {
    type Output = Value;

    fn visit_variable(&mut self, variable: &Variable) -> Result<Value, TraversalError> {
        let value = self
            .model
            .get(variable)
            .and_then(Constant::as_int)
            .unwrap_or(0);
        Ok(Value::Int(value))
    }

    fn visit_constant(&mut self, constant: &Constant) -> Result<Value, TraversalError> {
        constant
            .as_int()
            .map(Value::Int)
            .ok_or_else(|| TraversalError::UnsupportedConstant {
                constant: constant.to_string(),
                visitor: VISITOR,
            })
    }

    fn visit_operation(&mut self, operator: Operator, operands: Vec<Value>) -> Result<Value, TraversalError> {
        match operator {
            Operator::Not => match unary_operand(operator, operands)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                Value::Int(_) => Err(TraversalError::TypeMismatch {
                    operator,
                    expected: "boolean",
                }),
            },
            Operator::Neg => match unary_operand(operator, operands)? {
                Value::Int(v) => Ok(Value::Int(v.wrapping_neg())),
                Value::Bool(_) => Err(TraversalError::TypeMismatch {
                    operator,
                    expected: "integer",
                }),
            },
            Operator::And | Operator::Or | Operator::Implies => {
                let (l, r) = binary_operands(operator, operands)?;
                let (l, r) = bools(operator, l, r)?;
                Ok(Value::Bool(match operator {
                    Operator::And => l && r,
                    Operator::Or => l || r,
                    _ => !l || r,
                }))
            }
            Operator::Eq | Operator::Ne => {
                let (l, r) = binary_operands(operator, operands)?;
                let equal = match (l, r) {
                    (Value::Int(a), Value::Int(b)) => a == b,
                    (Value::Bool(a), Value::Bool(b)) => a == b,
                    _ => {
                        return Err(TraversalError::TypeMismatch {
                            operator,
                            expected: "matching",
                        });
                    }
                };
                Ok(Value::Bool(if operator == Operator::Eq { equal } else { !equal }))
            }
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
                let (l, r) = binary_operands(operator, operands)?;
                let (l, r) = ints(operator, l, r)?;
                Ok(Value::Bool(match operator {
                    Operator::Lt => l < r,
                    Operator::Le => l <= r,
                    Operator::Gt => l > r,
                    _ => l >= r,
                }))
            }
            Operator::Add | Operator::Sub | Operator::Mul => {
                let (l, r) = binary_operands(operator, operands)?;
                let (l, r) = ints(operator, l, r)?;
                Ok(Value::Int(match operator {
                    Operator::Add => l.wrapping_add(r),
                    Operator::Sub => l.wrapping_sub(r),
                    _ => l.wrapping_mul(r),
                }))
            }
            Operator::Div | Operator::Mod => {
                let (l, r) = binary_operands(operator, operands)?;
                let (l, r) = ints(operator, l, r)?;
                if r == 0 {
                    return Err(TraversalError::DivisionByZero { operator });
                }
                Ok(Value::Int(if operator == Operator::Div {
                    l.wrapping_div(r)
                } else {
                    l.wrapping_rem(r)
                }))
            }
            Operator::BitAnd | Operator::BitOr | Operator::BitXor | Operator::Shl | Operator::Shr => {
                Err(TraversalError::UnsupportedOperator {
                    operator,
                    visitor: VISITOR,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Variable {
        Variable::int("x", -100, 100)
    }

    fn y() -> Variable {
        Variable::int("y", -100, 100)
    }

    fn model(xv: i64, yv: i64) -> Model {
        [(x(), Constant::Int(xv)), (y(), Constant::Int(yv))]
            .into_iter()
            .collect()
    }

    #[test]
    fn relational_conjunction() {
        let e = Expr::and(
            Expr::lt(Expr::var(x()), Expr::int(5)),
            Expr::ge(Expr::var(y()), Expr::int(2)),
        );
        assert!(satisfies(&e, &model(4, 2)).unwrap());
        assert!(!satisfies(&e, &model(5, 2)).unwrap());
        assert!(!satisfies(&e, &model(0, 1)).unwrap());
    }

    #[test]
    fn arithmetic_and_logic() {
        // (x + y) * 2 == 10 || !(x % 3 != 0)
        let sum = Expr::mul(Expr::add(Expr::var(x()), Expr::var(y())), Expr::int(2));
        let e = Expr::or(
            Expr::eq(sum, Expr::int(10)),
            Expr::not(Expr::ne(Expr::modulo(Expr::var(x()), Expr::int(3)), Expr::int(0))),
        );
        assert!(satisfies(&e, &model(2, 3)).unwrap());
        assert!(satisfies(&e, &model(6, 0)).unwrap());
        assert!(!satisfies(&e, &model(1, 1)).unwrap());
    }

    #[test]
    fn missing_variables_default_to_zero() {
        let e = Expr::eq(Expr::var(y()), Expr::int(0));
        let only_x: Model = [(x(), Constant::Int(7))].into_iter().collect();
        assert!(satisfies(&e, &only_x).unwrap());
    }

    #[test]
    fn implication() {
        let e = Expr::implies(
            Expr::gt(Expr::var(x()), Expr::int(0)),
            Expr::gt(Expr::var(y()), Expr::int(0)),
        );
        assert!(satisfies(&e, &model(-1, -1)).unwrap());
        assert!(!satisfies(&e, &model(1, -1)).unwrap());
    }

    #[test]
    fn unsupported_operator_is_an_error() {
        let e = Expr::operation(Operator::Shl, vec![Expr::var(x()), Expr::int(1)]).unwrap();
        let e = Expr::eq(e, Expr::int(2));
        assert!(matches!(
            satisfies(&e, &model(1, 0)),
            Err(TraversalError::UnsupportedOperator {
                operator: Operator::Shl,
                ..
            })
        ));
    }

    #[test]
    fn division_by_zero_is_reported() {
        let e = Expr::eq(Expr::modulo(Expr::var(x()), Expr::var(y())), Expr::int(0));
        assert_eq!(
            satisfies(&e, &model(4, 0)),
            Err(TraversalError::DivisionByZero {
                operator: Operator::Mod
            })
        );
    }

    #[test]
    fn type_mismatch_and_non_boolean_root() {
        let bad = Expr::and(Expr::var(x()), Expr::lt(Expr::var(y()), Expr::int(1)));
        assert!(matches!(
            satisfies(&bad, &model(0, 0)),
            Err(TraversalError::TypeMismatch { .. })
        ));
        let arith = Expr::add(Expr::var(x()), Expr::int(1));
        assert!(matches!(
            satisfies(&arith, &model(0, 0)),
            Err(TraversalError::NotBoolean { .. })
        ));
    }

    #[test]
    fn real_constants_are_rejected() {
        let e = Expr::lt(Expr::var(x()), Expr::constant(Constant::Real(0.5)));
        assert!(matches!(
            satisfies(&e, &model(0, 0)),
            Err(TraversalError::UnsupportedConstant { .. })
        ));
    }
}
