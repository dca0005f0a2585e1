//! Post-order traversal over expression trees.
//!
//! A visitor receives leaves directly and operations together with the
//! already computed results of their operands, so every visitor is a plain
//! bottom-up fold with exhaustive handling of the three node kinds.

use std::collections::BTreeSet;

use crate::error::TraversalError;

use super::{Constant, Expr, ExprKind, Operator, Variable};

/// A bottom-up fold over an [`Expr`].
pub trait ExprVisitor {
    type Output;

    fn visit_variable(&mut self, variable: &Variable) -> Result<Self::Output, TraversalError>;

    fn visit_constant(&mut self, constant: &Constant) -> Result<Self::Output, TraversalError>;

    /// Combine the results of an operation's operands, in operand order.
    fn visit_operation(
        &mut self,
        operator: Operator,
        operands: Vec<Self::Output>,
    ) -> Result<Self::Output, TraversalError>;
}

impl Expr {
    /// Walk the tree post-order, children before the operation combining them.
    ///
    /// The walk keeps its own work stack, so tree depth is bounded by memory
    /// rather than by the thread's call stack.
    pub fn accept<V: ExprVisitor + ?Sized>(&self, visitor: &mut V) -> Result<V::Output, TraversalError> {
        // (node, operands already pushed)
        let mut pending: Vec<(&Expr, bool)> = vec![(self, false)];
        let mut values: Vec<V::Output> = Vec::new();

        while let Some((expr, expanded)) = pending.pop() {
            match expr.kind() {
                ExprKind::Var(variable) => values.push(visitor.visit_variable(variable)?),
                ExprKind::Const(constant) => values.push(visitor.visit_constant(constant)?),
                ExprKind::Op { operator, operands } if expanded => {
                    let results = values.split_off(values.len().saturating_sub(operands.len()));
                    values.push(visitor.visit_operation(*operator, results)?);
                }
                ExprKind::Op { operands, .. } => {
                    pending.push((expr, true));
                    pending.extend(operands.iter().rev().map(|operand| (operand, false)));
                }
            }
        }

        // The root always leaves exactly one value behind.
        values.pop().ok_or(TraversalError::ArityMismatch {
            operator: Operator::And,
            expected: 1,
            actual: 0,
        })
    }
}

/// Destructure the operand results of a binary operator.
pub(crate) fn binary_operands<T>(operator: Operator, values: Vec<T>) -> Result<(T, T), TraversalError> {
    let actual = values.len();
    let [lhs, rhs]: [T; 2] = values.try_into().map_err(|_| TraversalError::ArityMismatch {
        operator,
        expected: 2,
        actual,
    })?;
    Ok((lhs, rhs))
}

/// Destructure the operand result of a unary operator.
pub(crate) fn unary_operand<T>(operator: Operator, values: Vec<T>) -> Result<T, TraversalError> {
    let actual = values.len();
    let [operand]: [T; 1] = values.try_into().map_err(|_| TraversalError::ArityMismatch {
        operator,
        expected: 1,
        actual,
    })?;
    Ok(operand)
}

/// Collects the distinct variables of an expression.
#[derive(Debug, Default)]
pub struct VariableCollector {
    variables: BTreeSet<Variable>,
}

impl VariableCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_variables(self) -> BTreeSet<Variable> {
        self.variables
    }
}

impl ExprVisitor for VariableCollector {
    type Output = ();

    fn visit_variable(&mut self, variable: &Variable) -> Result<(), TraversalError> {
        if !self.variables.contains(variable) {
            self.variables.insert(variable.clone());
        }
        Ok(())
    }

    fn visit_constant(&mut self, _constant: &Constant) -> Result<(), TraversalError> {
        Ok(())
    }

    fn visit_operation(&mut self, _operator: Operator, _operands: Vec<()>) -> Result<(), TraversalError> {
        Ok(())
    }
}
