//! Tree-walking expression evaluator.
//!
//! [`evaluate`] reduces one expression subtree to a single [`Variant`] for
//! the row a [`RowContext`] describes. Operands are evaluated onto a value
//! stack; operators pop them and push their result.

use std::cmp::Ordering;

use vsql_ast::{ExprOp, NodeId, NodeKind, ParseTree, Visitor, accept};
use vsql_error::{Result, VsqlError};
use vsql_types::{Variant, logical_and, logical_or, logical_xor};

use crate::config::NullArithmetic;
use crate::field::RowContext;

/// Evaluate the expression rooted at `node` against the current row.
pub fn evaluate(ctx: &RowContext<'_>, node: NodeId) -> Result<Variant> {
    let mut evaluator = Evaluator {
        ctx,
        stack: Vec::new(),
        depth: 0,
    };
    accept(&mut evaluator, ctx.plan.tree(), node)?;
    evaluator.pop()
}

/// Apply a binary operator to two evaluated operands.
pub fn apply_binary(
    op: ExprOp,
    lhs: &Variant,
    rhs: &Variant,
    nulls: NullArithmetic,
) -> Result<Variant> {
    if !op.is_logical() {
        reject_nulls(op, &[lhs, rhs], nulls)?;
    }
    match op {
        ExprOp::Add => lhs.checked_add(rhs),
        ExprOp::Sub => lhs.checked_sub(rhs),
        ExprOp::Mul => lhs.checked_mul(rhs),
        ExprOp::Div => lhs.checked_div(rhs),
        ExprOp::Mod => lhs.checked_rem(rhs),
        ExprOp::Concat => lhs.concat(rhs),
        ExprOp::Eq => compare(lhs, rhs, Ordering::is_eq),
        ExprOp::Ne => compare(lhs, rhs, Ordering::is_ne),
        ExprOp::Lt => compare(lhs, rhs, Ordering::is_lt),
        ExprOp::Gt => compare(lhs, rhs, Ordering::is_gt),
        ExprOp::Le => compare(lhs, rhs, Ordering::is_le),
        ExprOp::Ge => compare(lhs, rhs, Ordering::is_ge),
        ExprOp::And => Ok(logical_and(lhs.truth()?, rhs.truth()?).into()),
        ExprOp::Or => Ok(logical_or(lhs.truth()?, rhs.truth()?).into()),
        ExprOp::Xor => Ok(logical_xor(lhs.truth()?, rhs.truth()?).into()),
        ExprOp::Not | ExprOp::Neg | ExprOp::Pos | ExprOp::IsNull | ExprOp::IsNotNull => Err(
            VsqlError::internal(format!("unary operator {op} applied to two operands")),
        ),
    }
}

/// Apply a unary operator to an evaluated operand.
pub fn apply_unary(op: ExprOp, operand: &Variant, nulls: NullArithmetic) -> Result<Variant> {
    match op {
        ExprOp::Not => Ok(operand.truth()?.map(|b| !b).into()),
        ExprOp::Neg => {
            reject_nulls(op, &[operand], nulls)?;
            operand.checked_neg()
        }
        ExprOp::Pos => {
            reject_nulls(op, &[operand], nulls)?;
            operand.checked_pos()
        }
        ExprOp::IsNull => Ok(Variant::Bool(operand.is_null())),
        ExprOp::IsNotNull => Ok(Variant::Bool(!operand.is_null())),
        _ => Err(VsqlError::internal(format!(
            "binary operator {op} applied to one operand"
        ))),
    }
}

fn reject_nulls(op: ExprOp, operands: &[&Variant], nulls: NullArithmetic) -> Result<()> {
    if nulls == NullArithmetic::Strict && operands.iter().any(|v| v.is_null()) {
        return Err(VsqlError::NullValue {
            operation: op.symbol().to_owned(),
        });
    }
    Ok(())
}

fn compare(lhs: &Variant, rhs: &Variant, test: fn(Ordering) -> bool) -> Result<Variant> {
    Ok(lhs.sql_cmp(rhs)?.map(test).into())
}

struct Evaluator<'c, 'a> {
    ctx: &'c RowContext<'a>,
    stack: Vec<Variant>,
    depth: usize,
}

impl Evaluator<'_, '_> {
    fn pop(&mut self) -> Result<Variant> {
        self.stack
            .pop()
            .ok_or_else(|| VsqlError::internal("evaluator stack underflow"))
    }

    /// Evaluate `id` one level deeper, returning its value.
    fn operand(&mut self, tree: &ParseTree, id: NodeId) -> Result<Variant> {
        let max = self.ctx.config.max_expr_depth;
        if self.depth >= max {
            return Err(VsqlError::ExpressionTooDeep { max });
        }
        self.depth += 1;
        let result = accept(self, tree, id);
        self.depth -= 1;
        result?;
        self.pop()
    }

    fn push_constant(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        let value = tree.constant_value(id)?.unwrap_or_default();
        self.stack.push(value);
        Ok(())
    }
}

impl Visitor for Evaluator<'_, '_> {
    fn name(&self) -> &'static str {
        "Evaluator"
    }

    fn visit_literal(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.push_constant(tree, id)
    }

    fn visit_number(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.push_constant(tree, id)
    }

    fn visit_null(&mut self, _tree: &ParseTree, _id: NodeId) -> Result<()> {
        self.stack.push(Variant::Null);
        Ok(())
    }

    fn visit_id_group(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        let field = self.ctx.plan.id_field(id).ok_or_else(|| {
            VsqlError::internal(format!(
                "unresolved identifier {}",
                tree.name_parts(id).join(".")
            ))
        })?;
        let value = field.value(self.ctx)?;
        self.stack.push(value);
        Ok(())
    }

    fn visit_param(&mut self, _tree: &ParseTree, id: NodeId) -> Result<()> {
        let ordinal = self
            .ctx
            .plan
            .param_ordinal(id)
            .ok_or_else(|| VsqlError::internal("parameter without an ordinal"))?;
        self.stack.push(self.ctx.params.value(ordinal));
        Ok(())
    }

    fn visit_func_call(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        let function = self
            .ctx
            .plan
            .function(id)
            .ok_or_else(|| VsqlError::internal("unresolved function call"))?;
        let mut args = Vec::with_capacity(tree.children(id).len().saturating_sub(1));
        for &arg in tree.children(id).iter().skip(1) {
            args.push(self.operand(tree, arg)?);
        }
        let value = function.invoke(&args)?;
        self.stack.push(value);
        Ok(())
    }

    fn visit_expr(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        let NodeKind::Expr(op) = tree.kind(id) else {
            return Err(VsqlError::internal("visit_expr on a non-expression node"));
        };
        let nulls = self.ctx.config.null_arithmetic;
        let value = match tree.children(id) {
            &[operand] if op.is_unary() => {
                let v = self.operand(tree, operand)?;
                apply_unary(op, &v, nulls)?
            }
            &[lhs, rhs] if !op.is_unary() => {
                let l = self.operand(tree, lhs)?;
                let r = self.operand(tree, rhs)?;
                apply_binary(op, &l, &r, nulls)?
            }
            children => {
                return Err(VsqlError::internal(format!(
                    "operator {op} with {} operands",
                    children.len()
                )));
            }
        };
        self.stack.push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: NullArithmetic = NullArithmetic::Propagate;
    const S: NullArithmetic = NullArithmetic::Strict;

    fn int(i: i64) -> Variant {
        Variant::Integer(i)
    }

    #[test]
    fn test_arithmetic_promotion() {
        assert_eq!(apply_binary(ExprOp::Add, &int(2), &int(3), P).unwrap(), int(5));
        assert_eq!(
            apply_binary(ExprOp::Mul, &int(2), &Variant::Double(1.5), P).unwrap(),
            Variant::Double(3.0)
        );
        assert_eq!(apply_binary(ExprOp::Div, &int(7), &int(2), P).unwrap(), int(3));
        assert_eq!(apply_binary(ExprOp::Mod, &int(-7), &int(3), P).unwrap(), int(-1));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(
            apply_binary(ExprOp::Mod, &int(1), &int(0), P).unwrap_err(),
            VsqlError::DivisionByZero
        );
        assert_eq!(
            apply_binary(ExprOp::Add, &int(i64::MAX), &int(1), P).unwrap_err(),
            VsqlError::IntegerOverflow
        );
        assert!(matches!(
            apply_binary(ExprOp::Sub, &Variant::from("a"), &int(1), P).unwrap_err(),
            VsqlError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_null_modes() {
        assert_eq!(
            apply_binary(ExprOp::Add, &Variant::Null, &int(1), P).unwrap(),
            Variant::Null
        );
        assert_eq!(
            apply_binary(ExprOp::Add, &Variant::Null, &int(1), S).unwrap_err(),
            VsqlError::NullValue {
                operation: "+".to_owned()
            }
        );
        assert_eq!(
            apply_binary(ExprOp::Lt, &int(1), &Variant::Null, P).unwrap(),
            Variant::Null
        );
        assert!(apply_binary(ExprOp::Concat, &Variant::Null, &Variant::from("x"), S).is_err());
        assert!(apply_unary(ExprOp::Neg, &Variant::Null, S).is_err());
        // Logic and null checks never raise on nulls.
        assert_eq!(
            apply_binary(ExprOp::Or, &Variant::Null, &Variant::Bool(true), S).unwrap(),
            Variant::Bool(true)
        );
        assert_eq!(
            apply_unary(ExprOp::IsNull, &Variant::Null, S).unwrap(),
            Variant::Bool(true)
        );
    }

    #[test]
    fn test_three_valued_logic() {
        let t = Variant::Bool(true);
        let f = Variant::Bool(false);
        let n = Variant::Null;
        assert_eq!(apply_binary(ExprOp::And, &n, &f, P).unwrap(), f);
        assert_eq!(apply_binary(ExprOp::And, &n, &t, P).unwrap(), n);
        assert_eq!(apply_binary(ExprOp::Or, &n, &f, P).unwrap(), n);
        assert_eq!(apply_binary(ExprOp::Xor, &t, &t, P).unwrap(), f);
        assert_eq!(apply_unary(ExprOp::Not, &n, P).unwrap(), n);
        assert_eq!(apply_unary(ExprOp::Not, &f, P).unwrap(), t);
        assert!(apply_binary(ExprOp::And, &int(1), &t, P).is_err());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            apply_binary(ExprOp::Le, &int(2), &Variant::Double(2.0), P).unwrap(),
            Variant::Bool(true)
        );
        assert_eq!(
            apply_binary(ExprOp::Ne, &Variant::from("a"), &Variant::from("b"), P).unwrap(),
            Variant::Bool(true)
        );
        assert!(apply_binary(ExprOp::Eq, &Variant::from("1"), &int(1), P).is_err());
    }

    #[test]
    fn test_concat_renders_numbers() {
        assert_eq!(
            apply_binary(ExprOp::Concat, &Variant::from("n="), &Variant::Double(2.0), P).unwrap(),
            Variant::from("n=2.0")
        );
    }

    #[test]
    fn test_arity_mismatch_is_internal() {
        assert!(matches!(
            apply_unary(ExprOp::Add, &int(1), P).unwrap_err(),
            VsqlError::Internal(_)
        ));
        assert!(matches!(
            apply_binary(ExprOp::Not, &int(1), &int(1), P).unwrap_err(),
            VsqlError::Internal(_)
        ));
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn prop_comparison_is_antisymmetric(a in any::<i64>(), b in any::<i64>()) {
                let lt = apply_binary(ExprOp::Lt, &int(a), &int(b), P).unwrap();
                let gt = apply_binary(ExprOp::Gt, &int(b), &int(a), P).unwrap();
                prop_assert_eq!(lt, gt);
            }

            #[test]
            fn prop_null_operand_propagates(a in any::<i64>()) {
                for op in [ExprOp::Add, ExprOp::Sub, ExprOp::Mul, ExprOp::Eq, ExprOp::Lt] {
                    prop_assert_eq!(apply_binary(op, &int(a), &Variant::Null, P).unwrap(), Variant::Null);
                    prop_assert!(apply_binary(op, &Variant::Null, &int(a), S).is_err());
                }
            }
        }
    }
}
