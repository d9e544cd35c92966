//! Constructor-derived initial values for state variables.
//!
//! The guard recognizer needs to know a lock's "unlocked" value. Declared
//! initializers cover part of that; the rest comes from the constructor, so
//! this pass scans its top-level statements once and records plain
//! assignments into the state-variable table. It is deliberately shallow:
//! no branch or loop simulation, no expression evaluation beyond following
//! identifier chains through other state variables. Anything more complex
//! leaves the variable at its language default.

use crate::program::{BinaryOperator, Contract, Expression, Statement};
use std::collections::HashSet;

/// Annotate `contract.state_vars` with initializers recovered from the
/// constructor, if the contract has one. Runs on the per-analysis copy
/// produced by inheritance resolution, never on the input program.
pub fn apply_constructor_state(contract: &mut Contract) {
    let Some(ctor) = contract.functions.values().find(|f| f.is_constructor) else {
        return;
    };

    let mut updates = Vec::new();
    for statement in &ctor.body {
        match statement {
            Statement::Emit(_) => continue,
            Statement::Expression(Expression::Binary {
                op: BinaryOperator::Assign,
                left,
                right,
            }) => {
                let Some(name) = left.as_identifier() else {
                    continue;
                };
                if !contract.state_vars.contains_key(name) {
                    continue;
                }
                if let Some(value) = resolve_simple(contract, right) {
                    updates.push((name.to_string(), value));
                }
            }
            other => {
                tracing::debug!(
                    contract = %contract.name,
                    "skipping non-assignment constructor statement: {other:?}"
                );
            }
        }
    }

    for (name, value) in updates {
        if let Some(var) = contract.state_vars.get_mut(&name) {
            var.initializer = Some(value);
        }
    }
}

/// A simple right-hand side: a literal, or an identifier that resolves -
/// possibly through other state variables - to a known initializer. Chains
/// are followed with a visited set so self-referential declarations cannot
/// loop.
fn resolve_simple(contract: &Contract, expr: &Expression) -> Option<Expression> {
    match expr {
        Expression::Literal(_) => Some(expr.clone()),
        Expression::Identifier(name) => {
            let mut seen = HashSet::new();
            let mut current = name.as_str();
            loop {
                if !seen.insert(current.to_string()) {
                    return None;
                }
                match &contract.state_vars.get(current)?.initializer {
                    Some(Expression::Literal(lit)) => {
                        return Some(Expression::Literal(lit.clone()))
                    }
                    Some(Expression::Identifier(next)) => current = next,
                    _ => return None,
                }
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Function, Literal, StateVariable, VarKind};

    fn assign(name: &str, value: Expression) -> Statement {
        Statement::expr(Expression::binary(
            BinaryOperator::Assign,
            Expression::ident(name),
            value,
        ))
    }

    #[test]
    fn literal_assignment_is_recorded() {
        let mut contract = Contract::new("C")
            .with_state_var(StateVariable::new("locked", VarKind::Bool))
            .with_function(
                Function::constructor("constructor")
                    .with_body(vec![assign("locked", Expression::boolean(false))]),
            );

        apply_constructor_state(&mut contract);
        assert_eq!(
            contract.state_vars["locked"].initializer,
            Some(Expression::boolean(false))
        );
    }

    #[test]
    fn identifier_assignment_resolves_transitively() {
        let mut contract = Contract::new("C")
            .with_state_var(
                StateVariable::new("zero", VarKind::Integer)
                    .with_initializer(Expression::number("0")),
            )
            .with_state_var(StateVariable::new("status", VarKind::Integer))
            .with_function(
                Function::constructor("constructor")
                    .with_body(vec![assign("status", Expression::ident("zero"))]),
            );

        apply_constructor_state(&mut contract);
        assert_eq!(
            contract.state_vars["status"].initializer,
            Some(Expression::Literal(Literal::Number("0".into())))
        );
    }

    #[test]
    fn complex_rhs_and_emit_are_skipped() {
        let mut contract = Contract::new("C")
            .with_state_var(StateVariable::new("count", VarKind::Integer))
            .with_function(Function::constructor("constructor").with_body(vec![
                Statement::Emit(Expression::call(Expression::ident("Created"), vec![])),
                assign(
                    "count",
                    Expression::binary(
                        BinaryOperator::Add,
                        Expression::number("1"),
                        Expression::number("2"),
                    ),
                ),
            ]));

        apply_constructor_state(&mut contract);
        assert_eq!(contract.state_vars["count"].initializer, None);
    }

    #[test]
    fn assignment_to_unknown_name_is_ignored() {
        let mut contract = Contract::new("C")
            .with_state_var(StateVariable::new("owner", VarKind::Address))
            .with_function(
                Function::constructor("constructor")
                    .with_body(vec![assign("missing", Expression::number("1"))]),
            );

        apply_constructor_state(&mut contract);
        assert!(contract.state_vars["owner"].initializer.is_none());
    }
}
