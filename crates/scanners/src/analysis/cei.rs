//! Checks-Effects-Interactions flow analysis.
//!
//! ## The model
//!
//! The scan walks a function body in statement order carrying three pieces of
//! state: the `check`/`interaction` flags, the set of *protected* variables
//! (state variables a preceding check has constrained, so reaching a mutation
//! of them implies the check held), and the set of *pinned* variables
//! (variables this function has already re-established by mutating them
//! under protection, or before any interaction happened).
//!
//! An external call opens an interaction window. While a window is open, a
//! mutation of an unprotected state variable is a violation, a mutation of a
//! protected variable closes the window, and a second external call is a
//! violation on its own. A `require` or if-revert check widens the protected
//! set with the condition's state-variable operands and - a deliberate,
//! load-bearing quirk inherited from the original tool - also marks the
//! interaction flag, so a check followed by an external call with no
//! protected effect in between reads as two open windows and fails.
//!
//! ## Branch forking
//!
//! At an `if`, each arm is analyzed against its own copies of the flow state
//! over a continuation sequence: the arm's statements followed by everything
//! lexically after the `if`. Copies are owned values, never shared
//! references - divergent branches must not observe each other's mutations.
//! When both arms exist the function is compliant only if both continuations
//! are; a lone true arm decides nothing by itself and the outer scan carries
//! the not-taken path.
//!
//! ## Interprocedural inlining
//!
//! A call to another function of the same contract is inlined: the callee's
//! body is scanned with the caller's state, so its checks, effects, and
//! interactions land in the caller's ordering. A call cycle terminates the
//! scan with a conservative non-compliant verdict.

use crate::analysis::guard::track_storage_aliases;
use crate::error::AnalysisError;
use crate::program::{Contract, Expression, Statement};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub check: bool,
    pub interaction: bool,
}

/// Per-scan flow state. `Clone` is what implements branch forking: every
/// fork works on its own owned copy.
#[derive(Debug, Clone, Default)]
struct FlowState {
    flags: Flags,
    protected: HashSet<String>,
    pinned: HashSet<String>,
    storage_vars: HashSet<String>,
}

enum BranchOutcome {
    /// Both continuations were analyzed; their conjunction is the verdict.
    Decided(bool),
    /// The outer scan keeps going past the `if`.
    Continue,
}

pub struct CeiFlowAnalyzer<'a> {
    contract: &'a Contract,
    call_stack: Vec<String>,
}

impl<'a> CeiFlowAnalyzer<'a> {
    pub fn new(contract: &'a Contract) -> Self {
        Self {
            contract,
            call_stack: Vec::new(),
        }
    }

    /// Is the interaction/effect ordering of `body` compliant? A `false`
    /// verdict is what the caller raises a finding for.
    pub fn is_compliant(&mut self, body: &[Statement]) -> bool {
        let statements: Vec<&Statement> = body.iter().collect();
        let mut state = FlowState::default();
        self.scan(&statements, &mut state)
    }

    fn scan(&mut self, statements: &[&Statement], state: &mut FlowState) -> bool {
        for (index, statement) in statements.iter().enumerate() {
            match statement {
                Statement::VariableDeclaration {
                    variables,
                    initializer,
                } => {
                    if let Some(init) = initializer {
                        if init.is_interaction_call() {
                            if !self.open_interaction(state) {
                                return false;
                            }
                            continue;
                        }
                        if let Expression::FunctionCall { callee, .. } = init {
                            if let Some(name) = callee.as_identifier() {
                                if self.contract.functions.contains_key(name)
                                    && !self.inline_call(name, state)
                                {
                                    return false;
                                }
                            }
                        }
                    }
                    track_storage_aliases(variables, initializer, &mut state.storage_vars);
                }
                Statement::If {
                    condition,
                    true_branch,
                    false_branch,
                } => {
                    let tail = &statements[index + 1..];
                    match self.scan_if(
                        condition,
                        true_branch.as_deref(),
                        false_branch.as_deref(),
                        tail,
                        state,
                    ) {
                        BranchOutcome::Decided(result) => return result,
                        BranchOutcome::Continue => {}
                    }
                }
                Statement::Expression(expr) => {
                    if !self.handle_expression(expr, state) {
                        return false;
                    }
                }
                Statement::Return(Some(expr)) => {
                    if expr.is_interaction_call() && !self.open_interaction(state) {
                        return false;
                    }
                }
                Statement::Block(inner) => {
                    let inner_refs: Vec<&Statement> = inner.iter().collect();
                    if !self.scan(&inner_refs, state) {
                        return false;
                    }
                }
                Statement::Revert
                | Statement::Emit(_)
                | Statement::Placeholder
                | Statement::Return(None) => {}
            }
        }
        true
    }

    fn scan_if(
        &mut self,
        condition: &Expression,
        true_branch: Option<&Statement>,
        false_branch: Option<&Statement>,
        tail: &[&Statement],
        state: &mut FlowState,
    ) -> BranchOutcome {
        let (true_arm, true_reverts) = collect_until_revert(true_branch);

        if true_reverts {
            // `if (cond) revert;` is a check: past this point the negated
            // condition is known to hold, so its operands become protected.
            self.widen_protected(condition, state);
            return BranchOutcome::Continue;
        }

        let true_result = if true_branch.is_some() {
            let mut sequence = true_arm;
            sequence.extend_from_slice(tail);
            let mut fork = state.clone();
            Some(self.scan(&sequence, &mut fork))
        } else {
            None
        };

        let false_result = if false_branch.is_some() {
            let (false_arm, _) = collect_until_revert(false_branch);
            let mut sequence = false_arm;
            sequence.extend_from_slice(tail);
            let mut fork = state.clone();
            Some(self.scan(&sequence, &mut fork))
        } else {
            None
        };

        match (true_result, false_result) {
            (Some(t), Some(f)) => BranchOutcome::Decided(t && f),
            (Some(t), None) => {
                if t {
                    // The not-taken path continues in the outer scan.
                    BranchOutcome::Continue
                } else {
                    BranchOutcome::Decided(false)
                }
            }
            (None, Some(f)) => BranchOutcome::Decided(f),
            (None, None) => BranchOutcome::Continue,
        }
    }

    fn handle_expression(&mut self, expr: &Expression, state: &mut FlowState) -> bool {
        match expr {
            Expression::FunctionCall { callee, arguments } => {
                if callee.is_interaction_callee() {
                    return self.open_interaction(state);
                }
                if let Some(name) = callee.as_identifier() {
                    if name == "require" {
                        if let Some(condition) = arguments.first() {
                            self.widen_protected(condition, state);
                        }
                        return true;
                    }
                    if self.contract.functions.contains_key(name) {
                        return self.inline_call(name, state);
                    }
                }
                true
            }
            Expression::Binary { op, left, right } if op.is_assignment() => {
                // `ok = target.send(x)`: the call completes before the
                // assignment, so the window opens first and the mutation is
                // judged against it.
                if right.is_interaction_call() && !self.open_interaction(state) {
                    return false;
                }
                self.apply_mutation(left, state)
            }
            Expression::Unary { op, operand, .. } if op.is_mutation() => {
                self.apply_mutation(operand, state)
            }
            _ => true,
        }
    }

    /// An external call. A second call while a window is already open is a
    /// violation; otherwise the window opens and only variables this
    /// function has re-established keep their protection across it.
    fn open_interaction(&mut self, state: &mut FlowState) -> bool {
        if state.flags.interaction {
            return false;
        }
        state.flags.interaction = true;
        let pinned = &state.pinned;
        state.protected.retain(|name| pinned.contains(name));
        true
    }

    /// A mutation of a tracked (state or storage-aliased) variable. Inside
    /// an open window it must be protected, and then it closes the window;
    /// outside a window it is an ordinary effect that pins the variable.
    fn apply_mutation(&mut self, lvalue: &Expression, state: &mut FlowState) -> bool {
        let Some(target) = lvalue.mutation_target() else {
            return true;
        };
        if !self.contract.state_vars.contains_key(target)
            && !state.storage_vars.contains(target)
        {
            // Not a state or storage variable: a plain local, nothing to
            // track.
            return true;
        }

        if state.flags.interaction {
            if !state.protected.contains(target) {
                return false;
            }
            state.flags.interaction = false;
        }
        state.pinned.insert(target.to_string());
        true
    }

    /// Widen the protected set with the condition's state-variable operands.
    /// When it grows, both flags are set - see the module docs for why the
    /// interaction flag is part of this.
    fn widen_protected(&mut self, condition: &Expression, state: &mut FlowState) {
        let before = state.protected.len();
        self.collect_operands(condition, &mut state.protected);
        if state.protected.len() != before {
            state.flags.check = true;
            state.flags.interaction = true;
        }
    }

    fn collect_operands(&self, expr: &Expression, out: &mut HashSet<String>) {
        match expr {
            Expression::Identifier(name) => {
                if self.contract.state_vars.contains_key(name) {
                    out.insert(name.clone());
                }
            }
            Expression::IndexAccess { base, index } => {
                if let Some(name) = base.as_identifier() {
                    if self.contract.state_vars.contains_key(name) {
                        out.insert(name.to_string());
                    }
                }
                self.collect_operands(index, out);
            }
            Expression::Binary { left, right, .. } => {
                self.collect_operands(left, out);
                self.collect_operands(right, out);
            }
            Expression::Unary { operand, .. } => self.collect_operands(operand, out),
            Expression::Tuple(components) => {
                for component in components {
                    self.collect_operands(component, out);
                }
            }
            Expression::MemberAccess { .. }
            | Expression::FunctionCall { .. }
            | Expression::Literal(_) => {}
        }
    }

    fn inline_call(&mut self, name: &str, state: &mut FlowState) -> bool {
        if self.call_stack.iter().any(|f| f == name) {
            tracing::debug!(
                error = %AnalysisError::RecursionCycle {
                    contract: self.contract.name.clone(),
                    function: name.to_string(),
                },
                "assuming non-compliant"
            );
            return false;
        }
        let Some(function) = self.contract.functions.get(name) else {
            return true;
        };
        let body: Vec<&Statement> = function.body.iter().collect();
        self.call_stack.push(name.to_string());
        let result = self.scan(&body, state);
        self.call_stack.pop();
        result
    }
}

/// Statements of a branch arm up to its first `revert`, plus whether one was
/// found. A lone statement is a one-element arm.
fn collect_until_revert(arm: Option<&Statement>) -> (Vec<&Statement>, bool) {
    match arm {
        None => (Vec::new(), false),
        Some(Statement::Revert) => (Vec::new(), true),
        Some(Statement::Block(statements)) => {
            let mut prefix = Vec::new();
            for statement in statements {
                if matches!(statement, Statement::Revert) {
                    return (prefix, true);
                }
                prefix.push(statement);
            }
            (prefix, false)
        }
        Some(other) => (vec![other], false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{BinaryOperator, Function, StateVariable, VarKind};

    fn external_call() -> Statement {
        Statement::expr(Expression::call(
            Expression::member(Expression::ident("target"), "call"),
            vec![Expression::string("")],
        ))
    }

    fn set_balance() -> Statement {
        Statement::expr(Expression::binary(
            BinaryOperator::Assign,
            Expression::index(
                Expression::ident("balances"),
                Expression::member(Expression::ident("msg"), "sender"),
            ),
            Expression::number("0"),
        ))
    }

    fn require_on(name: &str) -> Statement {
        Statement::expr(Expression::call(
            Expression::ident("require"),
            vec![Expression::binary(
                BinaryOperator::Ge,
                Expression::index(
                    Expression::ident(name),
                    Expression::member(Expression::ident("msg"), "sender"),
                ),
                Expression::ident("amount"),
            )],
        ))
    }

    fn vault() -> Contract {
        Contract::new("Vault").with_state_var(StateVariable::new("balances", VarKind::Mapping))
    }

    fn compliant(contract: &Contract, body: Vec<Statement>) -> bool {
        CeiFlowAnalyzer::new(contract).is_compliant(&body)
    }

    #[test]
    fn mutation_inside_open_window_is_a_violation() {
        let contract = vault();
        assert!(!compliant(&contract, vec![external_call(), set_balance()]));
    }

    #[test]
    fn effect_before_interaction_is_compliant() {
        let contract = vault();
        assert!(compliant(&contract, vec![set_balance(), external_call()]));
    }

    #[test]
    fn two_calls_without_closing_the_window_is_a_violation() {
        let contract = vault();
        assert!(!compliant(&contract, vec![external_call(), external_call()]));
    }

    #[test]
    fn check_then_call_without_protected_effect_is_a_violation() {
        // The check marks the interaction flag (the inherited quirk), so
        // the call reads as a second window.
        let contract = vault();
        assert!(!compliant(
            &contract,
            vec![require_on("balances"), external_call()]
        ));
    }

    #[test]
    fn textbook_withdraw_is_compliant() {
        let contract = vault();
        let deduct = Statement::expr(Expression::binary(
            BinaryOperator::SubAssign,
            Expression::index(
                Expression::ident("balances"),
                Expression::member(Expression::ident("msg"), "sender"),
            ),
            Expression::ident("amount"),
        ));
        assert!(compliant(
            &contract,
            vec![require_on("balances"), deduct, external_call()]
        ));
    }

    #[test]
    fn protection_does_not_survive_the_window_unless_reestablished() {
        // require(balances[..] >= amount); call; balances[..] = 0;
        // The check alone does not bless a post-call mutation, and the call
        // itself already trips the quirk.
        let contract = vault();
        assert!(!compliant(
            &contract,
            vec![require_on("balances"), external_call(), set_balance()]
        ));
    }

    #[test]
    fn mutation_of_untracked_local_is_ignored() {
        let contract = vault();
        let local_write = Statement::expr(Expression::binary(
            BinaryOperator::Assign,
            Expression::ident("total"),
            Expression::number("1"),
        ));
        assert!(compliant(&contract, vec![external_call(), local_write]));
    }

    #[test]
    fn storage_alias_mutation_counts_as_state_mutation() {
        let contract = vault();
        let body = vec![
            Statement::declare(
                crate::program::DeclaredVariable::storage("entry"),
                Some(Expression::index(
                    Expression::ident("balances"),
                    Expression::member(Expression::ident("msg"), "sender"),
                )),
            ),
            external_call(),
            Statement::expr(Expression::binary(
                BinaryOperator::Assign,
                Expression::ident("entry"),
                Expression::number("0"),
            )),
        ];
        assert!(!compliant(&contract, body));
    }

    #[test]
    fn send_result_assignment_to_unprotected_state_is_a_violation() {
        let contract =
            Contract::new("Vault").with_state_var(StateVariable::new("sent", VarKind::Bool));
        let body = vec![Statement::expr(Expression::binary(
            BinaryOperator::Assign,
            Expression::ident("sent"),
            Expression::call(
                Expression::member(Expression::ident("target"), "send"),
                vec![Expression::ident("amount")],
            ),
        ))];
        assert!(!compliant(&contract, body));
    }

    #[test]
    fn inlined_callee_violation_propagates() {
        let helper = Function::new("pay").with_body(vec![external_call(), set_balance()]);
        let contract = vault().with_function(helper);
        let body = vec![Statement::expr(Expression::call(
            Expression::ident("pay"),
            vec![],
        ))];
        assert!(!compliant(&contract, body));
    }

    #[test]
    fn call_cycle_is_conservatively_non_compliant() {
        let ping = Function::new("ping").with_body(vec![Statement::expr(Expression::call(
            Expression::ident("pong"),
            vec![],
        ))]);
        let pong = Function::new("pong").with_body(vec![Statement::expr(Expression::call(
            Expression::ident("ping"),
            vec![],
        ))]);
        let contract = vault().with_function(ping).with_function(pong);
        let body = vec![Statement::expr(Expression::call(
            Expression::ident("ping"),
            vec![],
        ))];
        assert!(!compliant(&contract, body));
    }
}
