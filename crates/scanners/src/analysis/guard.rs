//! Mutual-exclusion guard recognition.
//!
//! A modifier counts as a reentrancy guard only when its body walks the full
//! lock protocol around the placeholder:
//!
//! ```text
//! Unchecked -> Checked -> Locked -> PlaceholderSeen -> Unlocked
//! ```
//!
//! `Checked` is entered by a `require` over a single state variable (the
//! candidate lock) compared against its known initial value, or by an `if`
//! whose true arm reverts. `Locked` needs an assignment moving the lock away
//! from that initial value, `PlaceholderSeen` is the `_;` marker, and
//! `Unlocked` the assignment restoring the initial value. Only the first
//! check in the body is honored.
//!
//! Recognition fails outright when any state or storage variable is mutated
//! after the restoring assignment: a guard that releases its lock before
//! finishing bookkeeping does not serialize anything. Guards implemented
//! through in-contract helper functions are followed by inlining the helper
//! body into the running scan.

use crate::error::AnalysisError;
use crate::program::{
    BinaryOperator, Contract, Expression, Literal, Statement, UnaryOperator, VarKind,
};
use std::collections::HashSet;

/// Value a lock is compared against and restored to. Numbers keep their
/// source spelling; the analysis only ever needs equality.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LockValue {
    Bool(bool),
    Number(String),
}

#[derive(Debug, Clone)]
enum GuardStage {
    Unchecked,
    Checked { lock: String, initial: LockValue },
    Locked { lock: String, initial: LockValue },
    PlaceholderSeen { lock: String, initial: LockValue },
    Unlocked,
}

struct GuardScan {
    stage: GuardStage,
    storage_vars: HashSet<String>,
}

impl GuardScan {
    fn new() -> Self {
        Self {
            stage: GuardStage::Unchecked,
            storage_vars: HashSet::new(),
        }
    }
}

pub struct GuardRecognizer<'a> {
    contract: &'a Contract,
    call_stack: Vec<String>,
}

impl<'a> GuardRecognizer<'a> {
    pub fn new(contract: &'a Contract) -> Self {
        Self {
            contract,
            call_stack: Vec::new(),
        }
    }

    /// Does `body` (a modifier body, or a function body it forwards to)
    /// implement a valid lock?
    pub fn is_reentrancy_guard(&mut self, body: &[Statement]) -> bool {
        let mut scan = GuardScan::new();
        self.walk(body, &mut scan) && matches!(scan.stage, GuardStage::Unlocked)
    }

    fn walk(&mut self, statements: &[Statement], scan: &mut GuardScan) -> bool {
        for statement in statements {
            match statement {
                Statement::VariableDeclaration {
                    variables,
                    initializer,
                } => {
                    track_storage_aliases(variables, initializer, &mut scan.storage_vars);
                }
                Statement::If {
                    condition,
                    true_branch,
                    ..
                } => {
                    if arm_reverts(true_branch.as_deref()) {
                        if let GuardStage::Unchecked = scan.stage {
                            if let Some(lock) = lock_name(condition) {
                                if let Some(initial) = known_value(self.contract, lock) {
                                    scan.stage = GuardStage::Checked {
                                        lock: lock.to_string(),
                                        initial,
                                    };
                                }
                            }
                        }
                    }
                }
                Statement::Placeholder => {
                    if let GuardStage::Locked { lock, initial } = &scan.stage {
                        scan.stage = GuardStage::PlaceholderSeen {
                            lock: lock.clone(),
                            initial: initial.clone(),
                        };
                    }
                }
                Statement::Expression(expr) => {
                    if !self.handle_expression(expr, scan) {
                        return false;
                    }
                }
                Statement::Block(inner) => {
                    if !self.walk(inner, scan) {
                        return false;
                    }
                }
                Statement::Revert | Statement::Emit(_) | Statement::Return(_) => {}
            }
        }
        true
    }

    fn handle_expression(&mut self, expr: &Expression, scan: &mut GuardScan) -> bool {
        match expr {
            Expression::FunctionCall { callee, arguments } => {
                if let Some(name) = callee.as_identifier() {
                    if name == "require" {
                        self.handle_require(arguments, scan);
                    } else if let Some(helper) = self.contract.functions.get(name) {
                        // Guard implemented via a helper: inline its body
                        // into the running scan.
                        if self.call_stack.iter().any(|f| f == name) {
                            tracing::debug!(
                                error = %AnalysisError::RecursionCycle {
                                    contract: self.contract.name.clone(),
                                    function: name.to_string(),
                                },
                                "guard recognition aborted"
                            );
                            return false;
                        }
                        self.call_stack.push(name.to_string());
                        let ok = self.walk(&helper.body, scan);
                        self.call_stack.pop();
                        if !ok {
                            return false;
                        }
                    }
                }
                true
            }
            Expression::Binary { op, left, right } if op.is_assignment() => {
                if *op == BinaryOperator::Assign {
                    if let Some(name) = left.as_identifier() {
                        match &scan.stage {
                            GuardStage::Checked { lock, initial } if name == lock => {
                                if let Some(value) = operand_value(self.contract, right) {
                                    if value != *initial {
                                        scan.stage = GuardStage::Locked {
                                            lock: lock.clone(),
                                            initial: initial.clone(),
                                        };
                                    }
                                }
                                return true;
                            }
                            GuardStage::PlaceholderSeen { lock, initial } if name == lock => {
                                if let Some(value) = operand_value(self.contract, right) {
                                    if value == *initial {
                                        scan.stage = GuardStage::Unlocked;
                                        // The restoring assignment itself is
                                        // not a post-unlock mutation.
                                        return true;
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
                self.check_post_unlock(left, scan)
            }
            Expression::Unary { op, operand, .. } if op.is_mutation() => {
                self.check_post_unlock(operand, scan)
            }
            _ => true,
        }
    }

    fn handle_require(&self, arguments: &[Expression], scan: &mut GuardScan) {
        // Only the first check in the body is honored.
        if !matches!(scan.stage, GuardStage::Unchecked) {
            return;
        }
        let Some(condition) = arguments.first() else {
            return;
        };
        if !self.condition_holds_initially(condition) {
            return;
        }
        if let Some(lock) = lock_name(condition) {
            if let Some(initial) = known_value(self.contract, lock) {
                scan.stage = GuardStage::Checked {
                    lock: lock.to_string(),
                    initial,
                };
            }
        }
    }

    /// Would the `require` condition pass with every state variable at its
    /// known initial value? Only simple shapes are evaluated; anything else
    /// is not credited as a check.
    fn condition_holds_initially(&self, condition: &Expression) -> bool {
        match condition {
            Expression::Unary {
                op: UnaryOperator::Not,
                operand,
                ..
            } => operand
                .as_identifier()
                .and_then(|name| self.contract.state_vars.get(name))
                .map(|var| {
                    var.initializer.is_none()
                        || known_value(self.contract, &var.name) == Some(LockValue::Bool(false))
                })
                .unwrap_or(false),
            Expression::Identifier(name) => {
                let Some(var) = self.contract.state_vars.get(name) else {
                    return false;
                };
                var.initializer.is_some()
                    && known_value(self.contract, name) == Some(LockValue::Bool(true))
            }
            Expression::Binary { op, left, right } => {
                let left_var = left
                    .as_identifier()
                    .filter(|n| self.contract.state_vars.contains_key(*n));
                let right_var = right
                    .as_identifier()
                    .filter(|n| self.contract.state_vars.contains_key(*n));
                let (name, other) = if let Some(name) = left_var {
                    (name, right.as_ref())
                } else if let Some(name) = right_var {
                    (name, left.as_ref())
                } else {
                    return false;
                };
                let Some(lhs) = known_value(self.contract, name) else {
                    return false;
                };
                let Some(rhs) = operand_value(self.contract, other) else {
                    return false;
                };
                if *op == BinaryOperator::Eq {
                    lhs == rhs
                } else {
                    lhs != rhs
                }
            }
            _ => false,
        }
    }

    /// After the lock is restored, no state or storage variable may be
    /// touched. A mutation there means the critical section outlives the
    /// lock.
    fn check_post_unlock(&self, lvalue: &Expression, scan: &GuardScan) -> bool {
        if !matches!(scan.stage, GuardStage::Unlocked) {
            return true;
        }
        match lvalue.mutation_target() {
            Some(target) => {
                !(self.contract.state_vars.contains_key(target)
                    || scan.storage_vars.contains(target))
            }
            None => true,
        }
    }
}

/// Candidate lock named by a check condition: the identifier side of a
/// comparison, a bare identifier, or the operand of a `!`.
fn lock_name(condition: &Expression) -> Option<&str> {
    match condition {
        Expression::Binary { left, right, .. } => {
            left.as_identifier().or_else(|| right.as_identifier())
        }
        Expression::Identifier(name) => Some(name),
        Expression::Unary {
            op: UnaryOperator::Not,
            operand,
            ..
        } => operand.as_identifier(),
        _ => None,
    }
}

/// Known value of a state variable: its (possibly constructor-recovered)
/// initializer, following identifier chains, or the language default for
/// its kind when no initializer is known.
fn known_value(contract: &Contract, name: &str) -> Option<LockValue> {
    let mut seen = HashSet::new();
    let mut current = contract.state_vars.get(name)?;
    loop {
        if !seen.insert(current.name.clone()) {
            return None;
        }
        match &current.initializer {
            Some(Expression::Literal(Literal::Bool(b))) => return Some(LockValue::Bool(*b)),
            Some(Expression::Literal(Literal::Number(n))) => {
                return Some(LockValue::Number(n.clone()))
            }
            Some(Expression::Identifier(next)) => {
                current = contract.state_vars.get(next)?;
            }
            Some(_) => return None,
            None => {
                return Some(match current.kind {
                    VarKind::Bool => LockValue::Bool(false),
                    _ => LockValue::Number("0".to_string()),
                })
            }
        }
    }
}

/// Value of an assignment right-hand side or comparison operand: a literal,
/// or an identifier resolved through the state-variable table.
fn operand_value(contract: &Contract, expr: &Expression) -> Option<LockValue> {
    match expr {
        Expression::Literal(Literal::Bool(b)) => Some(LockValue::Bool(*b)),
        Expression::Literal(Literal::Number(n)) => Some(LockValue::Number(n.clone())),
        Expression::Identifier(name) => known_value(contract, name),
        _ => None,
    }
}

/// Record `storage`-qualified locals declared in the body. Mutating one is
/// mutating the aliased state variable, so they join the tracked set.
pub(crate) fn track_storage_aliases(
    variables: &[crate::program::DeclaredVariable],
    initializer: &Option<Expression>,
    storage_vars: &mut HashSet<String>,
) {
    if let Some(Expression::Tuple(components)) = initializer {
        for (variable, _component) in variables.iter().zip(components) {
            if variable.is_storage {
                storage_vars.insert(variable.name.clone());
            }
        }
    } else if let Some(first) = variables.first() {
        if first.is_storage {
            storage_vars.insert(first.name.clone());
        }
    }
}

fn arm_reverts(arm: Option<&Statement>) -> bool {
    match arm {
        Some(Statement::Revert) => true,
        Some(Statement::Block(stmts)) => stmts.iter().any(|s| matches!(s, Statement::Revert)),
        _ => false,
    }
}
