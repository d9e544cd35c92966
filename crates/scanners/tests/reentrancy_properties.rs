//! End-to-end properties of the reentrancy analysis over constructed
//! programs: the canonical orderings, guard suppression, branch
//! conjunction, inheritance surfacing, and cycle safety.

use seki_scanners::program::{
    BinaryOperator, Contract, DeclaredVariable, Expression, Function, Import, Modifier,
    ModifierInvocation, Program, Statement, StateVariable, VarKind,
};
use seki_scanners::{
    analyze_reentrancy, analyze_reentrancy_with, Finding, FunctionEligibility, ScannerConfig,
};

fn external_call() -> Expression {
    Expression::call(
        Expression::member(Expression::ident("target"), "call"),
        vec![Expression::string("")],
    )
}

fn balance_lvalue() -> Expression {
    Expression::index(
        Expression::ident("balances"),
        Expression::member(Expression::ident("msg"), "sender"),
    )
}

fn zero_balance() -> Statement {
    Statement::expr(Expression::binary(
        BinaryOperator::Assign,
        balance_lvalue(),
        Expression::number("0"),
    ))
}

fn assign(name: &str, value: Expression) -> Statement {
    Statement::expr(Expression::binary(
        BinaryOperator::Assign,
        Expression::ident(name),
        value,
    ))
}

/// `let x = target.call(""); balances[msg.sender] = 0;`
fn vulnerable_withdraw() -> Function {
    Function::new("withdraw").with_body(vec![
        Statement::declare(DeclaredVariable::new("x"), Some(external_call())),
        zero_balance(),
    ])
}

fn vault_with(function: Function) -> Program {
    Program::new().with_contract(
        Contract::new("Vault")
            .with_state_var(StateVariable::new("balances", VarKind::Mapping))
            .with_function(function),
    )
}

fn finding_sites(findings: &[Finding]) -> Vec<(String, String)> {
    findings
        .iter()
        .map(|f| {
            (
                f.contract.clone().unwrap_or_default(),
                f.function.clone().unwrap_or_default(),
            )
        })
        .collect()
}

#[test]
fn canonical_violation_is_reported() {
    let program = vault_with(vulnerable_withdraw());
    let findings = analyze_reentrancy(&program);

    assert_eq!(
        finding_sites(&findings),
        vec![("Vault".to_string(), "withdraw".to_string())]
    );
    assert_eq!(findings[0].kind, "Reentrancy");
    assert!(findings[0].source_file.is_none());
}

#[test]
fn canonical_safe_ordering_is_not_reported() {
    let safe = Function::new("withdraw").with_body(vec![
        zero_balance(),
        Statement::expr(external_call()),
    ]);
    let program = vault_with(safe);

    assert!(analyze_reentrancy(&program).is_empty());
}

#[test]
fn analysis_is_idempotent() {
    let program = vault_with(vulnerable_withdraw());

    let first = finding_sites(&analyze_reentrancy(&program));
    let second = finding_sites(&analyze_reentrancy(&program));
    assert_eq!(first, second);
}

#[test]
fn recognized_guard_suppresses_the_finding() {
    let guard_body = vec![
        Statement::expr(Expression::call(
            Expression::ident("require"),
            vec![Expression::binary(
                BinaryOperator::Eq,
                Expression::ident("locked"),
                Expression::boolean(false),
            )],
        )),
        assign("locked", Expression::boolean(true)),
        Statement::Placeholder,
        assign("locked", Expression::boolean(false)),
    ];

    let program = Program::new().with_contract(
        Contract::new("Vault")
            .with_state_var(StateVariable::new("balances", VarKind::Mapping))
            .with_state_var(StateVariable::new("locked", VarKind::Bool))
            .with_modifier(Modifier::new("noReentrancy", guard_body))
            .with_function(
                vulnerable_withdraw().with_modifier(ModifierInvocation::new("noReentrancy")),
            ),
    );

    assert!(analyze_reentrancy(&program).is_empty());
}

#[test]
fn unrecognized_modifier_does_not_suppress() {
    // Same wrapping, but the modifier never restores the lock.
    let broken_guard = vec![
        Statement::expr(Expression::call(
            Expression::ident("require"),
            vec![Expression::binary(
                BinaryOperator::Eq,
                Expression::ident("locked"),
                Expression::boolean(false),
            )],
        )),
        assign("locked", Expression::boolean(true)),
        Statement::Placeholder,
    ];

    let program = Program::new().with_contract(
        Contract::new("Vault")
            .with_state_var(StateVariable::new("balances", VarKind::Mapping))
            .with_state_var(StateVariable::new("locked", VarKind::Bool))
            .with_modifier(Modifier::new("noReentrancy", broken_guard))
            .with_function(
                vulnerable_withdraw().with_modifier(ModifierInvocation::new("noReentrancy")),
            ),
    );

    assert_eq!(analyze_reentrancy(&program).len(), 1);
}

#[test]
fn protected_mutation_around_the_call_is_compliant() {
    // require(locked == false); locked = true; target.call(""); locked = false;
    let body = vec![
        Statement::expr(Expression::call(
            Expression::ident("require"),
            vec![Expression::binary(
                BinaryOperator::Eq,
                Expression::ident("locked"),
                Expression::boolean(false),
            )],
        )),
        assign("locked", Expression::boolean(true)),
        Statement::expr(external_call()),
        assign("locked", Expression::boolean(false)),
    ];

    let program = Program::new().with_contract(
        Contract::new("Vault")
            .with_state_var(StateVariable::new("locked", VarKind::Bool))
            .with_function(Function::new("guardedSend").with_body(body)),
    );

    assert!(analyze_reentrancy(&program).is_empty());
}

#[test]
fn both_branches_must_be_compliant() {
    // if (cond) { call; balances[..] = 0; } else { balances[..] = 0; call; }
    let body = vec![Statement::if_else(
        Expression::ident("cond"),
        Statement::Block(vec![Statement::expr(external_call()), zero_balance()]),
        Statement::Block(vec![zero_balance(), Statement::expr(external_call())]),
    )];
    let program = vault_with(Function::new("withdraw").with_body(body));

    assert_eq!(analyze_reentrancy(&program).len(), 1);
}

#[test]
fn compliant_single_branch_does_not_flag() {
    let body = vec![Statement::if_then(
        Expression::ident("cond"),
        Statement::Block(vec![zero_balance(), Statement::expr(external_call())]),
    )];
    let program = vault_with(Function::new("withdraw").with_body(body));

    assert!(analyze_reentrancy(&program).is_empty());
}

#[test]
fn inherited_vulnerability_surfaces_under_the_derived_contract() {
    let base = Contract::new("BaseVault")
        .with_state_var(StateVariable::new("balances", VarKind::Mapping))
        .with_function(vulnerable_withdraw());
    let derived = Contract::new("Derived").with_base("BaseVault");
    let program = Program::new().with_contract(base).with_contract(derived);

    let sites = finding_sites(&analyze_reentrancy(&program));
    assert!(sites.contains(&("Derived".to_string(), "withdraw".to_string())));
    assert!(sites.contains(&("BaseVault".to_string(), "withdraw".to_string())));
}

#[test]
fn contract_with_unresolvable_base_is_skipped_not_fatal() {
    let broken = Contract::new("Broken")
        .with_base("Missing")
        .with_function(vulnerable_withdraw());
    let program = vault_with(vulnerable_withdraw()).with_contract(broken);

    let sites = finding_sites(&analyze_reentrancy(&program));
    assert_eq!(sites, vec![("Vault".to_string(), "withdraw".to_string())]);
}

#[test]
fn imported_contract_resolves_its_source_file() {
    use seki_scanners::program::CompilationUnit;

    let imported = Contract::new("Vault")
        .with_state_var(StateVariable::new("balances", VarKind::Mapping))
        .with_function(vulnerable_withdraw());
    let unit = CompilationUnit::default().with_contract(imported.clone());
    let program = Program::new()
        .with_contract(imported)
        .with_import(Import::new("vault.sol", unit));

    let findings = analyze_reentrancy(&program);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].source_file.as_deref(), Some("vault.sol"));
}

#[test]
fn mutual_recursion_terminates_with_a_deterministic_verdict() {
    let ping = Function::new("ping").with_body(vec![Statement::expr(Expression::call(
        Expression::ident("pong"),
        vec![],
    ))]);
    let pong = Function::new("pong").with_body(vec![
        Statement::expr(Expression::call(Expression::ident("ping"), vec![])),
        Statement::expr(external_call()),
    ]);
    let program = Program::new().with_contract(
        Contract::new("Cyclic")
            .with_state_var(StateVariable::new("balances", VarKind::Mapping))
            .with_function(ping)
            .with_function(pong),
    );

    // `pong` reaches its own interaction and the cycle resolves
    // conservatively; `ping` has no interaction in its own body and is
    // pre-filtered out.
    let first = finding_sites(&analyze_reentrancy(&program));
    let second = finding_sites(&analyze_reentrancy(&program));
    assert_eq!(first, vec![("Cyclic".to_string(), "pong".to_string())]);
    assert_eq!(first, second);
}

#[test]
fn eligibility_override_widens_the_scan() {
    // Without an interaction the function is skipped by default even though
    // a check-free mutation exists.
    let quiet = Function::new("bookkeeping").with_body(vec![zero_balance()]);
    let program = vault_with(quiet);

    assert!(analyze_reentrancy(&program).is_empty());

    let all = ScannerConfig {
        eligibility: FunctionEligibility::All,
        ..ScannerConfig::default()
    };
    // Still compliant: an effect with no interaction violates nothing.
    assert!(analyze_reentrancy_with(&program, &all).is_empty());
}

#[test]
fn constructor_initialized_lock_is_honored_by_the_guard() {
    // The lock starts `true` via the constructor; the guard checks against
    // that value and inverts it for the critical section.
    let ctor = Function::constructor("constructor").with_body(vec![assign(
        "open",
        Expression::boolean(true),
    )]);
    let guard_body = vec![
        Statement::expr(Expression::call(
            Expression::ident("require"),
            vec![Expression::binary(
                BinaryOperator::Eq,
                Expression::ident("open"),
                Expression::boolean(true),
            )],
        )),
        assign("open", Expression::boolean(false)),
        Statement::Placeholder,
        assign("open", Expression::boolean(true)),
    ];

    let program = Program::new().with_contract(
        Contract::new("Vault")
            .with_state_var(StateVariable::new("balances", VarKind::Mapping))
            .with_state_var(StateVariable::new("open", VarKind::Bool))
            .with_modifier(Modifier::new("whenOpen", guard_body))
            .with_function(ctor)
            .with_function(
                vulnerable_withdraw().with_modifier(ModifierInvocation::new("whenOpen")),
            ),
    );

    assert!(analyze_reentrancy(&program).is_empty());
}
