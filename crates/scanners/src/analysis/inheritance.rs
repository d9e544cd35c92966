//! Base-contract member resolution.
//!
//! Before any analysis runs, a derived contract is flattened into a single
//! per-analysis copy: every function, modifier, and state variable of each
//! base that the derived contract does not define itself is copied in. A
//! locally-defined member always wins. Bases are processed in declaration
//! order, so on a name collision between two bases the first declared base
//! wins - that ordering is deliberate and tested, not incidental.

use crate::error::AnalysisError;
use crate::program::{Contract, Program};

/// Flatten `contract` against its bases. Bases are looked up among the
/// program's own contracts first, then through the import set: an import
/// matches when one of its unit's top-level contracts is aliased to the base
/// name. An unresolvable base is a linkage error and the caller skips the
/// contract.
pub fn resolve_inheritance(
    program: &Program,
    contract: &Contract,
) -> Result<Contract, AnalysisError> {
    let mut resolved = contract.clone();

    for base_name in &contract.bases {
        let base = lookup_base(program, base_name).ok_or_else(|| AnalysisError::Linkage {
            contract: contract.name.clone(),
            base: base_name.clone(),
        })?;

        for (name, function) in &base.functions {
            resolved
                .functions
                .entry(name.clone())
                .or_insert_with(|| function.clone());
        }
        for (name, modifier) in &base.modifiers {
            resolved
                .modifiers
                .entry(name.clone())
                .or_insert_with(|| modifier.clone());
        }
        for (name, var) in &base.state_vars {
            resolved
                .state_vars
                .entry(name.clone())
                .or_insert_with(|| var.clone());
        }
    }

    Ok(resolved)
}

fn lookup_base<'a>(program: &'a Program, base_name: &str) -> Option<&'a Contract> {
    if let Some(local) = program.contracts.get(base_name) {
        return Some(local);
    }

    for import in &program.imports {
        for contract in import.unit.contracts.values() {
            if import.aliases.get(&contract.name).map(String::as_str) == Some(base_name) {
                return Some(contract);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{
        CompilationUnit, Expression, Function, Import, Statement, StateVariable, VarKind,
    };

    fn base_with_withdraw(name: &str, marker: &str) -> Contract {
        Contract::new(name)
            .with_state_var(StateVariable::new(marker, VarKind::Integer))
            .with_function(Function::new("withdraw").with_body(vec![Statement::expr(
                Expression::ident(marker),
            )]))
    }

    #[test]
    fn base_members_are_copied_unless_overridden() {
        let base = base_with_withdraw("Vault", "a");
        let derived = Contract::new("Child")
            .with_base("Vault")
            .with_function(Function::new("deposit"));
        let program = Program::new()
            .with_contract(base)
            .with_contract(derived.clone());

        let resolved = resolve_inheritance(&program, &derived).unwrap();
        assert!(resolved.functions.contains_key("withdraw"));
        assert!(resolved.functions.contains_key("deposit"));
        assert!(resolved.state_vars.contains_key("a"));
    }

    #[test]
    fn local_definition_wins_over_base() {
        let base = base_with_withdraw("Vault", "a");
        let local_withdraw = Function::new("withdraw").with_body(vec![Statement::Revert]);
        let derived = Contract::new("Child")
            .with_base("Vault")
            .with_function(local_withdraw);
        let program = Program::new()
            .with_contract(base)
            .with_contract(derived.clone());

        let resolved = resolve_inheritance(&program, &derived).unwrap();
        assert!(matches!(
            resolved.functions["withdraw"].body[0],
            Statement::Revert
        ));
    }

    #[test]
    fn first_declared_base_wins_on_collision() {
        let first = base_with_withdraw("First", "a");
        let second = base_with_withdraw("Second", "b");
        let derived = Contract::new("Child").with_base("First").with_base("Second");
        let program = Program::new()
            .with_contract(first)
            .with_contract(second)
            .with_contract(derived.clone());

        let resolved = resolve_inheritance(&program, &derived).unwrap();
        // Both bases define `withdraw`; the first declared one is kept.
        match &resolved.functions["withdraw"].body[0] {
            Statement::Expression(Expression::Identifier(name)) => assert_eq!(name, "a"),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn base_resolves_through_import_alias() {
        let external = base_with_withdraw("VaultImpl", "a");
        let unit = CompilationUnit::default().with_contract(external);
        let import = Import::new("vault.sol", unit).with_alias("VaultImpl", "Vault");
        let derived = Contract::new("Child").with_base("Vault");
        let program = Program::new()
            .with_contract(derived.clone())
            .with_import(import);

        let resolved = resolve_inheritance(&program, &derived).unwrap();
        assert!(resolved.functions.contains_key("withdraw"));
    }

    #[test]
    fn unresolvable_base_is_a_linkage_error() {
        let derived = Contract::new("Child").with_base("Missing");
        let program = Program::new().with_contract(derived.clone());

        let err = resolve_inheritance(&program, &derived).unwrap_err();
        assert!(err.to_string().contains("Missing"));
    }
}
