//! Reentrancy detection over the parsed contract model.
//!
//! Control flow per contract: resolve inheritance into a per-analysis copy,
//! recover constructor-derived initial values, then for every eligible
//! function check its attached modifiers with the guard recognizer and, when
//! none is a valid lock, run the CEI flow scan over the body. A
//! non-compliant verdict becomes a finding under the (derived) contract's
//! name, with the defining compilation unit resolved through the import set
//! for multi-file display.
//!
//! Failures stay scoped: a contract with an unresolvable base is skipped
//! with a warning and the rest of the program is still analyzed.

use crate::analysis::{
    apply_constructor_state, resolve_inheritance, CeiFlowAnalyzer, GuardRecognizer,
};
use crate::core::{
    AnalysisContext, Confidence, Finding, FunctionEligibility, ScannerConfig, Severity,
};
use crate::error::AnalysisError;
use crate::program::{Contract, Program};
use anyhow::Result;

pub const REENTRANCY_KIND: &str = "Reentrancy";

/// Analyze a whole program with the default configuration. This is the
/// library entry point for callers that already hold a parsed `Program`;
/// the scanner wrapper below is the same analysis behind the engine's
/// `Scanner` interface.
pub fn analyze_reentrancy(program: &Program) -> Vec<Finding> {
    analyze_reentrancy_with(program, &ScannerConfig::default())
}

pub fn analyze_reentrancy_with(program: &Program, config: &ScannerConfig) -> Vec<Finding> {
    let mut findings = Vec::new();
    for contract in program.contracts.values() {
        match prepare_contract(program, contract) {
            Ok(resolved) => findings.extend(scan_functions(program, &resolved, config)),
            Err(error) => {
                tracing::warn!(contract = %contract.name, %error, "skipping contract");
            }
        }
    }
    findings
}

/// The per-analysis copy every pass works on: inheritance flattened,
/// constructor-derived initial values annotated. The input program is left
/// untouched.
pub(crate) fn prepare_contract(
    program: &Program,
    contract: &Contract,
) -> Result<Contract, AnalysisError> {
    let mut resolved = resolve_inheritance(program, contract)?;
    apply_constructor_state(&mut resolved);
    Ok(resolved)
}

fn scan_functions(program: &Program, resolved: &Contract, config: &ScannerConfig) -> Vec<Finding> {
    let mut findings = Vec::new();

    for function in resolved.functions.values() {
        if config.eligibility == FunctionEligibility::InteractionsOnly
            && !function.has_interaction()
        {
            continue;
        }

        if is_guarded(resolved, function) {
            continue;
        }

        if !CeiFlowAnalyzer::new(resolved).is_compliant(&function.body) {
            findings.push(
                Finding::new(
                    "cei-reentrancy",
                    REENTRANCY_KIND,
                    Severity::High,
                    Confidence::Medium,
                    format!("Reentrancy in '{}'", function.name),
                    format!(
                        "Function '{}' in contract '{}' orders external calls and state \
                         mutations in a way that violates the checks-effects-interactions \
                         discipline, so untrusted code can reenter before state is finalized.",
                        function.name, resolved.name
                    ),
                )
                .with_contract(&resolved.name)
                .with_function(&function.name)
                .with_source_file(program.source_file_of(&resolved.name).map(String::from)),
            );
        }
    }

    findings
}

fn is_guarded(contract: &Contract, function: &crate::program::Function) -> bool {
    function.modifiers.iter().any(|invocation| {
        match contract.modifiers.get(&invocation.name) {
            Some(modifier) => {
                GuardRecognizer::new(contract).is_reentrancy_guard(&modifier.body)
            }
            None => {
                tracing::debug!(
                    error = %AnalysisError::UnresolvedReference {
                        contract: contract.name.clone(),
                        name: invocation.name.clone(),
                    },
                    "modifier not found, not treated as a guard"
                );
                false
            }
        }
    })
}

/// The flow-sensitive reentrancy scanner, packaged for the engine. Returns
/// no findings when the context carries no parsed program - the lexical
/// fallback covers that case.
pub struct CeiReentrancyScanner;

impl CeiReentrancyScanner {
    pub fn new() -> Self {
        Self
    }

    fn scan_impl(&self, context: &AnalysisContext) -> Result<Vec<Finding>> {
        let Some(program) = context.program() else {
            return Ok(Vec::new());
        };

        let mut findings = Vec::new();
        for contract in program.contracts.values() {
            let key = format!("resolved:{}", contract.name);
            let resolved = match context.get_or_compute(&key, || {
                prepare_contract(program, contract).map_err(anyhow::Error::from)
            }) {
                Ok(resolved) => resolved,
                Err(error) => {
                    tracing::warn!(contract = %contract.name, %error, "skipping contract");
                    continue;
                }
            };
            findings.extend(scan_functions(program, &resolved, context.config()));
        }
        Ok(findings)
    }
}

impl Default for CeiReentrancyScanner {
    fn default() -> Self {
        Self::new()
    }
}

crate::impl_scanner!(
    CeiReentrancyScanner,
    id: "cei-reentrancy",
    name: "CEI Reentrancy Scanner",
    severity: Severity::High,
    confidence: Confidence::Medium,
    description: "Flow-sensitive checks-effects-interactions analysis with guard recognition"
);
