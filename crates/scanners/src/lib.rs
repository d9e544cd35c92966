//! Seki Scanners - Reentrancy Detection for Solidity
//!
//! This crate provides a flow-sensitive checks-effects-interactions engine
//! over a parsed contract model, plus a lexical fallback scanner for raw
//! source, behind a common `Scanner` trait.

pub mod analysis;
pub mod core;
pub mod error;
pub mod program;
pub mod runner;

pub mod reentrancy;
pub mod source;

pub use crate::core::{
    AnalysisContext, Confidence, Finding, FunctionEligibility, Scanner, ScannerConfig, Severity,
};

pub use runner::{ScanReport, ScannerRegistry, ScanningEngine};

pub use reentrancy::{analyze_reentrancy, analyze_reentrancy_with, CeiReentrancyScanner};

pub use source::SourceReentrancyScanner;

pub use error::AnalysisError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_carries_both_scanners() {
        let registry = ScannerRegistry::with_defaults();
        let mut ids = registry.list_ids();
        ids.sort();
        assert_eq!(ids, vec!["cei-reentrancy", "source-reentrancy"]);
    }
}
