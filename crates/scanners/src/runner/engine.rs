use crate::core::{AnalysisContext, Finding, Scanner, ScannerConfig};
use crate::runner::ScanReport;
use anyhow::Result;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

/// Runs a set of scanners over one analysis context. Scanners share no
/// mutable state, so with `parallel_execution` they fan out on the rayon
/// pool; a scanner failure is logged and scoped to that scanner, never
/// fatal to the run.
pub struct ScanningEngine {
    scanners: Vec<Arc<dyn Scanner>>,
    config: ScannerConfig,
}

impl ScanningEngine {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            scanners: Vec::new(),
            config,
        }
    }

    pub fn add_scanner<S: Scanner + 'static>(mut self, scanner: S) -> Self {
        self.scanners.push(Arc::new(scanner));
        self
    }

    pub fn with_scanners(mut self, scanners: Vec<Arc<dyn Scanner>>) -> Self {
        self.scanners.extend(scanners);
        self
    }

    pub fn run(&self, context: &AnalysisContext) -> Result<ScanReport> {
        let mut findings: Vec<Finding> = if self.config.parallel_execution {
            self.scanners
                .par_iter()
                .filter_map(|scanner| match scanner.scan(context) {
                    Ok(findings) => Some(findings),
                    Err(error) => {
                        tracing::warn!(scanner = scanner.id(), %error, "scanner failed");
                        None
                    }
                })
                .flatten()
                .collect()
        } else {
            let mut all = Vec::new();
            for scanner in &self.scanners {
                match scanner.scan(context) {
                    Ok(findings) => all.extend(findings),
                    Err(error) => {
                        tracing::warn!(scanner = scanner.id(), %error, "scanner failed");
                    }
                }
            }
            all
        };

        if self.config.deduplication_enabled {
            let mut seen = HashSet::new();
            findings.retain(|finding| seen.insert(finding.dedup_key()));
        }

        Ok(ScanReport::new(findings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Confidence, Severity};

    struct FailingScanner;

    impl Scanner for FailingScanner {
        fn id(&self) -> &'static str {
            "failing"
        }
        fn name(&self) -> &'static str {
            "Failing Scanner"
        }
        fn severity(&self) -> Severity {
            Severity::Low
        }
        fn confidence(&self) -> Confidence {
            Confidence::Low
        }
        fn scan(&self, _context: &AnalysisContext) -> Result<Vec<Finding>> {
            anyhow::bail!("broken")
        }
    }

    struct FixedScanner;

    impl Scanner for FixedScanner {
        fn id(&self) -> &'static str {
            "fixed"
        }
        fn name(&self) -> &'static str {
            "Fixed Scanner"
        }
        fn severity(&self) -> Severity {
            Severity::High
        }
        fn confidence(&self) -> Confidence {
            Confidence::High
        }
        fn scan(&self, _context: &AnalysisContext) -> Result<Vec<Finding>> {
            Ok(vec![Finding::new(
                "fixed",
                "Reentrancy",
                Severity::High,
                Confidence::High,
                "fixed finding",
                "always present",
            )
            .with_contract("C")
            .with_function("f")])
        }
    }

    #[test]
    fn one_failing_scanner_does_not_abort_the_run() {
        let config = ScannerConfig {
            parallel_execution: false,
            ..ScannerConfig::default()
        };
        let context = AnalysisContext::new(config.clone());
        let engine = ScanningEngine::new(config)
            .add_scanner(FailingScanner)
            .add_scanner(FixedScanner);

        let report = engine.run(&context).unwrap();
        assert_eq!(report.findings().len(), 1);
    }

    #[test]
    fn duplicate_findings_are_dropped() {
        let config = ScannerConfig {
            parallel_execution: false,
            ..ScannerConfig::default()
        };
        let context = AnalysisContext::new(config.clone());
        let engine = ScanningEngine::new(config)
            .add_scanner(FixedScanner)
            .add_scanner(FixedScanner);

        let report = engine.run(&context).unwrap();
        assert_eq!(report.findings().len(), 1);
    }
}
