use crate::core::Finding;
use serde::Serialize;
use std::collections::BTreeMap;

/// Findings grouped for presentation: file -> contract -> function ->
/// findings. The `None` file key is the compilation unit under analysis
/// itself; named keys come from findings whose contract was resolved
/// through an import.
pub type GroupedFindings<'a> =
    BTreeMap<Option<&'a str>, BTreeMap<&'a str, BTreeMap<&'a str, Vec<&'a Finding>>>>;

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    findings: Vec<Finding>,
}

impl ScanReport {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self { findings }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn grouped(&self) -> GroupedFindings<'_> {
        let mut grouped: GroupedFindings<'_> = BTreeMap::new();
        for finding in &self.findings {
            grouped
                .entry(finding.source_file.as_deref())
                .or_default()
                .entry(finding.contract.as_deref().unwrap_or("<unknown>"))
                .or_default()
                .entry(finding.function.as_deref().unwrap_or("<unknown>"))
                .or_default()
                .push(finding);
        }
        grouped
    }
}
