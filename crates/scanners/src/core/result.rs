use crate::core::{Confidence, Severity};
use serde::{Deserialize, Serialize};

/// A single analysis finding.
///
/// `contract` and `function` identify the violation site in the program
/// model; `source_file` is the defining compilation unit when the contract
/// comes from an import (absent for the current file). `line` and `snippet`
/// are only populated by the lexical fallback path, which works on raw text
/// and has positions instead of model nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub scanner_id: String,

    /// Vulnerability class, e.g. "Reentrancy".
    pub kind: String,

    pub severity: Severity,

    pub confidence: Confidence,

    pub title: String,

    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Finding {
    pub fn new(
        scanner_id: impl Into<String>,
        kind: impl Into<String>,
        severity: Severity,
        confidence: Confidence,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            scanner_id: scanner_id.into(),
            kind: kind.into(),
            severity,
            confidence,
            title: title.into(),
            description: description.into(),
            contract: None,
            function: None,
            source_file: None,
            line: None,
            snippet: None,
        }
    }

    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_source_file(mut self, source_file: Option<String>) -> Self {
        self.source_file = source_file;
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Key used by the engine to drop duplicate findings for the same site.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.scanner_id,
            self.kind,
            self.contract.as_deref().unwrap_or(""),
            self.function.as_deref().unwrap_or(""),
            self.line.map(|l| l.to_string()).unwrap_or_default(),
        )
    }
}
