use crate::core::{AnalysisContext, Confidence, Finding, Severity};
use crate::reentrancy::REENTRANCY_KIND;
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;

static FUNCTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"function\s+(\w+)\s*\([^)]*\)[^{;]*\{").expect("Invalid regex"));

static CONTRACT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"contract\s+(\w+)").expect("Invalid regex"));

static EXTERNAL_CALL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\.call\s*\.\s*value\s*\(|\.call\s*[({]|\.send\s*\(|\.transfer\s*\(|\.delegatecall\s*[({]",
    )
    .expect("Invalid regex")
});

static TYPE_DECLARATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(uint\d*|int\d*|address|bool|string|bytes\d*|mapping)\b").expect("Invalid regex")
});

static LOCAL_DECLARATION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+(\[\])?\s+\w+\s*=").expect("Invalid regex"));

static STATE_MUTATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\w+(\[[^\]]*\])*\s*([-+]?=\s*[^=]|\+\+|--)").expect("Invalid regex")
});

static GUARD_MODIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)noReentrancy|nonReentrant|reentrancy.?guard|mutex|lock").expect("Invalid regex")
});

static DELEGATECALL_VALIDATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"require.*==.*owner|if.*==.*owner|onlyOwner|address.*!=.*0").expect("Invalid regex")
});

/// Names commonly used for lock bookkeeping; mutations of these inside a
/// modifier do not make the modifier a flawed guard.
const LOCK_NAMES: &[&str] = &["lock", "locked", "mutex", "reentrancyLock", "_status"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    ExternalCall,
    StateMutation,
}

struct Operation {
    kind: LineKind,
    line: usize,
    text: String,
}

/// Reduced-fidelity reentrancy scan over raw source text.
///
/// Extracts function bodies by brace matching, classifies each line as an
/// external call, a state mutation, or neither, and flags a function when a
/// mutation follows a call, when two calls are separated by a mutation, or
/// when a `delegatecall` has no nearby owner check. A recognizable guard
/// modifier suppresses the first two unless its own body mutates non-lock
/// state after the placeholder.
pub struct SourceReentrancyScanner;

impl SourceReentrancyScanner {
    pub fn new() -> Self {
        Self
    }

    fn scan_impl(&self, context: &AnalysisContext) -> Result<Vec<Finding>> {
        let Some(source) = context.source_code() else {
            return Ok(Vec::new());
        };

        let stripped = strip_comments(source);
        let contract_name = CONTRACT_REGEX
            .captures(&stripped)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "Main".to_string());

        let mut findings = Vec::new();
        for function in extract_functions(&stripped) {
            findings.extend(self.analyze_function(
                &function,
                &stripped,
                &contract_name,
                context.source_path(),
            ));
        }
        Ok(findings)
    }

    fn analyze_function(
        &self,
        function: &ExtractedFunction,
        source: &str,
        contract_name: &str,
        source_path: Option<&str>,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();

        let guarded = has_reentrancy_guard(&function.text, source);
        let operations = classify_operations(function);

        if !guarded {
            if let Some((call, mutation)) = first_mutation_after_call(&operations) {
                findings.push(
                    self.finding(
                        format!("Reentrancy in '{}'", function.name),
                        format!(
                            "Function '{}' in contract '{}' makes an external call at line {} \
                             and then modifies state at line {}. Untrusted code can reenter \
                             before the state change is applied.\n\nExternal call: {}\nState \
                             modification: {}",
                            function.name,
                            contract_name,
                            call.line,
                            mutation.line,
                            call.text,
                            mutation.text
                        ),
                        contract_name,
                        &function.name,
                        call.line,
                        &call.text,
                        source_path,
                    ),
                );
            } else if let Some((first, second)) = calls_split_by_mutation(&operations) {
                findings.push(
                    self.finding(
                        format!("Interleaved external calls in '{}'", function.name),
                        format!(
                            "Function '{}' in contract '{}' makes external calls at lines {} \
                             and {} with a state modification between them, leaving a window \
                             where reentered code observes half-updated state.",
                            function.name, contract_name, first.line, second.line
                        ),
                        contract_name,
                        &function.name,
                        second.line,
                        &second.text,
                        source_path,
                    ),
                );
            }
        }

        if let Some(delegate) = unvalidated_delegatecall(function) {
            findings.push(
                self.finding(
                    format!("Unvalidated delegatecall in '{}'", function.name),
                    format!(
                        "Function '{}' in contract '{}' performs a delegatecall at line {} \
                         without a nearby owner check, so the call target executes with this \
                         contract's storage and balance.",
                        function.name, contract_name, delegate.line
                    ),
                    contract_name,
                    &function.name,
                    delegate.line,
                    &delegate.text,
                    source_path,
                ),
            );
        }

        findings
    }

    #[allow(clippy::too_many_arguments)]
    fn finding(
        &self,
        title: String,
        description: String,
        contract: &str,
        function: &str,
        line: usize,
        snippet: &str,
        source_path: Option<&str>,
    ) -> Finding {
        Finding::new(
            "source-reentrancy",
            REENTRANCY_KIND,
            Severity::High,
            Confidence::Low,
            title,
            description,
        )
        .with_contract(contract)
        .with_function(function)
        .with_source_file(source_path.map(String::from))
        .with_line(line)
        .with_snippet(snippet)
    }
}

impl Default for SourceReentrancyScanner {
    fn default() -> Self {
        Self::new()
    }
}

crate::impl_scanner!(
    SourceReentrancyScanner,
    id: "source-reentrancy",
    name: "Lexical Reentrancy Scanner",
    severity: Severity::High,
    confidence: Confidence::Low,
    description: "Pattern-based reentrancy scan over raw source when no parsed program is available"
);

struct ExtractedFunction {
    name: String,
    /// Full text from the `function` keyword through the closing brace.
    text: String,
    /// 1-based line of the `function` keyword in the stripped source.
    start_line: usize,
    /// Offset of the opening brace within `text`.
    body_offset: usize,
}

fn strip_comments(source: &str) -> String {
    static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"//[^\n]*").expect("Invalid regex"));
    static BLOCK_COMMENT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("Invalid regex"));

    // Replace instead of delete so line numbers survive stripping.
    let without_blocks = BLOCK_COMMENT.replace_all(source, |caps: &regex::Captures<'_>| {
        caps[0]
            .chars()
            .map(|c| if c == '\n' { '\n' } else { ' ' })
            .collect::<String>()
    });
    LINE_COMMENT.replace_all(&without_blocks, "").into_owned()
}

fn extract_functions(source: &str) -> Vec<ExtractedFunction> {
    let mut functions = Vec::new();

    for caps in FUNCTION_REGEX.captures_iter(source) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        let name = caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let brace_pos = whole.end() - 1;

        let mut depth = 0usize;
        let mut end_pos = None;
        for (offset, ch) in source[brace_pos..].char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end_pos = Some(brace_pos + offset);
                        break;
                    }
                }
                _ => {}
            }
        }

        if let Some(end) = end_pos {
            let start_line = source[..whole.start()].matches('\n').count() + 1;
            functions.push(ExtractedFunction {
                name,
                text: source[whole.start()..=end].to_string(),
                start_line,
                body_offset: brace_pos - whole.start(),
            });
        }
    }

    functions
}

fn classify_operations(function: &ExtractedFunction) -> Vec<Operation> {
    let mut operations = Vec::new();

    let body = &function.text[function.body_offset + 1..];
    let lines_before_body = function.text[..function.body_offset].matches('\n').count();

    for (index, raw) in body.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line == "}" {
            continue;
        }
        let line_number = function.start_line + lines_before_body + index;

        if EXTERNAL_CALL_REGEX.is_match(line) {
            operations.push(Operation {
                kind: LineKind::ExternalCall,
                line: line_number,
                text: line.to_string(),
            });
        } else if is_state_mutation(line) {
            operations.push(Operation {
                kind: LineKind::StateMutation,
                line: line_number,
                text: line.to_string(),
            });
        }
    }

    operations
}

fn is_state_mutation(line: &str) -> bool {
    if TYPE_DECLARATION_REGEX.is_match(line) || LOCAL_DECLARATION_REGEX.is_match(line) {
        return false;
    }
    // Comparison operators are not assignments.
    if line.contains("==") || line.contains("!=") || line.contains(">=") || line.contains("<=") {
        return false;
    }
    if line.starts_with("require") || line.starts_with("if") || line.starts_with("return") {
        return false;
    }
    STATE_MUTATION_REGEX.is_match(line)
}

fn first_mutation_after_call<'a>(
    operations: &'a [Operation],
) -> Option<(&'a Operation, &'a Operation)> {
    let call = operations
        .iter()
        .find(|op| op.kind == LineKind::ExternalCall)?;
    let mutation = operations
        .iter()
        .find(|op| op.kind == LineKind::StateMutation && op.line > call.line)?;
    Some((call, mutation))
}

fn calls_split_by_mutation<'a>(
    operations: &'a [Operation],
) -> Option<(&'a Operation, &'a Operation)> {
    let calls: Vec<&Operation> = operations
        .iter()
        .filter(|op| op.kind == LineKind::ExternalCall)
        .collect();
    for pair in calls.windows(2) {
        let separated = operations.iter().any(|op| {
            op.kind == LineKind::StateMutation && op.line > pair[0].line && op.line < pair[1].line
        });
        if separated {
            return Some((pair[0], pair[1]));
        }
    }
    None
}

fn unvalidated_delegatecall(function: &ExtractedFunction) -> Option<Operation> {
    if DELEGATECALL_VALIDATION_REGEX.is_match(&function.text) {
        return None;
    }
    let body = &function.text[function.body_offset + 1..];
    let lines_before_body = function.text[..function.body_offset].matches('\n').count();
    for (index, raw) in body.lines().enumerate() {
        let line = raw.trim();
        if line.contains("delegatecall") {
            return Some(Operation {
                kind: LineKind::ExternalCall,
                line: function.start_line + lines_before_body + index,
                text: line.to_string(),
            });
        }
    }
    None
}

/// Guard detection with the flawed-guard demotion: a guard-named modifier
/// whose definition mutates non-lock state after `_;` releases the lock
/// before its bookkeeping finishes and is not credited.
fn has_reentrancy_guard(function_text: &str, source: &str) -> bool {
    let signature = &function_text[..function_text.find('{').unwrap_or(function_text.len())];
    let Some(guard_match) = GUARD_MODIFIER_REGEX.find(signature) else {
        return false;
    };

    let modifier_pattern = format!(
        r"(?s)modifier\s+{}\s*[^{{]*\{{(.*?)\}}",
        regex::escape(guard_match.as_str())
    );
    let Ok(modifier_regex) = Regex::new(&modifier_pattern) else {
        return true;
    };
    let Some(caps) = modifier_regex.captures(source) else {
        return true;
    };
    let body = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let Some((_, after_placeholder)) = body.split_once("_;") else {
        return true;
    };

    !has_non_lock_mutation(after_placeholder)
}

fn has_non_lock_mutation(text: &str) -> bool {
    for line in text.lines() {
        let line = line.trim();
        if !is_state_mutation(line) {
            continue;
        }
        let target: String = line
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if !LOCK_NAMES.contains(&target.as_str()) {
            return true;
        }
    }
    false
}
