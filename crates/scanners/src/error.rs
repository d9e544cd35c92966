use thiserror::Error;

/// Failure taxonomy for the analysis core.
///
/// None of these abort a run. Linkage and malformed-input errors skip the
/// contract or function that produced them; unresolved references and call
/// cycles degrade to a conservative answer inside the affected analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("cannot resolve base contract `{base}` of `{contract}`")]
    Linkage { contract: String, base: String },

    #[error("unresolved reference `{name}` in `{contract}`")]
    UnresolvedReference { contract: String, name: String },

    #[error("call cycle while inlining `{function}` in `{contract}`")]
    RecursionCycle { contract: String, function: String },

    #[error("malformed input: {0}")]
    Malformed(String),
}
