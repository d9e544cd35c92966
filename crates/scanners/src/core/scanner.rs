//! Scanner trait for pluggable vulnerability detection.
//!
//! Scanners are independent and share no mutable state, so the engine can
//! run them in parallel. Each scanner declares what input it works from by
//! reading it off the `AnalysisContext`: the CEI engine needs a parsed
//! `Program`, the lexical fallback needs raw source text. A scanner whose
//! input is absent from the context returns no findings rather than failing,
//! which is what lets the fallback path coexist with the full analysis.

use crate::core::{AnalysisContext, Confidence, Finding, Severity};
use anyhow::Result;

pub trait Scanner: Send + Sync {
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        "No description provided"
    }

    fn severity(&self) -> Severity;

    fn confidence(&self) -> Confidence;

    fn scan(&self, context: &AnalysisContext) -> Result<Vec<Finding>>;

    fn enabled_by_default(&self) -> bool {
        true
    }
}

#[macro_export]
macro_rules! impl_scanner {
    (
        $scanner:ty,
        id: $id:expr,
        name: $name:expr,
        severity: $severity:expr,
        confidence: $confidence:expr
        $(, description: $description:expr)?
    ) => {
        impl $crate::core::Scanner for $scanner {
            fn id(&self) -> &'static str {
                $id
            }

            fn name(&self) -> &'static str {
                $name
            }

            fn severity(&self) -> $crate::core::Severity {
                $severity
            }

            fn confidence(&self) -> $crate::core::Confidence {
                $confidence
            }

            $(
                fn description(&self) -> &'static str {
                    $description
                }
            )?

            fn scan(
                &self,
                context: &$crate::core::AnalysisContext,
            ) -> anyhow::Result<Vec<$crate::core::Finding>> {
                self.scan_impl(context)
            }
        }
    };
}
