//! The analysis passes behind the reentrancy scanner.
//!
//! Run order per contract: inheritance resolution produces the merged
//! per-analysis copy, the constructor pass annotates known initial values on
//! it, then each function is checked first against its modifiers by the
//! guard recognizer and, if unguarded, by the CEI flow analyzer.

pub mod cei;
pub mod constructor_state;
pub mod guard;
pub mod inheritance;

pub use cei::CeiFlowAnalyzer;
pub use constructor_state::apply_constructor_state;
pub use guard::GuardRecognizer;
pub use inheritance::resolve_inheritance;
