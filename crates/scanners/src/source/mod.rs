//! Source-level fallback scanning.
//!
//! When no parsed program is available, analysis degrades to coarse pattern
//! matching directly on the source text: no branch sensitivity, no
//! cross-function inlining, lower confidence. The fallback exists so the
//! tool still says something useful about a raw `.sol` file or a fetched
//! verified source that never went through a front end.

pub mod reentrancy;

pub use reentrancy::SourceReentrancyScanner;
