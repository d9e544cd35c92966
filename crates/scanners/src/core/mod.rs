pub mod context;
pub mod result;
pub mod scanner;
pub mod severity;

pub use context::{AnalysisContext, FunctionEligibility, ScannerConfig};
pub use result::Finding;
pub use scanner::Scanner;
pub use severity::{Confidence, Severity};
