pub mod config;
pub mod error;
pub mod languages;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{Config, FailurePolicy};
pub use error::JudgeError;
pub use languages::{HarnessProfile, LanguagesFile};
pub use types::{JudgingResponse, Submission, TestCase, TestResult};
