use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::response_code;

/// Submission-level failures
///
/// Everything here stops a submission before or while its workspace is being
/// prepared. Failures that happen while a test case runs are recorded in that
/// test case's result instead.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("{0}")]
    Validation(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("failed to create workspace {}: {source}", path.display())]
    WorkspaceCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid languages table {}: {reason}", path.display())]
    LanguageTable { path: PathBuf, reason: String },
}

impl JudgeError {
    /// Response code reported to the caller for this failure
    pub fn response_code(&self) -> i32 {
        match self {
            JudgeError::Validation(_) | JudgeError::UnsupportedLanguage(_) => {
                response_code::VALIDATION_FAILURE
            }
            _ => response_code::INTERNAL_FAILURE,
        }
    }

    /// Pipeline stage that failed, used in logs and metrics labels
    pub fn stage(&self) -> &'static str {
        match self {
            JudgeError::Validation(_) => "validation",
            JudgeError::UnsupportedLanguage(_) => "dispatch",
            JudgeError::WorkspaceCreation { .. } => "workspace",
            JudgeError::FileWrite { .. } => "harness",
            JudgeError::LanguageTable { .. } => "registry",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_codes() {
        assert_eq!(JudgeError::Validation("x".into()).response_code(), 422);
        assert_eq!(
            JudgeError::UnsupportedLanguage("cobol".into()).response_code(),
            422
        );

        let err = JudgeError::FileWrite {
            path: PathBuf::from("/tmp/main.py"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.response_code(), 500);
        assert_eq!(err.stage(), "harness");
        assert_eq!(err.to_string(), "failed to write /tmp/main.py: denied");
    }
}
