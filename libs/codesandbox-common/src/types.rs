use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::JudgeError;

/// Per-test status codes shared with the harness runtime
///
/// Positive values come from the harness verdict; the negative range is split
/// between solution-level outcomes reported by the harness (`-1`, `-3`, `-4`)
/// and failures of the harness layer itself (`-2`).
pub mod status_code {
    pub const OK: i32 = 1;
    pub const SOLUTION_ERROR: i32 = -1;
    pub const HARNESS_FAILURE: i32 = -2;
    pub const TIME_LIMIT_EXCEEDED: i32 = -3;
    pub const MEMORY_LIMIT_EXCEEDED: i32 = -4;
}

/// Top-level response codes carried in the body of every judging response
pub mod response_code {
    pub const OK: i32 = 200;
    pub const VALIDATION_FAILURE: i32 = 422;
    pub const INTERNAL_FAILURE: i32 = 500;
}

/// Test Case Definition (Immutable Input)
/// `input_output` is opaque to the backend and fed to the harness verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub test_id: u32,
    #[serde(default)]
    pub input_output: String,
}

/// Judging request for one candidate solution
///
/// Missing string fields deserialize as empty so that validation, not the
/// JSON decoder, decides how the request is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_submission", skip_on_field_errors = false))]
pub struct Submission {
    #[serde(default)]
    #[validate(length(min = 1, message = "language must not be empty"))]
    pub language: String,
    #[serde(default)]
    pub question_id: i64,
    #[serde(default)]
    #[validate(length(min = 1, message = "judge template must not be empty"))]
    pub judge_template: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "solution code must not be empty"))]
    pub solution_code: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "at least one test case is required"))]
    pub tests: Vec<TestCase>,
    /// Milliseconds
    #[serde(default)]
    pub time_limit: u64,
    /// Megabytes
    #[serde(default)]
    pub memory_limit: f64,
    #[serde(default)]
    #[validate(length(min = 1, message = "user id must not be empty"))]
    pub user_id: String,
}

/// Cross-field checks: positive limits and unique test ids
///
/// Test ids name the per-case side-channel file, so two cases with the same
/// id would overwrite each other's verdict.
fn validate_submission(submission: &Submission) -> Result<(), ValidationError> {
    if submission.time_limit == 0 {
        let mut err = ValidationError::new("time_limit");
        err.message = Some("time limit must be greater than 0".into());
        return Err(err);
    }
    if !(submission.memory_limit > 0.0) {
        let mut err = ValidationError::new("memory_limit");
        err.message = Some("memory limit must be greater than 0".into());
        return Err(err);
    }
    let mut seen = HashSet::with_capacity(submission.tests.len());
    if let Some(test) = submission.tests.iter().find(|t| !seen.insert(t.test_id)) {
        let mut err = ValidationError::new("tests");
        err.message = Some(format!("duplicate test_id {}", test.test_id).into());
        return Err(err);
    }
    Ok(())
}

/// Order in which field errors are reported, first match wins
const FIELD_ORDER: &[&str] = &[
    "solution_code",
    "language",
    "tests",
    "judge_template",
    "__all__",
    "user_id",
];

impl Submission {
    /// Validate required fields and limits
    ///
    /// Only the first failing field is reported, in a fixed order, so the
    /// caller always sees the same message for the same request.
    pub fn check(&self) -> Result<(), JudgeError> {
        self.validate().map_err(|errors| JudgeError::Validation(first_message(&errors)))
    }
}

fn first_message(errors: &ValidationErrors) -> String {
    let field_errors = errors.field_errors();
    for field in FIELD_ORDER {
        if let Some(list) = field_errors.get(field) {
            if let Some(err) = list.first() {
                return match &err.message {
                    Some(message) => message.to_string(),
                    None => format!("invalid field: {}", field),
                };
            }
        }
    }
    errors.to_string()
}

/// Per-Test Result
/// The harness fills everything but `test_id`; the aggregator stamps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: u32,
    pub status: i32,
    pub result: String,
    pub answer: Value,
    pub criterion: Value,
    pub time_consumed: i64,
    pub memory_consumed: f64,
    pub is_success: bool,
}

impl TestResult {
    /// Result for a case where the harness layer itself broke
    pub fn harness_failure(test_id: u32, message: impl Into<String>) -> Self {
        Self::failed(test_id, status_code::HARNESS_FAILURE, message.into())
    }

    /// Result for a case killed by the wall-clock limit
    pub fn time_limit_exceeded(test_id: u32, limit_ms: u64) -> Self {
        Self::failed(
            test_id,
            status_code::TIME_LIMIT_EXCEEDED,
            format!("Time Limit Exceeded (wall clock {}ms)", limit_ms),
        )
    }

    fn failed(test_id: u32, status: i32, result: String) -> Self {
        Self {
            test_id,
            status,
            result,
            answer: Value::Null,
            criterion: Value::Null,
            time_consumed: -1,
            memory_consumed: -1.0,
            is_success: false,
        }
    }

    pub fn is_harness_failure(&self) -> bool {
        self.status == status_code::HARNESS_FAILURE
    }

    pub fn is_timeout(&self) -> bool {
        self.status == status_code::TIME_LIMIT_EXCEEDED
    }
}

/// Judging Response
/// The only shape that crosses the system boundary back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgingResponse {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub results: Vec<TestResult>,
}

impl JudgingResponse {
    pub fn completed(results: Vec<TestResult>) -> Self {
        Self {
            code: response_code::OK,
            message: "OK".to_string(),
            results,
        }
    }

    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            results: Vec::new(),
        }
    }
}

impl From<JudgeError> for JudgingResponse {
    fn from(err: JudgeError) -> Self {
        Self::failure(err.response_code(), err.to_string())
    }
}
