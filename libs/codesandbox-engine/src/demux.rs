//! Output Demultiplexer
//!
//! The harness wraps its verdict in `<SandboxOutput-Start-...-SandboxOutput-End>`
//! so that whatever the solution prints cannot be mistaken for it. When the
//! harness also wrote the verdict to its side-channel file, that copy wins.

use codesandbox_common::TestResult;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const VERDICT_START: &str = "<SandboxOutput-Start-";
pub const VERDICT_END: &str = "-SandboxOutput-End>";

lazy_static! {
    static ref VERDICT_BLOCK: Regex =
        Regex::new(r"<SandboxOutput-Start-(.*?)-SandboxOutput-End>").expect("verdict pattern is valid");
}

#[derive(Debug, Error)]
pub enum ProtocolViolation {
    #[error("verdict block not found in harness output")]
    MissingVerdict,

    #[error("malformed verdict payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Structured verdict emitted by the harness runtime
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HarnessVerdict {
    pub status: i32,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub answer: Value,
    #[serde(default)]
    pub criterion: Value,
    #[serde(default = "unmeasured_time")]
    pub time_consumed: i64,
    #[serde(default = "unmeasured_memory")]
    pub memory_consumed: f64,
    #[serde(default)]
    pub is_success: bool,
}

fn unmeasured_time() -> i64 {
    -1
}

fn unmeasured_memory() -> f64 {
    -1.0
}

impl HarnessVerdict {
    pub fn into_result(self, test_id: u32) -> TestResult {
        TestResult {
            test_id,
            status: self.status,
            result: self.result,
            answer: self.answer,
            criterion: self.criterion,
            time_consumed: self.time_consumed,
            memory_consumed: self.memory_consumed,
            is_success: self.is_success,
        }
    }
}

/// Payload of the last verdict block in `output`
///
/// The harness prints its verdict after the solution returns, so an earlier
/// block can only come from the solution itself.
pub fn extract_verdict(output: &str) -> Option<&str> {
    VERDICT_BLOCK
        .captures_iter(output)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn parse_verdict(output: &str) -> Result<HarnessVerdict, ProtocolViolation> {
    let payload = extract_verdict(output).ok_or(ProtocolViolation::MissingVerdict)?;
    Ok(serde_json::from_str(payload)?)
}

/// Verdict for one run, preferring the side-channel copy
pub fn demultiplex(
    output: &str,
    side_channel: Option<&str>,
) -> Result<HarnessVerdict, ProtocolViolation> {
    if let Some(content) = side_channel {
        match serde_json::from_str(content.trim()) {
            Ok(verdict) => return Ok(verdict),
            Err(err) => debug!(%err, "unusable side-channel verdict, falling back to output"),
        }
    }
    parse_verdict(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const VERDICT: &str = r#"{"status": 1, "result": "OK", "answer": [1, 2], "criterion": [1, 2], "time_consumed": 12, "memory_consumed": 0.5, "is_success": true}"#;

    fn block(payload: &str) -> String {
        format!("{}{}{}", VERDICT_START, payload, VERDICT_END)
    }

    #[test]
    fn test_noise_around_verdict_is_ignored() {
        let output = format!("noise\nmore noise {}\ntrailing", block(VERDICT));

        let verdict = parse_verdict(&output).unwrap();
        assert_eq!(verdict.status, 1);
        assert_eq!(verdict.answer, json!([1, 2]));
        assert!(verdict.is_success);
        assert_eq!(verdict.time_consumed, 12);
    }

    #[test]
    fn test_last_block_wins() {
        let forged = block(r#"{"status": 1, "is_success": true}"#);
        let real = block(r#"{"status": -1, "result": "boom"}"#);
        let output = format!("{}\n{}\n", forged, real);

        let verdict = parse_verdict(&output).unwrap();
        assert_eq!(verdict.status, -1);
        assert!(!verdict.is_success);
    }

    #[test]
    fn test_missing_block() {
        let err = parse_verdict("Traceback (most recent call last):\n...").unwrap_err();
        assert!(matches!(err, ProtocolViolation::MissingVerdict));
    }

    #[test]
    fn test_malformed_payload() {
        let err = parse_verdict(&block("{not json")).unwrap_err();
        assert!(matches!(err, ProtocolViolation::Malformed(_)));

        // status is mandatory
        let err = parse_verdict(&block("{}")).unwrap_err();
        assert!(matches!(err, ProtocolViolation::Malformed(_)));
    }

    #[test]
    fn test_missing_fields_default() {
        let verdict = parse_verdict(&block(r#"{"status": -3, "result": "Time Limit Exceeded"}"#)).unwrap();
        assert_eq!(verdict.answer, Value::Null);
        assert_eq!(verdict.time_consumed, -1);
        assert_eq!(verdict.memory_consumed, -1.0);
        assert!(!verdict.is_success);
    }

    #[test]
    fn test_side_channel_preferred() {
        let output = block(r#"{"status": -1}"#);
        let verdict = demultiplex(&output, Some(VERDICT)).unwrap();
        assert_eq!(verdict.status, 1);
    }

    #[test]
    fn test_bad_side_channel_falls_back() {
        let output = block(VERDICT);
        let verdict = demultiplex(&output, Some("{truncated")).unwrap();
        assert_eq!(verdict.status, 1);

        assert!(demultiplex("", Some("")).is_err());
    }

    #[test]
    fn test_into_result_stamps_test_id() {
        let result = parse_verdict(&block(VERDICT)).unwrap().into_result(42);
        assert_eq!(result.test_id, 42);
        assert_eq!(result.result, "OK");
        assert_eq!(result.memory_consumed, 0.5);
    }
}
