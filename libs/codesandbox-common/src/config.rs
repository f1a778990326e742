use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// What to do with the remaining test cases once one of them fails at the
/// harness level (launch error, abnormal exit, protocol violation, timeout)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and keep judging
    Continue,
    /// Stop after the first harness-level failure; the result list is cut short
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continue" => Ok(FailurePolicy::Continue),
            "abort" | "fail-fast" => Ok(FailurePolicy::Abort),
            other => Err(format!("unknown failure policy: {}", other)),
        }
    }
}

/// Application configuration
/// Provides defaults with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace_root: PathBuf,
    /// Installation root of the harness runtime files
    pub harness_root: PathBuf,
    pub languages_path: PathBuf,
    pub python_bin: String,
    pub wall_clock_slack_ms: u64,
    pub kill_grace_ms: u64,
    pub max_output_bytes: usize,
    pub max_parallel_tests: usize,
    pub failure_policy: FailurePolicy,
    pub keep_workspaces: bool,
    pub unique_workspaces: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            workspace_root: env::var("SANDBOX_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
            harness_root: env::var("SANDBOX_HARNESS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_harness_root()),
            languages_path: env::var("LANGUAGE_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("config/languages.json")),
            python_bin: env::var("SANDBOX_PYTHON_BIN").unwrap_or_else(|_| "python3".to_string()),
            wall_clock_slack_ms: env_or("SANDBOX_WALL_CLOCK_SLACK_MS", 1000),
            kill_grace_ms: env_or("SANDBOX_KILL_GRACE_MS", 200),
            max_output_bytes: env_or("SANDBOX_MAX_OUTPUT_BYTES", 1024 * 1024),
            max_parallel_tests: env_or("SANDBOX_MAX_PARALLEL_TESTS", 1usize).max(1),
            failure_policy: env_or("SANDBOX_FAILURE_POLICY", FailurePolicy::Continue),
            keep_workspaces: env_or("SANDBOX_KEEP_WORKSPACES", false),
            unique_workspaces: env_or("SANDBOX_UNIQUE_WORKSPACES", true),
        }
    }

    pub fn new() -> Self {
        Self::from_env()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// `harness/` at the repository root, fixed at build time so that lookups
/// never depend on the working directory of the running process
fn default_harness_root() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../harness"))
}
