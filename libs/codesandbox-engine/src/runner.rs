/// Process Runner - Interpreter Invocation per Test Case
///
/// **Core Responsibility:**
/// Run the composed entry file once per test case and capture what the
/// process printed, how long it took and how it ended.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (interpreter, stdin framing, timeout)
/// - Engine does NOT parse the verdict (demux's job)
/// - Engine does NOT build test results (aggregator's job)
///
/// **Wire contract (stdin):**
/// `"<time_limit_ms> <memory_limit_mb>\n"` when the profile asks for the
/// limits header, then the raw test input. The verdict side-channel file path
/// is passed in `SANDBOX_VERDICT_FILE`.
use async_trait::async_trait;
use codesandbox_common::{Config, HarnessProfile, Submission, TestCase};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::{fs, time};
use tracing::{debug, error, warn};

pub const VERDICT_FILE_ENV: &str = "SANDBOX_VERDICT_FILE";

const TRUNCATION_NOTICE: &str = "\n[output truncated]";

/// Declared limits of one submission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub time_limit_ms: u64,
    pub memory_limit_mb: f64,
}

impl Limits {
    pub fn for_submission(submission: &Submission) -> Self {
        Self {
            time_limit_ms: submission.time_limit,
            memory_limit_mb: submission.memory_limit,
        }
    }
}

/// How the process ended
#[derive(Debug, Clone, PartialEq)]
pub enum ExitOutcome {
    /// Exit status 0; the output should hold a verdict
    Success,
    /// Non-zero exit or killed by a signal (`code` is `None` then)
    Failed { code: Option<i32> },
    /// The interpreter could not be started
    LaunchFailed(String),
    /// Wall-clock bound hit, process group terminated
    TimedOut { wall_clock_ms: u64 },
}

/// Raw execution output for a single test case
/// Produced by an ExecutionEngine, consumed by the aggregator
#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    /// Carries the verdict block
    pub stdout: String,
    /// Diagnostics only, never searched for a verdict
    pub stderr: String,
    /// Content of the verdict side-channel file, if the harness wrote one
    pub side_channel: Option<String>,
    pub elapsed_ms: u64,
    pub exit: ExitOutcome,
}

impl ExecutionOutput {
    fn without_output(exit: ExitOutcome, elapsed_ms: u64) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            side_channel: None,
            elapsed_ms,
            exit,
        }
    }

    /// stdout followed by stderr, for failure messages
    pub fn diagnostics(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}{}", self.stdout, self.stderr),
        }
    }
}

/// Execution engine trait
///
/// Any implementation must guarantee:
/// 1. Run the composed harness found in `workspace` for one test case
/// 2. Respect the wall-clock bound derived from `limits`
/// 3. Never leave a process behind when it returns
/// 4. Report failures through `ExecutionOutput::exit`, never by panicking
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    fn profile(&self) -> &HarnessProfile;

    async fn execute(&self, workspace: &Path, test: &TestCase, limits: &Limits) -> ExecutionOutput;
}

/// Process knobs shared by every interpreter engine
#[derive(Debug, Clone, Copy)]
pub struct ProcessSettings {
    pub wall_clock_slack: Duration,
    pub kill_grace: Duration,
    pub max_output_bytes: usize,
}

impl ProcessSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            wall_clock_slack: Duration::from_millis(config.wall_clock_slack_ms),
            kill_grace: Duration::from_millis(config.kill_grace_ms),
            max_output_bytes: config.max_output_bytes,
        }
    }
}

/// Engine that runs `interpreter... <entry_file>` as a local subprocess
pub struct InterpreterEngine {
    profile: HarnessProfile,
    settings: ProcessSettings,
}

impl InterpreterEngine {
    pub fn new(profile: HarnessProfile, settings: ProcessSettings) -> Self {
        Self { profile, settings }
    }

    fn stdin_payload(&self, test: &TestCase, limits: &Limits) -> Vec<u8> {
        let mut payload = Vec::with_capacity(test.input_output.len() + 32);
        if self.profile.limits_header {
            payload.extend_from_slice(
                format!("{} {}\n", limits.time_limit_ms, limits.memory_limit_mb).as_bytes(),
            );
        }
        payload.extend_from_slice(test.input_output.as_bytes());
        payload
    }

    fn command(&self, workspace: &Path, verdict_path: &Path) -> Command {
        let (bin, args) = match self.profile.interpreter.split_first() {
            Some((bin, args)) => (bin.as_str(), args),
            None => ("", &[][..]),
        };

        let mut cmd = Command::new(bin);
        cmd.args(args)
            .arg(workspace.join(&self.profile.entry_file))
            .current_dir(workspace)
            .env(VERDICT_FILE_ENV, verdict_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // own process group, so a timeout takes down everything it forked
        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

/// Side-channel file for one test case; test ids are unique per submission,
/// so concurrent cases never share it
pub fn verdict_file_path(workspace: &Path, test_id: u32) -> PathBuf {
    workspace.join(format!("verdict-{}.json", test_id))
}

#[async_trait]
impl ExecutionEngine for InterpreterEngine {
    fn profile(&self) -> &HarnessProfile {
        &self.profile
    }

    async fn execute(&self, workspace: &Path, test: &TestCase, limits: &Limits) -> ExecutionOutput {
        let verdict_path = verdict_file_path(workspace, test.test_id);
        let _ = fs::remove_file(&verdict_path).await;

        let wall_clock = Duration::from_millis(limits.time_limit_ms) + self.settings.wall_clock_slack;
        let payload = self.stdin_payload(test, limits);
        let started = Instant::now();

        let mut child = match self.command(workspace, &verdict_path).spawn() {
            Ok(child) => child,
            Err(err) => {
                error!(
                    test_id = test.test_id,
                    language = %self.profile.name,
                    %err,
                    "failed to launch interpreter"
                );
                let message = format!(
                    "failed to launch {:?}: {}",
                    self.profile.interpreter.join(" "),
                    err
                );
                return ExecutionOutput::without_output(ExitOutcome::LaunchFailed(message), 0);
            }
        };

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let max_output = self.settings.max_output_bytes;

        // captures outlive the run future, so a timeout keeps what was read
        let mut stdout_capture = Capture::default();
        let mut stderr_capture = Capture::default();

        let run = async {
            tokio::join!(
                write_input(stdin, &payload),
                capture(stdout, max_output, &mut stdout_capture),
                capture(stderr, max_output, &mut stderr_capture),
                child.wait(),
            )
        };
        let finished = time::timeout(wall_clock, run).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (written, stdout_read, stderr_read, status) = match finished {
            Ok(parts) => parts,
            Err(_) => {
                let wall_clock_ms = wall_clock.as_millis() as u64;
                warn!(
                    test_id = test.test_id,
                    wall_clock_ms, "test case exceeded wall-clock limit, terminating"
                );
                terminate(&mut child, self.settings.kill_grace).await;
                return ExecutionOutput {
                    stdout: stdout_capture.into_text(),
                    stderr: stderr_capture.into_text(),
                    side_channel: None,
                    elapsed_ms,
                    exit: ExitOutcome::TimedOut { wall_clock_ms },
                };
            }
        };

        if let Err(err) = written {
            warn!(test_id = test.test_id, %err, "failed to write test input");
        }
        for read in [stdout_read, stderr_read] {
            if let Err(err) = read {
                warn!(test_id = test.test_id, %err, "failed to read process output");
            }
        }

        let stdout = stdout_capture.into_text();
        let stderr = stderr_capture.into_text();
        let exit = match status {
            Ok(status) if status.success() => ExitOutcome::Success,
            Ok(status) => ExitOutcome::Failed {
                code: status.code(),
            },
            Err(err) => ExitOutcome::LaunchFailed(format!("failed to wait for process: {}", err)),
        };
        let side_channel = fs::read_to_string(&verdict_path).await.ok();

        debug!(
            test_id = test.test_id,
            elapsed_ms,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            side_channel = side_channel.is_some(),
            ?exit,
            "process finished"
        );

        ExecutionOutput {
            stdout,
            stderr,
            side_channel,
            elapsed_ms,
            exit,
        }
    }
}

async fn write_input(stdin: Option<ChildStdin>, payload: &[u8]) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(payload).await {
        // the harness may stop reading early
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
    // stdin dropped here: EOF for the harness
}

/// Bytes kept from one output stream
#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Capture {
    fn into_text(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            text.push_str(TRUNCATION_NOTICE);
        }
        text
    }
}

/// Keep at most `limit` bytes in `sink` and drain the rest, so the child
/// never blocks on a full pipe
async fn capture<R>(reader: Option<R>, limit: usize, sink: &mut Capture) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        let keep = n.min(limit.saturating_sub(sink.bytes.len()));
        sink.bytes.extend_from_slice(&chunk[..keep]);
        if keep < n {
            sink.truncated = true;
        }
    }
}

/// Terminate a timed-out child and everything in its process group
///
/// SIGTERM first, SIGKILL once `grace` has passed, then reap. Every wait is
/// bounded by `grace`, so this never blocks the caller indefinitely.
pub async fn terminate(child: &mut Child, grace: Duration) {
    signal_group(child, grace).await;

    let _ = child.start_kill();
    if time::timeout(grace, child.wait()).await.is_err() {
        error!("process did not exit after SIGKILL");
    }
}

#[cfg(unix)]
async fn signal_group(child: &mut Child, grace: Duration) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    let group = Pid::from_raw(pid as i32);
    let _ = killpg(group, Signal::SIGTERM);
    if time::timeout(grace, child.wait()).await.is_err() {
        debug!(pid, "process ignored SIGTERM");
    }
    // stragglers forked by the harness share the group
    let _ = killpg(group, Signal::SIGKILL);
}

#[cfg(not(unix))]
async fn signal_group(_child: &mut Child, _grace: Duration) {}
