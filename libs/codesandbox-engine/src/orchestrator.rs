/// Execution Orchestrator
///
/// Drives one submission through the pipeline:
/// `Created → WorkspaceReady → HarnessComposed → Running → Aggregated`,
/// ending in `Completed` or, when a stage before `Running` fails,
/// `FatalAborted`. Failures inside a test case never abort the submission;
/// they become that case's result.
use codesandbox_common::{
    Config, FailurePolicy, JudgeError, JudgingResponse, Submission, TestResult,
};
use futures_util::{pin_mut, stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::aggregator::Aggregator;
use crate::harness;
use crate::registry::RunnerRegistry;
use crate::runner::{ExecutionEngine, Limits};
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Created,
    WorkspaceReady,
    HarnessComposed,
    Running,
    Aggregated,
    Completed,
    FatalAborted,
}

fn enter(stage: Stage) {
    debug!(?stage, "pipeline stage");
}

#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<RunnerRegistry>,
    config: Arc<Config>,
}

impl Orchestrator {
    pub fn new(registry: Arc<RunnerRegistry>, config: Arc<Config>) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &RunnerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Judge a submission, one result per test case in submission order
    pub async fn judge(&self, submission: &Submission) -> Result<Vec<TestResult>, JudgeError> {
        let span = info_span!(
            "judge",
            question_id = submission.question_id,
            user_id = %submission.user_id,
            language = %submission.language,
        );

        async {
            let started = Instant::now();
            let outcome = self.run_pipeline(submission).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match &outcome {
                Ok(results) => {
                    enter(Stage::Completed);
                    info!(tests = results.len(), elapsed_ms, "submission judged");
                }
                Err(err) => {
                    enter(Stage::FatalAborted);
                    warn!(stage = err.stage(), %err, elapsed_ms, "submission aborted");
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Judge a submission and map the outcome onto the response envelope
    pub async fn respond(&self, submission: &Submission) -> JudgingResponse {
        match self.judge(submission).await {
            Ok(results) => JudgingResponse::completed(results),
            Err(err) => err.into(),
        }
    }

    async fn run_pipeline(&self, submission: &Submission) -> Result<Vec<TestResult>, JudgeError> {
        enter(Stage::Created);
        submission.check()?;
        let engine = self.registry.resolve(&submission.language)?;

        // dropped at the end of this call, removing the directory
        let workspace = Workspace::create(&self.config, submission).await?;
        enter(Stage::WorkspaceReady);

        harness::compose(
            &workspace,
            engine.profile(),
            &self.config.harness_root,
            submission,
        )
        .await?;
        enter(Stage::HarnessComposed);

        enter(Stage::Running);
        let results = self.run_tests(engine.as_ref(), &workspace, submission).await;
        enter(Stage::Aggregated);

        Ok(results)
    }

    async fn run_tests(
        &self,
        engine: &dyn ExecutionEngine,
        workspace: &Workspace,
        submission: &Submission,
    ) -> Vec<TestResult> {
        let limits = Limits::for_submission(submission);
        let parallel = self.config.max_parallel_tests.max(1);
        let dir = workspace.path();

        info!(
            tests = submission.tests.len(),
            parallel,
            time_limit_ms = limits.time_limit_ms,
            "running test cases"
        );

        // `buffered` yields in input order, whatever order the runs finish in
        let runs = stream::iter(submission.tests.iter())
            .map(|test| async move { (test, engine.execute(dir, test, &limits).await) })
            .buffered(parallel);
        pin_mut!(runs);

        let mut aggregator = Aggregator::new(submission.tests.len());
        while let Some((test, execution)) = runs.next().await {
            let result = aggregator.push(test, execution);
            if self.config.failure_policy == FailurePolicy::Abort
                && (result.is_harness_failure() || result.is_timeout())
            {
                warn!(
                    test_id = result.test_id,
                    status = result.status,
                    "aborting remaining test cases"
                );
                break;
            }
        }

        let (results, _summary) = aggregator.finish();
        results
    }
}
