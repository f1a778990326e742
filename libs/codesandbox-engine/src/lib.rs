//! Execution pipeline of the judging backend.
//!
//! A submission flows through [`workspace`] → [`harness`] → [`runner`] (once
//! per test case) → [`demux`] → [`aggregator`], driven by the
//! [`orchestrator`] with engines resolved from the [`registry`].

pub mod aggregator;
pub mod demux;
pub mod harness;
pub mod orchestrator;
pub mod registry;
pub mod runner;
pub mod workspace;

pub use orchestrator::Orchestrator;
pub use registry::RunnerRegistry;
pub use runner::{ExecutionEngine, ExecutionOutput, ExitOutcome, InterpreterEngine, Limits};
pub use workspace::Workspace;
