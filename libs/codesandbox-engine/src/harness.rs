//! Harness Composer
//!
//! Materializes the three kinds of files a test run needs inside the
//! workspace: the candidate's solution, the composed entry file and the
//! harness runtime support files copied from the installation root.

use codesandbox_common::languages::support_file_source;
use codesandbox_common::{HarnessProfile, JudgeError, Submission};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::workspace::Workspace;

/// Paths of the files written for one submission
#[derive(Debug, Clone)]
pub struct ComposedHarness {
    pub solution_path: PathBuf,
    pub entry_path: PathBuf,
    pub support_paths: Vec<PathBuf>,
}

/// Entry file content: import line, template body verbatim, invocation line
pub fn compose_entry(profile: &HarnessProfile, judge_template: &str) -> String {
    format!(
        "{}\n{}\n{}",
        profile.import_line, judge_template, profile.invoke_line
    )
}

pub async fn compose(
    workspace: &Workspace,
    profile: &HarnessProfile,
    harness_root: &Path,
    submission: &Submission,
) -> Result<ComposedHarness, JudgeError> {
    let solution_path = workspace.join(&profile.solution_file);
    write_file(&solution_path, submission.solution_code.as_bytes()).await?;

    let entry_path = workspace.join(&profile.entry_file);
    let entry = compose_entry(profile, &submission.judge_template);
    write_file(&entry_path, entry.as_bytes()).await?;

    let mut support_paths = Vec::with_capacity(profile.support_files.len());
    for relative in &profile.support_files {
        let source = support_file_source(harness_root, relative);
        let content = fs::read(&source)
            .await
            .map_err(|source_err| JudgeError::FileWrite {
                path: source.clone(),
                source: source_err,
            })?;

        let file_name = Path::new(relative)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(relative));
        let target = workspace.join(file_name);
        write_file(&target, &content).await?;
        support_paths.push(target);
    }

    debug!(
        workspace = %workspace.path().display(),
        language = %profile.name,
        support_files = support_paths.len(),
        "harness composed"
    );

    Ok(ComposedHarness {
        solution_path,
        entry_path,
        support_paths,
    })
}

async fn write_file(path: &Path, content: &[u8]) -> Result<(), JudgeError> {
    fs::write(path, content)
        .await
        .map_err(|source| JudgeError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesandbox_common::{Config, TestCase};

    fn submission() -> Submission {
        Submission {
            language: "python".to_string(),
            question_id: 1,
            judge_template: "class Runner(BaseRunner):\n    pass".to_string(),
            solution_code: "def solution():\n    return 1\n".to_string(),
            tests: vec![TestCase {
                test_id: 1,
                input_output: String::new(),
            }],
            time_limit: 1000,
            memory_limit: 64.0,
            user_id: "u".to_string(),
        }
    }

    async fn workspace(root: &Path) -> Workspace {
        let config = Config {
            workspace_root: root.to_path_buf(),
            unique_workspaces: false,
            ..Config::default()
        };
        Workspace::create(&config, &submission()).await.unwrap()
    }

    #[test]
    fn test_compose_entry_layout() {
        let profile = HarnessProfile::python("python3");
        let entry = compose_entry(&profile, "class Runner(BaseRunner):\n    pass");
        assert_eq!(
            entry,
            "from runner import BaseRunner\nclass Runner(BaseRunner):\n    pass\nRunner().run()"
        );
    }

    #[tokio::test]
    async fn test_compose_writes_all_files() {
        let root = tempfile::tempdir().unwrap();
        let harness_root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(harness_root.path().join("python")).unwrap();
        std::fs::write(harness_root.path().join("python/runner.py"), b"# runtime\x00\xff").unwrap();

        let ws = workspace(root.path()).await;
        let profile = HarnessProfile::python("python3");
        let composed = compose(&ws, &profile, harness_root.path(), &submission())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&composed.solution_path).unwrap(),
            "def solution():\n    return 1\n"
        );
        assert!(std::fs::read_to_string(&composed.entry_path)
            .unwrap()
            .starts_with("from runner import BaseRunner\n"));
        assert_eq!(composed.support_paths, vec![ws.join("runner.py")]);
        assert_eq!(
            std::fs::read(ws.join("runner.py")).unwrap(),
            b"# runtime\x00\xff".to_vec()
        );
    }

    #[tokio::test]
    async fn test_missing_support_file_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let harness_root = tempfile::tempdir().unwrap();

        let ws = workspace(root.path()).await;
        let profile = HarnessProfile::python("python3");
        let err = compose(&ws, &profile, harness_root.path(), &submission())
            .await
            .unwrap_err();

        match err {
            JudgeError::FileWrite { path, .. } => {
                assert_eq!(path, harness_root.path().join("python/runner.py"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shipped_python_runtime_is_copied() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        let config = Config::default();

        compose(&ws, &HarnessProfile::python("python3"), &config.harness_root, &submission())
            .await
            .unwrap();

        let copied = std::fs::read_to_string(ws.join("runner.py")).unwrap();
        assert!(copied.contains("class BaseRunner"));
        assert!(copied.contains("<SandboxOutput-Start-"));
    }
}
