/// Workspace Manager
///
/// One directory per submission, derived from
/// `<workspace_root>/<question_id>/<user_id>/<language>[-<token>]`.
/// The handle owns the directory: dropping it removes the leaf, then every
/// parent left empty below the root, unless the configuration asks to keep
/// workspaces around for inspection.
use codesandbox_common::{Config, JudgeError, Submission};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::DirBuilder;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    path: PathBuf,
    keep: bool,
}

/// Attempts at creating the directory while a dropping sibling may be
/// removing a shared parent
const CREATE_ATTEMPTS: usize = 3;

impl Workspace {
    /// Create the workspace for a submission
    ///
    /// Creation is idempotent: an existing directory at the derived path is
    /// reused, not treated as an error.
    pub async fn create(config: &Config, submission: &Submission) -> Result<Self, JudgeError> {
        let token = if config.unique_workspaces {
            Some(Uuid::new_v4().simple().to_string())
        } else {
            None
        };
        let path = derive_path(
            &config.workspace_root,
            submission.question_id,
            &submission.user_id,
            &submission.language,
            token.as_deref(),
        );

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);

        let mut attempt = 1;
        loop {
            match builder.create(&path).await {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::NotFound && attempt < CREATE_ATTEMPTS => {
                    debug!(workspace = %path.display(), attempt, "parent vanished, retrying");
                    attempt += 1;
                }
                Err(source) => {
                    return Err(JudgeError::WorkspaceCreation {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }

        debug!(workspace = %path.display(), "workspace ready");

        Ok(Self {
            root: config.workspace_root.clone(),
            path,
            keep: config.keep_workspaces,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(err) = std::fs::remove_dir_all(&self.path) {
            warn!(workspace = %self.path.display(), %err, "failed to remove workspace");
            return;
        }

        // best effort; the first parent still in use stops the walk
        let mut dir = self.path.parent();
        while let Some(parent) = dir {
            if parent == self.root || !parent.starts_with(&self.root) {
                break;
            }
            if std::fs::remove_dir(parent).is_err() {
                break;
            }
            dir = parent.parent();
        }
    }
}

/// Deterministic workspace path for a submission
///
/// `user_id` and `language` come from the request, so every component is
/// reduced to a safe single path segment first.
pub fn derive_path(
    root: &Path,
    question_id: i64,
    user_id: &str,
    language: &str,
    token: Option<&str>,
) -> PathBuf {
    let leaf = match token {
        Some(token) => format!("{}-{}", sanitize_segment(language), token),
        None => sanitize_segment(language),
    };
    root.join(question_id.to_string())
        .join(sanitize_segment(user_id))
        .join(leaf)
}

fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.as_str() {
        "" => "_".to_string(),
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesandbox_common::TestCase;

    fn config(root: &Path) -> Config {
        Config {
            workspace_root: root.to_path_buf(),
            unique_workspaces: false,
            keep_workspaces: false,
            ..Config::default()
        }
    }

    fn submission(user_id: &str, question_id: i64) -> Submission {
        Submission {
            language: "python".to_string(),
            question_id,
            judge_template: "t".to_string(),
            solution_code: "s".to_string(),
            tests: vec![TestCase {
                test_id: 1,
                input_output: String::new(),
            }],
            time_limit: 1000,
            memory_limit: 64.0,
            user_id: user_id.to_string(),
        }
    }

    #[test]
    fn test_path_is_deterministic() {
        let root = Path::new("/tmp/ws");
        let a = derive_path(root, 12, "alice", "python", None);
        let b = derive_path(root, 12, "alice", "python", None);
        assert_eq!(a, b);
        assert_eq!(a, PathBuf::from("/tmp/ws/12/alice/python"));
    }

    #[test]
    fn test_path_components_are_sanitized() {
        let root = Path::new("/tmp/ws");
        let path = derive_path(root, 1, "../../etc", "py/thon", None);
        assert!(path.starts_with(root));
        assert_eq!(path.components().count(), root.components().count() + 3);
        assert_eq!(derive_path(root, 1, "..", "python", None), root.join("1/__/python"));
        assert_eq!(derive_path(root, 1, "", "python", None), root.join("1/_/python"));
    }

    #[test]
    fn test_token_suffix() {
        let path = derive_path(Path::new("/w"), 3, "bob", "python", Some("abc"));
        assert_eq!(path, PathBuf::from("/w/3/bob/python-abc"));
    }

    #[tokio::test]
    async fn test_create_is_idempotent_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path());
        let sub = submission("alice", 5);

        let first = Workspace::create(&config, &sub).await.unwrap();
        let path = first.path().to_path_buf();
        assert!(path.is_dir());

        // same derived path while the first handle is alive
        let second = Workspace::create(&config, &sub).await.unwrap();
        assert_eq!(second.path(), path);

        std::mem::forget(second);
        drop(first);
        assert!(!path.exists());
        assert!(!root.path().join("5").exists());
        assert!(root.path().is_dir());
    }

    #[tokio::test]
    async fn test_shared_parents_survive_live_siblings() {
        let root = tempfile::tempdir().unwrap();
        let config = Config {
            unique_workspaces: true,
            ..config(root.path())
        };
        let sub = submission("gina", 8);

        let a = Workspace::create(&config, &sub).await.unwrap();
        let b = Workspace::create(&config, &sub).await.unwrap();
        let user_dir = a.path().parent().unwrap().to_path_buf();

        drop(a);
        assert!(user_dir.is_dir());
        assert!(b.path().is_dir());

        drop(b);
        assert!(!user_dir.exists());
        assert!(!root.path().join("8").exists());
        assert!(root.path().is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_workspace_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(&config(root.path()), &submission("carol", 9))
            .await
            .unwrap();
        let mode = std::fs::metadata(ws.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[tokio::test]
    async fn test_keep_workspaces() {
        let root = tempfile::tempdir().unwrap();
        let config = Config {
            keep_workspaces: true,
            ..config(root.path())
        };
        let ws = Workspace::create(&config, &submission("dave", 2)).await.unwrap();
        let path = ws.path().to_path_buf();
        drop(ws);
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn test_unique_workspaces_are_disjoint() {
        let root = tempfile::tempdir().unwrap();
        let config = Config {
            unique_workspaces: true,
            ..config(root.path())
        };
        let sub = submission("erin", 4);

        let a = Workspace::create(&config, &sub).await.unwrap();
        let b = Workspace::create(&config, &sub).await.unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(a.path().parent(), b.path().parent());
    }

    #[tokio::test]
    async fn test_creation_failure_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = Workspace::create(&config(&blocker), &submission("frank", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, JudgeError::WorkspaceCreation { .. }));
        assert_eq!(err.response_code(), 500);
    }
}
