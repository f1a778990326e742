use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::JudgeError;

/// How one language is wired into the harness protocol
///
/// The composed entry file is `import_line`, the judge template, then
/// `invoke_line`, and is run as `interpreter... <entry_file>` from inside the
/// workspace. Support files are paths relative to the harness root and land in
/// the workspace under their file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessProfile {
    pub name: String,
    pub interpreter: Vec<String>,
    pub solution_file: String,
    pub entry_file: String,
    #[serde(default)]
    pub support_files: Vec<String>,
    #[serde(default)]
    pub import_line: String,
    #[serde(default)]
    pub invoke_line: String,
    /// Whether stdin starts with a `"<time_limit> <memory_limit>"` line
    #[serde(default = "default_limits_header")]
    pub limits_header: bool,
}

fn default_limits_header() -> bool {
    true
}

impl HarnessProfile {
    /// Built-in Python profile backed by `harness/python/runner.py`
    pub fn python(python_bin: &str) -> Self {
        Self {
            name: "python".to_string(),
            interpreter: vec![python_bin.to_string(), "-u".to_string()],
            solution_file: "solution_code.py".to_string(),
            entry_file: "main.py".to_string(),
            support_files: vec!["python/runner.py".to_string()],
            import_line: "from runner import BaseRunner".to_string(),
            invoke_line: "Runner().run()".to_string(),
            limits_header: true,
        }
    }

    /// Profile sanity checks: an interpreter is named, no file escapes its
    /// root and no two files land on the same workspace name
    pub fn check(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("language name must not be empty".to_string());
        }
        if self.interpreter.first().map_or(true, |bin| bin.is_empty()) {
            return Err(format!("{}: interpreter must not be empty", self.name));
        }
        for file in [&self.solution_file, &self.entry_file] {
            if !is_plain_file_name(file) {
                return Err(format!("{}: invalid file name {:?}", self.name, file));
            }
        }
        if self.solution_file == self.entry_file {
            return Err(format!(
                "{}: solution and entry files collide on {:?}",
                self.name, self.entry_file
            ));
        }

        let mut landed: HashSet<&str> = [self.solution_file.as_str(), self.entry_file.as_str()]
            .into_iter()
            .collect();
        for file in &self.support_files {
            if file.is_empty() || Path::new(file).is_absolute() || file.split('/').any(|c| c == "..") {
                return Err(format!("{}: invalid support file {:?}", self.name, file));
            }
            let name = Path::new(file)
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| format!("{}: invalid support file {:?}", self.name, file))?;
            if !landed.insert(name) {
                return Err(format!("{}: support file {:?} collides on {:?}", self.name, file, name));
            }
        }
        Ok(())
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\\')
}

/// On-disk languages table, `{ "languages": [...] }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguagesFile {
    pub languages: Vec<HarnessProfile>,
}

impl LanguagesFile {
    /// Load the table; a missing file is an empty table
    pub fn load(path: &Path) -> Result<Self, JudgeError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let table_error = |reason: String| JudgeError::LanguageTable {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| table_error(e.to_string()))?;
        let table: LanguagesFile =
            serde_json::from_str(&content).map_err(|e| table_error(e.to_string()))?;
        for profile in &table.languages {
            profile.check().map_err(table_error)?;
        }
        Ok(table)
    }

    pub fn save(&self, path: &Path) -> Result<(), JudgeError> {
        let write_error = |source| JudgeError::FileWrite {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| JudgeError::LanguageTable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, content).map_err(write_error)
    }

    pub fn get(&self, name: &str) -> Option<&HarnessProfile> {
        self.languages.iter().find(|p| p.name == name)
    }

    /// Insert or replace the profile with the same name
    pub fn upsert(&mut self, profile: HarnessProfile) {
        match self.languages.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => self.languages.push(profile),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<HarnessProfile> {
        let idx = self.languages.iter().position(|p| p.name == name)?;
        Some(self.languages.remove(idx))
    }
}

/// Absolute location of a support file under the harness root
pub fn support_file_source(harness_root: &Path, relative: &str) -> PathBuf {
    harness_root.join(relative)
}
