//! Runner registry
//!
//! Immutable mapping from language name to execution engine, assembled once at
//! startup and shared behind an `Arc`.

use codesandbox_common::{Config, HarnessProfile, JudgeError, LanguagesFile};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::runner::{ExecutionEngine, InterpreterEngine, ProcessSettings};

pub struct RunnerRegistry {
    engines: HashMap<String, Arc<dyn ExecutionEngine>>,
}

impl RunnerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Built-in Python profile plus every entry of the languages table.
    /// A table entry named `python` replaces the built-in one.
    pub fn with_defaults(config: &Config) -> Result<Self, JudgeError> {
        let settings = ProcessSettings::from_config(config);
        let table = LanguagesFile::load(&config.languages_path)?;

        let mut builder = Self::builder()
            .register_profile(HarnessProfile::python(&config.python_bin), settings);
        for profile in table.languages {
            builder = builder.register_profile(profile, settings);
        }

        let registry = builder.build();
        info!(languages = ?registry.languages(), "runner registry ready");
        Ok(registry)
    }

    pub fn resolve(&self, language: &str) -> Result<Arc<dyn ExecutionEngine>, JudgeError> {
        self.engines
            .get(language)
            .cloned()
            .ok_or_else(|| JudgeError::UnsupportedLanguage(language.to_string()))
    }

    pub fn supports(&self, language: &str) -> bool {
        self.engines.contains_key(language)
    }

    /// Registered language names, sorted
    pub fn languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    engines: HashMap<String, Arc<dyn ExecutionEngine>>,
}

impl RegistryBuilder {
    /// Register an engine under its profile name, replacing any previous one
    pub fn register(mut self, engine: Arc<dyn ExecutionEngine>) -> Self {
        self.engines.insert(engine.profile().name.clone(), engine);
        self
    }

    pub fn register_profile(self, profile: HarnessProfile, settings: ProcessSettings) -> Self {
        self.register(Arc::new(InterpreterEngine::new(profile, settings)))
    }

    pub fn build(self) -> RunnerRegistry {
        RunnerRegistry {
            engines: self.engines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config(languages_path: &Path) -> Config {
        Config {
            languages_path: languages_path.to_path_buf(),
            ..Config::default()
        }
    }

    fn profile(name: &str, bin: &str) -> HarnessProfile {
        HarnessProfile {
            name: name.to_string(),
            interpreter: vec![bin.to_string()],
            solution_file: "solution.txt".to_string(),
            entry_file: "main.txt".to_string(),
            support_files: Vec::new(),
            import_line: String::new(),
            invoke_line: String::new(),
            limits_header: false,
        }
    }

    #[test]
    fn test_python_is_always_registered() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RunnerRegistry::with_defaults(&config(&dir.path().join("none.json"))).unwrap();

        assert_eq!(registry.languages(), vec!["python".to_string()]);
        let engine = registry.resolve("python").unwrap();
        assert_eq!(engine.profile().entry_file, "main.py");
    }

    #[test]
    fn test_unknown_language() {
        let registry = RunnerRegistry::builder().build();
        let err = registry.resolve("cobol").err().unwrap();
        assert!(matches!(err, JudgeError::UnsupportedLanguage(ref lang) if lang == "cobol"));
        assert_eq!(err.response_code(), 422);
        assert!(!registry.supports("cobol"));
    }

    #[test]
    fn test_languages_table_extends_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("languages.json");
        let table = LanguagesFile {
            languages: vec![profile("ruby", "ruby"), profile("python", "pypy3")],
        };
        table.save(&path).unwrap();

        let registry = RunnerRegistry::with_defaults(&config(&path)).unwrap();
        assert_eq!(
            registry.languages(),
            vec!["python".to_string(), "ruby".to_string()]
        );
        let python = registry.resolve("python").unwrap();
        assert_eq!(python.profile().interpreter, vec!["pypy3".to_string()]);
    }

    #[test]
    fn test_invalid_table_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("languages.json");
        std::fs::write(&path, "{\"languages\": [{\"name\": \"x\"}]}").unwrap();

        let err = RunnerRegistry::with_defaults(&config(&path)).err().unwrap();
        assert!(matches!(err, JudgeError::LanguageTable { .. }));
    }
}
