// CLI command implementations
use anyhow::{bail, Context, Result};
use codesandbox_common::languages::support_file_source;
use codesandbox_common::types::response_code;
use codesandbox_common::{Config, HarnessProfile, LanguagesFile, Submission};
use codesandbox_engine::{Orchestrator, RunnerRegistry};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

fn load_languages(path: &Path) -> Result<LanguagesFile> {
    LanguagesFile::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Judge a submission file and print the response JSON to stdout
pub async fn run_submission(config: Config, submission_path: &Path) -> Result<()> {
    let content = fs::read_to_string(submission_path)
        .with_context(|| format!("Failed to read {}", submission_path.display()))?;
    let submission: Submission = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", submission_path.display()))?;

    let registry = RunnerRegistry::with_defaults(&config).context("Failed to build runner registry")?;
    let orchestrator = Orchestrator::new(Arc::new(registry), Arc::new(config));

    let response = orchestrator.respond(&submission).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to serialize response")?
    );

    if response.code != response_code::OK {
        bail!("judgement failed with code {}: {}", response.code, response.message);
    }

    let passed = response.results.iter().filter(|r| r.is_success).count();
    eprintln!("✅ {} / {} test case(s) passed", passed, response.results.len());
    Ok(())
}

/// Add or replace a language in the languages table
pub fn add_language(config: &Config, profile: HarnessProfile) -> Result<()> {
    println!("🚀 Adding language: {}", profile.name);

    if let Err(reason) = profile.check() {
        bail!("Invalid language profile: {}", reason);
    }

    for relative in &profile.support_files {
        let source = support_file_source(&config.harness_root, relative);
        if !source.is_file() {
            println!("⚠️  Support file {} does not exist yet", source.display());
        }
    }

    let mut table = load_languages(&config.languages_path)?;
    let replaced = table.get(&profile.name).is_some();
    let name = profile.name.clone();
    table.upsert(profile);

    println!("📝 Updating {}...", config.languages_path.display());
    table
        .save(&config.languages_path)
        .with_context(|| format!("Failed to write {}", config.languages_path.display()))?;

    if replaced {
        println!("✅ Language '{}' updated successfully!", name);
    } else {
        println!("✅ Language '{}' added successfully!", name);
    }
    println!("\n📋 Restart the API to pick up the change");
    Ok(())
}

/// Remove a language from the languages table
pub fn remove_language(languages_path: &Path, name: &str, yes: bool) -> Result<()> {
    println!("🗑️  Removing language: {}", name);

    let mut table = load_languages(languages_path)?;
    if table.get(name).is_none() {
        bail!("Language '{}' not found in {}", name, languages_path.display());
    }

    if !yes {
        print!("⚠️  This will remove '{}' from {}\n", name, languages_path.display());
        print!("\nContinue? (y/N): ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("❌ Aborted");
            return Ok(());
        }
    }

    table.remove(name);
    println!("📝 Removing from {}...", languages_path.display());
    table
        .save(languages_path)
        .with_context(|| format!("Failed to write {}", languages_path.display()))?;

    println!("✅ Language '{}' removed successfully!", name);
    Ok(())
}

/// List the built-in language and every entry of the languages table
pub fn list_languages(config: &Config) -> Result<()> {
    let table = load_languages(&config.languages_path)?;

    let mut languages = vec![HarnessProfile::python(&config.python_bin)];
    for profile in table.languages {
        match languages.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => languages.push(profile),
        }
    }

    println!("📋 Available Languages:\n");
    println!(
        "{:<12} {:<28} {:<18} {:<12} {:<30}",
        "Name", "Interpreter", "Solution", "Entry", "Support files"
    );
    println!("{}", "─".repeat(100));

    for lang in &languages {
        println!(
            "{:<12} {:<28} {:<18} {:<12} {:<30}",
            lang.name,
            lang.interpreter.join(" "),
            lang.solution_file,
            lang.entry_file,
            lang.support_files.join(", ")
        );
    }

    println!("\n✅ Total: {} language(s)", languages.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ruby() -> HarnessProfile {
        HarnessProfile {
            name: "ruby".to_string(),
            interpreter: vec!["ruby".to_string()],
            solution_file: "solution.rb".to_string(),
            entry_file: "main.rb".to_string(),
            support_files: vec!["ruby/runner.rb".to_string()],
            import_line: "require_relative 'runner'".to_string(),
            invoke_line: "Runner.new.run".to_string(),
            limits_header: true,
        }
    }

    fn config(dir: &Path) -> Config {
        Config {
            languages_path: dir.join("config/languages.json"),
            harness_root: dir.join("harness"),
            ..Config::default()
        }
    }

    #[test]
    fn test_add_then_remove_language() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        add_language(&config, ruby()).unwrap();
        let table = LanguagesFile::load(&config.languages_path).unwrap();
        assert_eq!(table.get("ruby"), Some(&ruby()));

        // adding again replaces in place
        let mut updated = ruby();
        updated.interpreter = vec!["ruby3".to_string()];
        add_language(&config, updated).unwrap();
        let table = LanguagesFile::load(&config.languages_path).unwrap();
        assert_eq!(table.languages.len(), 1);
        assert_eq!(table.languages[0].interpreter, vec!["ruby3".to_string()]);

        remove_language(&config.languages_path, "ruby", true).unwrap();
        let table = LanguagesFile::load(&config.languages_path).unwrap();
        assert!(table.languages.is_empty());
    }

    #[test]
    fn test_invalid_profile_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut profile = ruby();
        profile.entry_file = "../escape.rb".to_string();

        assert!(add_language(&config, profile).is_err());
        assert!(!config.languages_path.exists());
    }

    #[test]
    fn test_remove_unknown_language() {
        let dir = tempfile::tempdir().unwrap();
        let err = remove_language(&dir.path().join("languages.json"), "cobol", true).unwrap_err();
        assert!(err.to_string().contains("cobol"));
    }

    #[test]
    fn test_list_languages_without_table() {
        let dir = tempfile::tempdir().unwrap();
        list_languages(&config(dir.path())).unwrap();
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_submission() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submission.json");
        fs::write(&path, r#"{"language": "python", "tests": []}"#).unwrap();

        let config = Config {
            workspace_root: dir.path().join("ws"),
            ..config(dir.path())
        };
        let err = run_submission(config, &path).await.unwrap_err();
        assert!(err.to_string().contains("422"));
    }
}
