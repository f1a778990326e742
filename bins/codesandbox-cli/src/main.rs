mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codesandbox-cli")]
#[command(about = "Code sandbox CLI - Judge submissions locally and manage harness languages", long_about = None)]
struct Cli {
    /// Languages table (defaults to LANGUAGE_CONFIG_PATH or config/languages.json)
    #[arg(long, global = true)]
    languages: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge a submission JSON file and print the response
    Run {
        /// Path to the submission JSON
        #[arg(short, long)]
        submission: PathBuf,

        /// Run up to N test cases at once
        #[arg(short, long)]
        parallel: Option<usize>,

        /// Keep the workspace after judging
        #[arg(long)]
        keep_workspace: bool,
    },

    /// Add or replace a harness language in the languages table
    AddLang {
        /// Language name as sent in submissions (e.g., ruby, node)
        #[arg(short, long)]
        name: String,

        /// Interpreter command, repeat for extra arguments (e.g., -i node -i --no-warnings)
        #[arg(short, long, required = true)]
        interpreter: Vec<String>,

        /// File the solution code is written to
        #[arg(long)]
        solution_file: String,

        /// Composed entry file passed to the interpreter
        #[arg(long)]
        entry_file: String,

        /// Harness runtime file, relative to the harness root (repeatable)
        #[arg(long)]
        support_file: Vec<String>,

        /// Line placed before the judge template
        #[arg(long, default_value = "")]
        import_line: String,

        /// Line placed after the judge template
        #[arg(long, default_value = "")]
        invoke_line: String,

        /// Do not send the "<time_limit> <memory_limit>" header on stdin
        #[arg(long)]
        no_limits_header: bool,
    },

    /// Remove a harness language from the languages table
    RemoveLang {
        /// Language name to remove
        #[arg(short, long)]
        name: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List all available languages
    ListLangs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = codesandbox_common::Config::from_env();
    if let Some(path) = cli.languages {
        config.languages_path = path;
    }

    match cli.command {
        Commands::Run {
            submission,
            parallel,
            keep_workspace,
        } => {
            if let Some(parallel) = parallel {
                config.max_parallel_tests = parallel.max(1);
            }
            config.keep_workspaces |= keep_workspace;
            commands::run_submission(config, &submission).await?;
        }
        Commands::AddLang {
            name,
            interpreter,
            solution_file,
            entry_file,
            support_file,
            import_line,
            invoke_line,
            no_limits_header,
        } => {
            let profile = codesandbox_common::HarnessProfile {
                name,
                interpreter,
                solution_file,
                entry_file,
                support_files: support_file,
                import_line,
                invoke_line,
                limits_header: !no_limits_header,
            };
            commands::add_language(&config, profile)?;
        }
        Commands::RemoveLang { name, yes } => {
            commands::remove_language(&config.languages_path, &name, yes)?;
        }
        Commands::ListLangs => {
            commands::list_languages(&config)?;
        }
    }

    Ok(())
}
