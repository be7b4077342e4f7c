//! CLI command definitions for sdlc.
//!
//! Every subcommand resolves its inputs (flags, `.env`, process
//! environment), then delegates to the library. Commands return the process
//! exit code so child exit codes propagate unchanged.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::config::{require, DotEnv, DEFAULT_HUD_API_URL};
use crate::exec::{CommandRunner, LocalRunner};
use crate::golden::{generate_golden, GoldenRequest};
use crate::graders::rubric::Judge;
use crate::hud::{self, HudCommand, Launcher, ProcessLauncher};
use crate::llm::providers::OPENROUTER_BASE_URL;
use crate::llm::OpenRouterProvider;
use crate::repos::cloner::resolve_token;
use crate::repos::{ClonerConfig, RepoCloner, RepoManifest, DEFAULT_MANIFEST_PATH, DEFAULT_SOURCE_BASE};
use crate::scaffold::scaffold_task;
use crate::scenario::{self, ScenarioContext};
use crate::sync::{run_sync, HudApiClient, LineConfirm, SyncOptions, SyncOutcome};
use crate::tasks::TaskRegistry;
use crate::validation::validate_tasks;

/// SDLC coding tasks: environment tooling, task authoring, and taskset sync.
#[derive(Parser)]
#[command(name = "sdlc")]
#[command(about = "Author, validate and sync SDLC coding tasks")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run `hud dev --docker` with the frontend ports forwarded.
    Dev(PassthroughArgs),

    /// Update the SDLC library, then run `hud build`.
    Build(PassthroughArgs),

    /// Run `hud deploy`.
    Deploy(PassthroughArgs),

    /// Update the SDLC library to its latest commit.
    Update,

    /// Run scenario setup for a task locally and print its prompt.
    Setup(SetupArgs),

    /// Scaffold a new task under src/tasks/<name>/.
    NewTask(NewTaskArgs),

    /// Sync local tasks to a HUD taskset.
    SyncTasks(SyncTasksArgs),

    /// Write a task's golden.patch from a GitHub branch comparison.
    GenerateGolden(GenerateGoldenArgs),

    /// Check that tasks fail on baseline and pass with their golden patch.
    Validate(ValidateArgs),

    /// Clone or refresh the source repositories listed in the manifest.
    CloneRepos(CloneReposArgs),
}

/// Arguments forwarded verbatim to the wrapped command.
#[derive(Parser, Debug, Default)]
pub struct PassthroughArgs {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct SetupArgs {
    /// Task name.
    pub task: String,
}

#[derive(Parser, Debug)]
pub struct NewTaskArgs {
    /// Task name in snake_case (e.g. 'fix_auth_bug').
    pub name: String,

    /// Project root containing src/tasks/.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Parser, Debug)]
pub struct SyncTasksArgs {
    /// Taskset name or ID (falls back to TASKSET_NAME in .env).
    #[arg(long)]
    pub taskset: Option<String>,

    /// Environment name (falls back to ENV_NAME).
    #[arg(long)]
    pub env: Option<String>,

    /// Sync only this task.
    #[arg(long)]
    pub task: Option<String>,

    /// Exclude tasks by name (repeatable).
    #[arg(long = "exclude-task", num_args = 1..)]
    pub exclude_task: Vec<String>,

    #[arg(long, env = "HUD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "HUD_API_URL", default_value = DEFAULT_HUD_API_URL)]
    pub api_url: String,
}

#[derive(Parser, Debug)]
pub struct GenerateGoldenArgs {
    /// Task name (writes to src/tasks/<task_name>/golden.patch).
    pub task_name: String,

    /// GitHub repo URL (e.g. https://github.com/org/repo).
    pub repo_url: String,

    /// Baseline branch name.
    pub base: String,

    /// Golden branch name.
    pub golden: String,

    /// Project root containing src/tasks/.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Validate only tasks whose name contains this string.
    pub task_name: Option<String>,

    /// Grading-model API base URL.
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,
}

#[derive(Parser, Debug)]
pub struct CloneReposArgs {
    /// Repo manifest path.
    #[arg(default_value = DEFAULT_MANIFEST_PATH)]
    pub config: PathBuf,

    /// Directory receiving one checkout per repository.
    #[arg(default_value = DEFAULT_SOURCE_BASE)]
    pub base: PathBuf,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the parsed command and return the process exit code.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Dev(args) => {
            let dotenv = load_dotenv()?;
            let cmd = hud::dev_cmd(&|key: &str| dotenv.resolve(key), &args.args);
            Ok(ProcessLauncher.launch(&cmd).await?)
        }
        Commands::Build(args) => {
            let dotenv = load_dotenv()?;
            Ok(hud::build(&ProcessLauncher, &|key: &str| dotenv.resolve(key), &args.args).await?)
        }
        Commands::Deploy(args) => {
            let dotenv = load_dotenv()?;
            let cmd = hud::build_cmd(HudCommand::Deploy, &|key: &str| dotenv.resolve(key), &args.args);
            Ok(ProcessLauncher.launch(&cmd).await?)
        }
        Commands::Update => {
            let dotenv = load_dotenv()?;
            let pat = dotenv.resolve("LIB_GITHUB_PAT");
            Ok(hud::update_lib(&ProcessLauncher, pat.as_deref()).await?)
        }
        Commands::Setup(args) => run_setup_command(args).await,
        Commands::NewTask(args) => run_new_task_command(args),
        Commands::SyncTasks(args) => Ok(run_sync_tasks_command(args).await),
        Commands::GenerateGolden(args) => run_generate_golden_command(args).await,
        Commands::Validate(args) => run_validate_command(args).await,
        Commands::CloneRepos(args) => run_clone_repos_command(args).await,
    }
}

/// Load `.env` from the working directory into the process environment.
fn load_dotenv() -> anyhow::Result<DotEnv> {
    let dotenv = DotEnv::load(Path::new("."))?;
    dotenv.export();
    Ok(dotenv)
}

fn local_runner() -> Arc<dyn CommandRunner> {
    Arc::new(LocalRunner)
}

async fn run_setup_command(args: SetupArgs) -> anyhow::Result<i32> {
    let registry = TaskRegistry::builtin();
    let task = registry.get(&args.task).with_context(|| {
        format!(
            "Task '{}' not found. Available: {}",
            args.task,
            registry.names().join(", ")
        )
    })?;
    let prepared = scenario::setup(task, ScenarioContext::new(local_runner())).await?;
    println!("{}", prepared.prompt());
    Ok(0)
}

fn run_new_task_command(args: NewTaskArgs) -> anyhow::Result<i32> {
    let scaffolded = scaffold_task(&args.root, &args.name)?;
    for line in scaffolded.summary() {
        println!("{line}");
    }
    Ok(0)
}

/// Any failure is reported as `sync-tasks failed: <msg>` with exit code 1.
async fn run_sync_tasks_command(args: SyncTasksArgs) -> i32 {
    match sync_tasks(args).await {
        Ok(code) => code,
        Err(err) => {
            println!("sync-tasks failed: {err:#}");
            1
        }
    }
}

async fn sync_tasks(args: SyncTasksArgs) -> anyhow::Result<i32> {
    let dotenv = load_dotenv()?;
    let api_key = require(args.api_key, "HUD_API_KEY", "Set it in the environment or .env.")?;
    let taskset = require(
        args.taskset.or_else(|| dotenv.get("TASKSET_NAME").map(str::to_string)),
        "Taskset",
        "Pass --taskset or set TASKSET_NAME in .env.",
    )?;
    let env_name = require(
        args.env
            .or_else(|| dotenv.get("ENV_NAME").map(str::to_string))
            .or_else(|| std::env::var("ENV_NAME").ok()),
        "Environment name",
        "Pass --env or set ENV_NAME in .env.",
    )?;

    let client = HudApiClient::new(&args.api_url, api_key)?;
    let options = SyncOptions {
        taskset,
        env_name,
        task: args.task,
        exclude: args.exclude_task,
    };
    let mut out = std::io::stdout();
    let mut confirm = LineConfirm::new(std::io::stdin().lock());
    let outcome = run_sync(&client, &TaskRegistry::builtin(), &options, &mut out, &mut confirm).await?;
    out.flush()?;

    Ok(match outcome {
        SyncOutcome::Aborted { interrupted: true } => 1,
        _ => 0,
    })
}

async fn run_generate_golden_command(args: GenerateGoldenArgs) -> anyhow::Result<i32> {
    let dotenv = DotEnv::load(&args.root)?;
    let request = GoldenRequest {
        task_dir: args.root.join("src").join("tasks").join(&args.task_name),
        repo_url: args.repo_url,
        base: args.base,
        golden: args.golden,
        token: dotenv.resolve("SOURCE_GITHUB_PAT"),
    };
    let path = generate_golden(&request).await?;
    println!("Wrote {}", path.display());
    Ok(0)
}

async fn run_validate_command(args: ValidateArgs) -> anyhow::Result<i32> {
    let judge = match args.openrouter_api_key.filter(|k| !k.is_empty()) {
        Some(key) => {
            let base_url = args.url.as_deref().unwrap_or(OPENROUTER_BASE_URL);
            let provider = OpenRouterProvider::with_base_url(key, base_url)?;
            info!(base_url = provider.base_url(), "Using grading model");
            Some(Judge::new(Arc::new(provider)))
        }
        None => {
            tracing::warn!("OPENROUTER_API_KEY not set, rubric checks will score 0");
            None
        }
    };

    let runner = local_runner();
    let make_ctx = || ScenarioContext::new(Arc::clone(&runner)).with_judge(judge.clone());
    let mut out = std::io::stdout();
    let results = validate_tasks(
        &TaskRegistry::builtin(),
        args.task_name.as_deref(),
        &make_ctx,
        &mut out,
    )
    .await?;
    Ok(if results.iter().all(|r| r.is_valid()) { 0 } else { 1 })
}

async fn run_clone_repos_command(args: CloneReposArgs) -> anyhow::Result<i32> {
    let manifest = RepoManifest::load(&args.config)?;
    let cloner = RepoCloner::new(ClonerConfig::new(&args.base).with_token(resolve_token()));
    cloner.clone_all(&manifest).await?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_tasks_flags() {
        let cli = Cli::try_parse_from([
            "sdlc",
            "sync-tasks",
            "--taskset",
            "coding",
            "--env",
            "sdlc-env",
            "--exclude-task",
            "basic",
            "webhook_bug",
            "--api-key",
            "k",
        ])
        .expect("should parse");
        match cli.command {
            Commands::SyncTasks(args) => {
                assert_eq!(args.taskset.as_deref(), Some("coding"));
                assert_eq!(args.env.as_deref(), Some("sdlc-env"));
                assert_eq!(args.exclude_task, vec!["basic", "webhook_bug"]);
                assert!(args.task.is_none());
            }
            _ => panic!("Expected SyncTasks command"),
        }
    }

    #[test]
    fn test_clone_repos_defaults() {
        let cli = Cli::try_parse_from(["sdlc", "clone-repos"]).expect("should parse");
        match cli.command {
            Commands::CloneRepos(args) => {
                assert_eq!(args.config, PathBuf::from(DEFAULT_MANIFEST_PATH));
                assert_eq!(args.base, PathBuf::from(DEFAULT_SOURCE_BASE));
            }
            _ => panic!("Expected CloneRepos command"),
        }
    }

    #[test]
    fn test_passthrough_args_keep_flags() {
        let cli = Cli::try_parse_from(["sdlc", "deploy", "--verbose", "-x"]).expect("should parse");
        match cli.command {
            Commands::Deploy(args) => assert_eq!(args.args, vec!["--verbose", "-x"]),
            _ => panic!("Expected Deploy command"),
        }
    }

    #[test]
    fn test_global_log_level() {
        let cli = Cli::try_parse_from(["sdlc", "validate", "basic", "--url", "http://proxy", "-l", "debug"])
            .expect("should parse");
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Validate(args) => {
                assert_eq!(args.task_name.as_deref(), Some("basic"));
                assert_eq!(args.url.as_deref(), Some("http://proxy"));
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_generate_golden_positionals() {
        let cli = Cli::try_parse_from([
            "sdlc",
            "generate-golden",
            "basic",
            "https://github.com/hud-evals/coding-template-sample",
            "server_fix_baseline",
            "server_fix_golden",
        ])
        .expect("should parse");
        assert!(matches!(cli.command, Commands::GenerateGolden(ref a) if a.golden == "server_fix_golden"));
    }

    #[test]
    fn test_new_task_invalid_name_fails() {
        let root = tempfile::tempdir().unwrap();
        let args = NewTaskArgs {
            name: "Bad".into(),
            root: root.path().to_path_buf(),
        };
        assert!(run_new_task_command(args).is_err());
    }
}
