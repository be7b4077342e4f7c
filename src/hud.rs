//! Wrappers around the `hud` CLI and the library update flow.
//!
//! Values come from the process environment after `.env` has been exported
//! into it (existing variables win).

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ExecError;
use crate::exec::git::redact;

/// Frontend ports forwarded into `hud dev --docker`.
pub const FRONTEND_PORT_VARS: [&str; 3] = [
    "LINEAR_FRONTEND_PORT",
    "GITHUB_FRONTEND_PORT",
    "SENTRY_FRONTEND_PORT",
];

/// Build secrets passed by reference, never baked into image layers.
const SECRET_VARS: [&str; 2] = ["LIB_GITHUB_PAT", "SOURCE_GITHUB_PAT"];

const LIB_ORG_URL: &str = "https://github.com/hud-evals/";

const LIB_PACKAGE: &str = "hud-sdlc-lib";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HudCommand {
    Build,
    Deploy,
}

impl HudCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            HudCommand::Build => "build",
            HudCommand::Deploy => "deploy",
        }
    }
}

/// Starts a program with inherited stdio and reports its exit code.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, argv: &[String]) -> Result<i32, ExecError>;
}

/// [`Launcher`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, argv: &[String]) -> Result<i32, ExecError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(ExecError::UnsafeInput("empty command line".to_string()));
        };
        let command = redact(&argv.join(" "));
        tracing::debug!(%command, "Launching");
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|source| ExecError::Spawn { command, source })?;
        Ok(status.code().unwrap_or(1))
    }
}

fn set(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.is_empty())
}

/// `hud <build|deploy> .` with secrets, build args, naming, and passthrough args.
pub fn build_cmd(
    command: HudCommand,
    lookup: &dyn Fn(&str) -> Option<String>,
    passthrough: &[String],
) -> Vec<String> {
    let mut cmd = vec!["hud".to_string(), command.as_str().to_string(), ".".to_string()];

    for var in SECRET_VARS {
        if set(lookup, var).is_some() {
            cmd.push("--secret".to_string());
            cmd.push(format!("id={var},env={var}"));
        }
    }

    let folder = set(lookup, "FOLDER_NAME").unwrap_or_else(|| "workspace".to_string());
    cmd.push("--build-arg".to_string());
    cmd.push(format!("FOLDER_NAME={folder}"));

    if let Some(env_name) = set(lookup, "ENV_NAME") {
        cmd.push(match command {
            HudCommand::Deploy => "--name".to_string(),
            HudCommand::Build => "--tag".to_string(),
        });
        cmd.push(env_name);
    }

    cmd.extend(passthrough.iter().cloned());
    cmd
}

/// `hud dev . --docker` with each configured frontend port published.
pub fn dev_cmd(lookup: &dyn Fn(&str) -> Option<String>, passthrough: &[String]) -> Vec<String> {
    let mut cmd: Vec<String> = ["hud", "dev", ".", "--docker"].map(String::from).to_vec();
    for var in FRONTEND_PORT_VARS {
        if let Some(port) = set(lookup, var) {
            cmd.extend([
                "-p".to_string(),
                format!("{port}:{port}"),
                "-e".to_string(),
                format!("{var}={port}"),
            ]);
        }
    }
    cmd.extend(passthrough.iter().cloned());
    cmd
}

fn rewrite_section(pat: &str) -> String {
    format!("url.https://{pat}@github.com/hud-evals/")
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

/// Upgrade the library pin and sync. With `pat`, a global git `insteadOf`
/// rewrite is installed first and always removed afterwards.
pub async fn update_lib(launcher: &dyn Launcher, pat: Option<&str>) -> Result<i32, ExecError> {
    let pat = pat.filter(|p| !p.is_empty());
    if let Some(pat) = pat {
        let key = format!("{}.insteadOf", rewrite_section(pat));
        let code = launcher
            .launch(&argv(&["git", "config", "--global", &key, LIB_ORG_URL]))
            .await?;
        if code != 0 {
            return Err(ExecError::NonZeroExit {
                command: "git config --global url.<token>.insteadOf".to_string(),
                code,
                stderr: String::new(),
            });
        }
    }

    let result: Result<i32, ExecError> = async {
        let code = launcher
            .launch(&argv(&["uv", "lock", "--upgrade-package", LIB_PACKAGE]))
            .await?;
        if code != 0 {
            return Ok(code);
        }
        launcher.launch(&argv(&["uv", "sync"])).await
    }
    .await;

    if let Some(pat) = pat {
        let section = rewrite_section(pat);
        let teardown = argv(&["git", "config", "--global", "--remove-section", &section]);
        if let Err(err) = launcher.launch(&teardown).await {
            tracing::warn!(error = %err, "Failed to remove git credential rewrite");
        }
    }
    result
}

/// `update`, then `hud build` when it succeeded.
pub async fn build(
    launcher: &dyn Launcher,
    lookup: &dyn Fn(&str) -> Option<String>,
    passthrough: &[String],
) -> Result<i32, ExecError> {
    let pat = set(lookup, "LIB_GITHUB_PAT");
    let code = update_lib(launcher, pat.as_deref()).await?;
    if code != 0 {
        tracing::error!(code, "Library update failed, not building");
        return Ok(code);
    }
    launcher
        .launch(&build_cmd(HudCommand::Build, lookup, passthrough))
        .await
}
