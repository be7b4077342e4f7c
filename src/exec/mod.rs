//! Command execution seam.
//!
//! Scenarios, graders and service adapters never spawn processes directly;
//! they go through a [`CommandRunner`] so that runs can be driven by a fake
//! runner in tests. [`LocalRunner`] is the real implementation backed by
//! `tokio::process`.

pub mod git;

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ExecError;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs shell command strings.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` through bash, optionally bounded by `timeout`.
    async fn run(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecError>;

    /// Run `command` and turn a non-zero exit into an error.
    async fn run_checked(&self, command: &str) -> Result<CommandOutput, ExecError> {
        let output = self.run(command, None).await?;
        if !output.success() {
            return Err(ExecError::NonZeroExit {
                command: command.to_string(),
                code: output.exit_code,
                stderr: truncate(output.stderr.trim(), 500),
            });
        }
        Ok(output)
    }
}

/// Runs commands on the local machine with `bash -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRunner;

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecError> {
        tracing::debug!(command = %truncate(command, 200), "Running command");
        let child = Command::new("bash")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child)
                .await
                .map_err(|_| ExecError::Timeout {
                    command: command.to_string(),
                    seconds: limit.as_secs(),
                })?,
            None => child.await,
        }
        .map_err(|source| ExecError::Spawn {
            command: command.to_string(),
            source,
        })?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Quote a string for safe interpolation into a POSIX shell command.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | ':' | '@' | '='))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Validate a branch name or branch prefix before it is used in git commands.
///
/// Accepts alphanumerics and `/`, `.`, `-`, `_`. Rejects `..`, a leading `-`
/// (flag injection) and anything else.
pub fn ensure_safe_ref(s: &str) -> Result<(), ExecError> {
    if s.is_empty() {
        return Err(ExecError::UnsafeInput("git ref is empty".to_string()));
    }
    if s.starts_with('-') {
        return Err(ExecError::UnsafeInput(format!(
            "git ref '{s}' must not start with '-'"
        )));
    }
    if s.contains("..") {
        return Err(ExecError::UnsafeInput(format!(
            "git ref '{s}' must not contain '..'"
        )));
    }
    if let Some(ch) = s
        .chars()
        .find(|c| !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '/' | '.' | '-' | '_'))
    {
        return Err(ExecError::UnsafeInput(format!(
            "invalid character '{ch}' in git ref '{s}'"
        )));
    }
    Ok(())
}

/// Validate a repository-relative file path used in shell commands.
///
/// Rejects absolute paths, `..` traversal, null bytes and shell metacharacters.
pub fn ensure_safe_path(path: &str) -> Result<(), ExecError> {
    if path.is_empty() {
        return Err(ExecError::UnsafeInput("file path is empty".to_string()));
    }
    if path.contains('\0') {
        return Err(ExecError::UnsafeInput("file path contains null byte".to_string()));
    }
    if path.starts_with('/') {
        return Err(ExecError::UnsafeInput(format!(
            "file path '{path}' must be relative"
        )));
    }
    if path.split('/').any(|part| part == "..") {
        return Err(ExecError::UnsafeInput(format!(
            "file path '{path}' contains '..'"
        )));
    }
    if let Some(ch) = path.chars().find(|c| {
        matches!(
            c,
            '\'' | '"' | '`' | '$' | '!' | '&' | '|' | ';' | '(' | ')' | '{' | '}' | '<' | '>'
                | '\\' | '\n' | '\r' | ' ' | '*' | '?'
        )
    }) {
        return Err(ExecError::UnsafeInput(format!(
            "invalid character '{ch}' in file path '{path}'"
        )));
    }
    Ok(())
}

/// Truncate to at most `max` bytes on a char boundary.
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
