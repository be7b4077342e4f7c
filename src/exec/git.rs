//! Thin async wrappers over the `git` CLI.
//!
//! Arguments are passed as argv, never through a shell. Every call inside a
//! repository pins `safe.directory` to that repository so clones owned by
//! another user (e.g. inside a container build) remain usable.

use std::path::Path;

use tokio::process::Command;

use super::CommandOutput;
use crate::error::ExecError;

/// Run `git -C <repo> -c safe.directory=<repo> <args...>`.
pub async fn git_in(repo: &Path, args: &[&str]) -> Result<CommandOutput, ExecError> {
    let repo_str = repo.display().to_string();
    let safe = format!("safe.directory={repo_str}");
    let mut full: Vec<&str> = vec!["-C", &repo_str, "-c", &safe];
    full.extend_from_slice(args);
    git(&full).await
}

/// Run `git <args...>` in the current directory.
pub async fn git(args: &[&str]) -> Result<CommandOutput, ExecError> {
    let output = Command::new("git")
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ExecError::Spawn {
            command: format!("git {}", redact(&args.join(" "))),
            source,
        })?;

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Strip credentials embedded as `https://<token>@host` from a string.
pub fn redact(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(idx) = rest.find("https://") {
        let (head, tail) = rest.split_at(idx + "https://".len());
        out.push_str(head);
        let end = tail.find(char::is_whitespace).unwrap_or(tail.len());
        let authority_end = tail[..end].find('/').unwrap_or(end);
        match tail[..authority_end].rfind('@') {
            Some(at) => {
                out.push_str("***");
                rest = &tail[at..];
            }
            None => rest = tail,
        }
    }
    out.push_str(rest);
    out
}
