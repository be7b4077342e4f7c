//! In-process GitHub mock.
//!
//! Holds pull requests in memory, seeded from `pull_requests.json` in the
//! configured data directory, and records every tool call in an action log
//! that the rubric grader reads back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::{load_seed, str_arg, GitHubConfig, GitHubService, PullRequest};
use crate::error::ServiceError;
use crate::exec::CommandRunner;

const TOOLS: &[&str] = &["create_pull_request", "list_pull_requests", "get_pull_request"];

#[derive(Default)]
struct State {
    config: Option<GitHubConfig>,
    pull_requests: Vec<PullRequest>,
    actions: Vec<Value>,
}

/// GitHub mock backed by memory and a local bare repository.
pub struct LocalGitHub {
    runner: Arc<dyn CommandRunner>,
    state: Mutex<State>,
}

impl LocalGitHub {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            state: Mutex::new(State::default()),
        }
    }
}

#[async_trait]
impl GitHubService for LocalGitHub {
    async fn configure(&self, config: GitHubConfig) -> Result<(), ServiceError> {
        let pull_requests: Vec<PullRequest> = load_seed(&config.data_dir, "pull_requests.json")?;
        tracing::info!(
            owner = %config.repo_owner,
            repo = %config.repo_name,
            seeded_prs = pull_requests.len(),
            "Configured GitHub mock"
        );
        let mut state = self.state.lock().await;
        *state = State {
            config: Some(config),
            pull_requests,
            actions: Vec::new(),
        };
        Ok(())
    }

    async fn setup_repos(&self) -> Result<(), ServiceError> {
        let setup = {
            let state = self.state.lock().await;
            let config = state
                .config
                .as_ref()
                .ok_or(ServiceError::NotConfigured { service: "github" })?;
            config.repo_setup.clone()
        };
        for (repo, commands) in setup {
            tracing::info!(repo = %repo, steps = commands.len(), "Setting up mock repository");
            for command in commands {
                let output = self.runner.run(&command, None).await?;
                if !output.success() {
                    return Err(ServiceError::RepoSetup(format!(
                        "{repo}: '{command}' exited with {}: {}",
                        output.exit_code,
                        output.stderr.trim()
                    )));
                }
            }
        }
        Ok(())
    }

    async fn repo_url(&self) -> Result<String, ServiceError> {
        let state = self.state.lock().await;
        state
            .config
            .as_ref()
            .map(|c| c.bare_repo_path.display().to_string())
            .ok_or(ServiceError::NotConfigured { service: "github" })
    }

    async fn pull_requests(&self) -> Result<Vec<PullRequest>, ServiceError> {
        Ok(self.state.lock().await.pull_requests.clone())
    }

    async fn action_log(&self) -> Result<Vec<Value>, ServiceError> {
        Ok(self.state.lock().await.actions.clone())
    }

    fn handles(&self, tool: &str) -> bool {
        TOOLS.contains(&tool)
    }

    async fn call_tool(&self, tool: &str, arguments: &Value) -> Result<Value, ServiceError> {
        let mut state = self.state.lock().await;
        let config = state
            .config
            .clone()
            .ok_or(ServiceError::NotConfigured { service: "github" })?;

        let result = match tool {
            "create_pull_request" => {
                let pr = PullRequest {
                    number: state.pull_requests.iter().map(|p| p.number).max().unwrap_or(0) + 1,
                    owner: arguments
                        .get("owner")
                        .and_then(Value::as_str)
                        .unwrap_or(config.repo_owner.as_str())
                        .to_string(),
                    repo: arguments
                        .get("repo")
                        .and_then(Value::as_str)
                        .unwrap_or(config.repo_name.as_str())
                        .to_string(),
                    title: str_arg(tool, arguments, "title")?.to_string(),
                    body: arguments
                        .get("body")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    head: str_arg(tool, arguments, "head")?.to_string(),
                    base: arguments
                        .get("base")
                        .and_then(Value::as_str)
                        .unwrap_or(config.default_branch.as_str())
                        .to_string(),
                    state: "open".to_string(),
                    created_at: Utc::now(),
                };
                tracing::info!(number = pr.number, head = %pr.head, base = %pr.base, "Pull request created");
                let value = serde_json::to_value(&pr)?;
                state.pull_requests.push(pr);
                value
            }
            "list_pull_requests" => serde_json::to_value(&state.pull_requests)?,
            "get_pull_request" => {
                let number = arguments.get("number").and_then(Value::as_u64).ok_or_else(|| {
                    ServiceError::InvalidArguments {
                        tool: tool.to_string(),
                        reason: "missing integer field 'number'".to_string(),
                    }
                })?;
                match state.pull_requests.iter().find(|p| p.number == number) {
                    Some(pr) => serde_json::to_value(pr)?,
                    None => json!({ "error": format!("pull request #{number} not found") }),
                }
            }
            other => return Err(ServiceError::UnknownTool(other.to_string())),
        };

        state.actions.push(json!({
            "tool": tool,
            "arguments": arguments,
            "timestamp": Utc::now().to_rfc3339(),
        }));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::LocalRunner;
    use std::collections::BTreeMap;

    fn config(data_dir: &std::path::Path, setup: Vec<String>) -> GitHubConfig {
        let mut repo_setup = BTreeMap::new();
        repo_setup.insert("svc".to_string(), setup);
        GitHubConfig {
            bare_repo_path: data_dir.join("project.git"),
            data_dir: data_dir.to_path_buf(),
            repo_owner: "acme-corp".to_string(),
            repo_name: "svc".to_string(),
            default_branch: "fix_baseline".to_string(),
            repo_setup,
        }
    }

    #[tokio::test]
    async fn test_unconfigured_tool_call_fails() {
        let gh = LocalGitHub::new(Arc::new(LocalRunner));
        let err = gh.call_tool("list_pull_requests", &json!({})).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn test_create_pull_request_is_logged() {
        let tmp = tempfile::tempdir().unwrap();
        let gh = LocalGitHub::new(Arc::new(LocalRunner));
        gh.configure(config(tmp.path(), vec![])).await.unwrap();

        let pr = gh
            .call_tool(
                "create_pull_request",
                &json!({"title": "fix: bug", "body": "details", "head": "fix/bug"}),
            )
            .await
            .unwrap();
        assert_eq!(pr["number"], 1);
        assert_eq!(pr["base"], "fix_baseline");
        assert_eq!(pr["owner"], "acme-corp");

        let prs = gh.pull_requests().await.unwrap();
        assert_eq!(prs.len(), 1);
        let log = gh.action_log().await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0]["tool"], "create_pull_request");
    }

    #[tokio::test]
    async fn test_seeded_pull_requests_number_after_max() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("pull_requests.json"),
            r#"[{"number": 7, "owner": "acme-corp", "repo": "svc", "title": "old", "head": "a", "base": "b"}]"#,
        )
        .unwrap();
        let gh = LocalGitHub::new(Arc::new(LocalRunner));
        gh.configure(config(tmp.path(), vec![])).await.unwrap();

        let pr = gh
            .call_tool("create_pull_request", &json!({"title": "t", "head": "h"}))
            .await
            .unwrap();
        assert_eq!(pr["number"], 8);
    }

    #[tokio::test]
    async fn test_setup_repos_runs_commands_and_reports_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("ran");
        let gh = LocalGitHub::new(Arc::new(LocalRunner));
        gh.configure(config(
            tmp.path(),
            vec![format!("touch {}", marker.display()), "false".to_string()],
        ))
        .await
        .unwrap();

        let err = gh.setup_repos().await.unwrap_err();
        assert!(marker.exists());
        assert!(matches!(err, ServiceError::RepoSetup(_)));
    }

    #[tokio::test]
    async fn test_missing_title_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let gh = LocalGitHub::new(Arc::new(LocalRunner));
        gh.configure(config(tmp.path(), vec![])).await.unwrap();
        let err = gh
            .call_tool("create_pull_request", &json!({"head": "h"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArguments { .. }));
    }
}
