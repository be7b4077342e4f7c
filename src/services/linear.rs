//! In-process Linear mock, seeded from `issues.json`.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::{load_seed, str_arg, LinearComment, LinearConfig, LinearIssue, LinearService, LinearState};
use crate::error::ServiceError;

const TOOLS: &[&str] = &[
    "linear_list_issues",
    "linear_get_issue",
    "linear_create_issue",
    "linear_update_issue",
    "create_comment",
];

#[derive(Default)]
struct State {
    configured: bool,
    issues: Vec<LinearIssue>,
    actions: Vec<Value>,
}

impl State {
    fn find_mut(&mut self, tool: &str, id: &str) -> Result<&mut LinearIssue, ServiceError> {
        self.issues
            .iter_mut()
            .find(|i| i.id == id || i.identifier == id)
            .ok_or_else(|| ServiceError::InvalidArguments {
                tool: tool.to_string(),
                reason: format!("issue '{id}' not found"),
            })
    }
}

/// Linear mock holding issues in memory.
#[derive(Default)]
pub struct LocalLinear {
    state: Mutex<State>,
}

impl LocalLinear {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinearService for LocalLinear {
    async fn configure(&self, config: LinearConfig) -> Result<(), ServiceError> {
        let issues: Vec<LinearIssue> = load_seed(&config.data_dir, "issues.json")?;
        tracing::info!(data_dir = %config.data_dir.display(), issues = issues.len(), "Configured Linear mock");
        *self.state.lock().await = State {
            configured: true,
            issues,
            actions: Vec::new(),
        };
        Ok(())
    }

    async fn issues(&self) -> Result<Vec<LinearIssue>, ServiceError> {
        Ok(self.state.lock().await.issues.clone())
    }

    async fn action_log(&self) -> Result<Vec<Value>, ServiceError> {
        Ok(self.state.lock().await.actions.clone())
    }

    fn handles(&self, tool: &str) -> bool {
        TOOLS.contains(&tool)
    }

    async fn call_tool(&self, tool: &str, arguments: &Value) -> Result<Value, ServiceError> {
        let mut state = self.state.lock().await;
        if !state.configured {
            return Err(ServiceError::NotConfigured { service: "linear" });
        }

        let result = match tool {
            "linear_list_issues" => serde_json::to_value(&state.issues)?,
            "linear_get_issue" => {
                let id = str_arg(tool, arguments, "id")?;
                serde_json::to_value(state.find_mut(tool, id)?)?
            }
            "linear_create_issue" => {
                let number = state.issues.len() + 1;
                let team = arguments
                    .get("team")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let prefix: String = team.chars().take(3).collect::<String>().to_uppercase();
                let issue = LinearIssue {
                    id: format!("issue-new-{number}"),
                    identifier: format!("{}-{number}", if prefix.is_empty() { "ISS" } else { prefix.as_str() }),
                    title: str_arg(tool, arguments, "title")?.to_string(),
                    description: arguments
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    team,
                    state: arguments
                        .get("state")
                        .and_then(Value::as_str)
                        .map(LinearState::from_name)
                        .unwrap_or_default(),
                    comments: Vec::new(),
                };
                tracing::info!(id = %issue.id, title = %issue.title, "Linear issue created");
                let value = serde_json::to_value(&issue)?;
                state.issues.push(issue);
                value
            }
            "linear_update_issue" => {
                let id = str_arg(tool, arguments, "id")?;
                let issue = state.find_mut(tool, id)?;
                if let Some(name) = arguments.get("state").and_then(Value::as_str) {
                    issue.state = LinearState::from_name(name);
                }
                if let Some(title) = arguments.get("title").and_then(Value::as_str) {
                    issue.title = title.to_string();
                }
                if let Some(description) = arguments.get("description").and_then(Value::as_str) {
                    issue.description = description.to_string();
                }
                tracing::info!(id = %issue.id, state = %issue.state.name, "Linear issue updated");
                serde_json::to_value(&*issue)?
            }
            "create_comment" => {
                let id = str_arg(tool, arguments, "issueId")?;
                let body = str_arg(tool, arguments, "body")?.to_string();
                let issue = state.find_mut(tool, id)?;
                issue.comments.push(LinearComment {
                    body,
                    created_at: Utc::now(),
                });
                json!({ "success": true, "issueId": issue.id, "comments": issue.comments.len() })
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

    async fn seeded() -> (tempfile::TempDir, LocalLinear) {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("issues.json"),
            r#"[{"id": "issue-305", "identifier": "ENG-305", "title": "Eval rewards always 0.0",
                 "state": {"name": "Todo", "type": "unstarted"}}]"#,
        )
        .unwrap();
        let linear = LocalLinear::new();
        linear
            .configure(LinearConfig {
                data_dir: tmp.path().to_path_buf(),
            })
            .await
            .unwrap();
        (tmp, linear)
    }

    #[tokio::test]
    async fn test_comment_and_close_issue() {
        let (_tmp, linear) = seeded().await;
        linear
            .call_tool("create_comment", &json!({"issueId": "issue-305", "body": "fixed"}))
            .await
            .unwrap();
        linear
            .call_tool("linear_update_issue", &json!({"id": "ENG-305", "state": "Done"}))
            .await
            .unwrap();

        let issues = linear.issues().await.unwrap();
        assert_eq!(issues[0].comments.len(), 1);
        assert_eq!(issues[0].state.state_type, "completed");
        assert_eq!(linear.action_log().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_issue() {
        let (_tmp, linear) = seeded().await;
        let created = linear
            .call_tool(
                "linear_create_issue",
                &json!({"team": "Platform", "title": "Webhook channels leak", "state": "Done"}),
            )
            .await
            .unwrap();
        assert_eq!(created["identifier"], "PLA-2");
        assert_eq!(created["state"]["type"], "completed");
    }

    #[tokio::test]
    async fn test_unknown_issue_is_invalid() {
        let (_tmp, linear) = seeded().await;
        let err = linear
            .call_tool("linear_update_issue", &json!({"id": "nope", "state": "Done"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArguments { .. }));
        assert!(linear.action_log().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_configured() {
        let linear = LocalLinear::new();
        let err = linear.call_tool("linear_list_issues", &json!({})).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured { service: "linear" }));
    }
}
