//! In-process Sentry mock. Read-only: serves seeded issues and events.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::{load_seed, str_arg, SentryConfig, SentryService};
use crate::error::ServiceError;

const TOOLS: &[&str] = &["sentry_list_projects", "sentry_list_issues", "sentry_get_issue"];

#[derive(Default)]
struct State {
    project: Option<Value>,
    issues: Option<Vec<Value>>,
}

#[derive(Default)]
pub struct LocalSentry {
    state: Mutex<State>,
}

impl LocalSentry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SentryService for LocalSentry {
    async fn configure(&self, config: SentryConfig) -> Result<(), ServiceError> {
        let issues: Vec<Value> = load_seed(&config.data_dir, "issues.json")?;
        tracing::info!(data_dir = %config.data_dir.display(), issues = issues.len(), "Configured Sentry mock");
        *self.state.lock().await = State {
            project: config.project,
            issues: Some(issues),
        };
        Ok(())
    }

    fn handles(&self, tool: &str) -> bool {
        TOOLS.contains(&tool)
    }

    async fn call_tool(&self, tool: &str, arguments: &Value) -> Result<Value, ServiceError> {
        let state = self.state.lock().await;
        let issues = state
            .issues
            .as_ref()
            .ok_or(ServiceError::NotConfigured { service: "sentry" })?;

        match tool {
            "sentry_list_projects" => Ok(json!(state.project.iter().collect::<Vec<_>>())),
            "sentry_list_issues" => Ok(Value::Array(issues.clone())),
            "sentry_get_issue" => {
                let id = str_arg(tool, arguments, "issue_id")?;
                issues
                    .iter()
                    .find(|i| i.get("id").and_then(Value::as_str) == Some(id))
                    .cloned()
                    .ok_or_else(|| ServiceError::InvalidArguments {
                        tool: tool.to_string(),
                        reason: format!("issue '{id}' not found"),
                    })
            }
            other => Err(ServiceError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sentry_serves_seeded_issues() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("issues.json"),
            r#"[{"id": "101", "title": "KeyError: 'email'"}]"#,
        )
        .unwrap();
        let sentry = LocalSentry::new();
        sentry
            .configure(SentryConfig {
                data_dir: tmp.path().to_path_buf(),
                project: Some(json!({"id": "2", "slug": "user-service"})),
            })
            .await
            .unwrap();

        let list = sentry.call_tool("sentry_list_issues", &json!({})).await.unwrap();
        assert_eq!(list.as_array().unwrap().len(), 1);
        let issue = sentry
            .call_tool("sentry_get_issue", &json!({"issue_id": "101"}))
            .await
            .unwrap();
        assert_eq!(issue["title"], "KeyError: 'email'");
        let projects = sentry.call_tool("sentry_list_projects", &json!({})).await.unwrap();
        assert_eq!(projects[0]["slug"], "user-service");
    }
}
