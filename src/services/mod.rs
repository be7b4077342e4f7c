//! Mock GitHub, Linear and Sentry services.
//!
//! Scenarios configure the services during setup, the agent talks to them
//! through MCP tools, and graders read back what the agent did. Each service
//! is a trait so a run can be wired to the environment's MCP servers or to
//! the in-process adapters shipped here. A [`Services`] bundle is built per
//! run and handed to the scenario; nothing is process-global.

pub mod github;
pub mod linear;
pub mod sentry;

pub use github::LocalGitHub;
pub use linear::LocalLinear;
pub use sentry::LocalSentry;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;
use crate::exec::CommandRunner;

/// GitHub mock configuration applied during scenario setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub bare_repo_path: PathBuf,
    pub data_dir: PathBuf,
    pub repo_owner: String,
    pub repo_name: String,
    pub default_branch: String,
    /// Shell commands per repository that (re)create its bare repo.
    pub repo_setup: BTreeMap<String, Vec<String>>,
}

/// A pull request recorded by the GitHub mock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub owner: String,
    pub repo: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub head: String,
    pub base: String,
    #[serde(default = "default_pr_state")]
    pub state: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_pr_state() -> String {
    "open".to_string()
}

/// Workflow state of a Linear issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearState {
    pub name: String,
    /// One of `backlog`, `unstarted`, `started`, `completed`, `canceled`.
    #[serde(rename = "type")]
    pub state_type: String,
}

impl LinearState {
    /// Build a state from its display name using Linear's default workflow.
    pub fn from_name(name: &str) -> Self {
        let state_type = match name.to_ascii_lowercase().as_str() {
            "done" | "completed" | "closed" => "completed",
            "canceled" | "cancelled" | "duplicate" => "canceled",
            "in progress" | "in review" | "started" => "started",
            "backlog" | "triage" => "backlog",
            _ => "unstarted",
        };
        Self {
            name: name.to_string(),
            state_type: state_type.to_string(),
        }
    }
}

impl Default for LinearState {
    fn default() -> Self {
        Self::from_name("Todo")
    }
}

/// A comment on a Linear issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearComment {
    pub body: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// A Linear issue as held by the mock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearIssue {
    pub id: String,
    #[serde(default)]
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub state: LinearState,
    #[serde(default)]
    pub comments: Vec<LinearComment>,
}

/// Linear mock configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConfig {
    pub data_dir: PathBuf,
}

/// Sentry mock configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentryConfig {
    pub data_dir: PathBuf,
    pub project: Option<Value>,
}

/// Mock GitHub service.
#[async_trait]
pub trait GitHubService: Send + Sync {
    async fn configure(&self, config: GitHubConfig) -> Result<(), ServiceError>;

    /// Run the configured repo setup so the bare repository exists.
    async fn setup_repos(&self) -> Result<(), ServiceError>;

    /// Clone URL of the configured repository.
    async fn repo_url(&self) -> Result<String, ServiceError>;

    async fn pull_requests(&self) -> Result<Vec<PullRequest>, ServiceError>;

    /// Tool calls the agent made against the mock, oldest first.
    async fn action_log(&self) -> Result<Vec<Value>, ServiceError>;

    fn handles(&self, tool: &str) -> bool;

    async fn call_tool(&self, tool: &str, arguments: &Value) -> Result<Value, ServiceError>;
}

/// Mock Linear service.
#[async_trait]
pub trait LinearService: Send + Sync {
    async fn configure(&self, config: LinearConfig) -> Result<(), ServiceError>;

    async fn issues(&self) -> Result<Vec<LinearIssue>, ServiceError>;

    async fn action_log(&self) -> Result<Vec<Value>, ServiceError>;

    fn handles(&self, tool: &str) -> bool;

    async fn call_tool(&self, tool: &str, arguments: &Value) -> Result<Value, ServiceError>;
}

/// Mock Sentry service.
#[async_trait]
pub trait SentryService: Send + Sync {
    async fn configure(&self, config: SentryConfig) -> Result<(), ServiceError>;

    fn handles(&self, tool: &str) -> bool;

    async fn call_tool(&self, tool: &str, arguments: &Value) -> Result<Value, ServiceError>;
}

/// The service handles for one scenario run.
#[derive(Clone)]
pub struct Services {
    pub github: Arc<dyn GitHubService>,
    pub linear: Arc<dyn LinearService>,
    pub sentry: Arc<dyn SentryService>,
}

impl Services {
    /// Fresh in-process adapters; GitHub repo setup runs through `runner`.
    pub fn local(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            github: Arc::new(LocalGitHub::new(runner)),
            linear: Arc::new(LocalLinear::new()),
            sentry: Arc::new(LocalSentry::new()),
        }
    }

    /// Route a service tool call to whichever service owns the tool.
    pub async fn call_tool(&self, tool: &str, arguments: &Value) -> Result<Value, ServiceError> {
        if self.github.handles(tool) {
            self.github.call_tool(tool, arguments).await
        } else if self.linear.handles(tool) {
            self.linear.call_tool(tool, arguments).await
        } else if self.sentry.handles(tool) {
            self.sentry.call_tool(tool, arguments).await
        } else {
            Err(ServiceError::UnknownTool(tool.to_string()))
        }
    }
}

/// Load an optional JSON seed file from a mock data directory.
pub(crate) fn load_seed<T: DeserializeOwned + Default>(
    data_dir: &Path,
    file: &str,
) -> Result<T, ServiceError> {
    let path = data_dir.join(file);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No seed file, starting empty");
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Fetch a required string argument of a tool call.
pub(crate) fn str_arg<'a>(tool: &str, arguments: &'a Value, key: &str) -> Result<&'a str, ServiceError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("missing string field '{key}'"),
        })
}
