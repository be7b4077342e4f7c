//! HUD task API client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::sync::{RemoteTask, RemoteTaskset};

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// One task in an upload body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadTask {
    pub slug: String,
    pub env: Value,
    pub scenario: String,
    pub args: Value,
}

impl UploadTask {
    pub fn new(slug: &str, env_name: &str, scenario: &str, args: Value) -> Self {
        Self {
            slug: slug.to_string(),
            env: json!({ "name": env_name }),
            scenario: scenario.to_string(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadRequest {
    pub name: String,
    pub tasks: Vec<UploadTask>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub tasks_created: u64,
    #[serde(default)]
    pub tasks_updated: u64,
}

/// Remote storage for tasksets.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetch a taskset by name. `None` when it does not exist.
    async fn get_taskset(&self, name: &str) -> Result<Option<RemoteTaskset>, ApiError>;

    /// Create or update the given tasks in one request.
    async fn upload(&self, request: &UploadRequest) -> Result<UploadResponse, ApiError>;
}

/// [`TaskStore`] over the HUD REST API with bearer auth.
pub struct HudApiClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HudApiClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::Transport {
                method: "INIT".to_string(),
                path: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{path}", self.api_url);
        tracing::debug!(%method, %url, "HUD API request");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(&self.api_key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let transport = |e: reqwest::Error| ApiError::Transport {
            method: method.to_string(),
            path: path.to_string(),
            message: e.to_string(),
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(ApiError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                detail: error_detail(&text),
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::UnexpectedResponse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl TaskStore for HudApiClient {
    async fn get_taskset(&self, name: &str) -> Result<Option<RemoteTaskset>, ApiError> {
        let path = format!("/tasks/evalset/{}", urlencoding::encode(name));
        match self.request_json(Method::GET, &path, None::<&()>).await {
            Ok(payload) => parse_taskset(&path, name, payload).map(Some),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn upload(&self, request: &UploadRequest) -> Result<UploadResponse, ApiError> {
        let path = "/tasks/upload";
        let payload = self.request_json(Method::POST, path, Some(request)).await?;
        if !payload.is_object() {
            return Err(unexpected(path, "expected a JSON object"));
        }
        serde_json::from_value(payload).map_err(|e| unexpected(path, &e.to_string()))
    }
}

fn unexpected(path: &str, message: &str) -> ApiError {
    ApiError::UnexpectedResponse {
        path: path.to_string(),
        message: message.to_string(),
    }
}

/// `detail` from a JSON error body, the whole object otherwise, or the raw text.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail").filter(|d| is_truthy(d)) {
            Some(Value::String(s)) => s.clone(),
            Some(detail) => detail.to_string(),
            None => Value::Object(map).to_string(),
        },
        _ => body.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Read a task entry field by field; ill-typed fields count as absent.
fn remote_task(entry: &Value) -> RemoteTask {
    let text = |key: &str| match entry.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    RemoteTask {
        slug: text("slug"),
        external_id: text("external_id"),
        scenario: text("scenario"),
        args: entry.get("args").cloned(),
    }
}

/// Decode a `/tasks/evalset` payload, skipping non-object task entries.
fn parse_taskset(path: &str, requested: &str, payload: Value) -> Result<RemoteTaskset, ApiError> {
    let Value::Object(mut map) = payload else {
        return Err(unexpected(path, "expected a JSON object"));
    };

    let tasks = match map.remove("tasks") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(entries)) => entries
            .into_iter()
            .filter(|(_, v)| v.is_object())
            .map(|(k, v)| (k, remote_task(&v)))
            .collect(),
        Some(_) => return Err(unexpected(path, "unexpected tasks payload")),
    };

    let text = |key: &str| match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let taskset_name = Some(text("taskset_name"))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| requested.to_string());

    Ok(RemoteTaskset {
        taskset_id: text("taskset_id"),
        taskset_name,
        tasks,
    })
}
