//! Golden patch generation from a GitHub branch comparison.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;

use crate::error::{ApiError, GoldenError};

pub const GITHUB_API_URL: &str = "https://api.github.com";

const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";

/// Where and what to diff.
#[derive(Debug, Clone)]
pub struct GoldenRequest {
    pub task_dir: PathBuf,
    pub repo_url: String,
    pub base: String,
    pub golden: String,
    pub token: Option<String>,
}

/// `(owner, repo)` from a GitHub URL, ignoring a trailing `/` or `.git`.
pub fn parse_owner_repo(url: &str) -> Result<(String, String), GoldenError> {
    let trimmed = url.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let mut parts = trimmed.rsplit(['/', ':']);
    match (parts.next(), parts.next()) {
        (Some(repo), Some(owner)) if !repo.is_empty() && !owner.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(GoldenError::InvalidRepoUrl(url.to_string())),
    }
}

pub fn compare_url(api_base: &str, owner: &str, repo: &str, base: &str, golden: &str) -> String {
    format!(
        "{}/repos/{owner}/{repo}/compare/{base}...{golden}",
        api_base.trim_end_matches('/')
    )
}

/// Fetch the diff and write it to `<task_dir>/golden.patch`.
pub async fn generate_golden(request: &GoldenRequest) -> Result<PathBuf, GoldenError> {
    generate_golden_from(GITHUB_API_URL, request).await
}

pub async fn generate_golden_from(
    api_base: &str,
    request: &GoldenRequest,
) -> Result<PathBuf, GoldenError> {
    if !request.task_dir.is_dir() {
        return Err(GoldenError::TaskNotFound(request.task_dir.display().to_string()));
    }
    let (owner, repo) = parse_owner_repo(&request.repo_url)?;
    let url = compare_url(api_base, &owner, &repo, &request.base, &request.golden);
    tracing::info!(%owner, %repo, base = %request.base, golden = %request.golden, "Fetching compare diff");

    let patch = fetch_diff(&url, request.token.as_deref()).await?;
    if patch.trim().is_empty() {
        return Err(GoldenError::EmptyDiff {
            base: request.base.clone(),
            golden: request.golden.clone(),
        });
    }
    write_patch(&request.task_dir, &patch)
}

fn write_patch(task_dir: &Path, patch: &str) -> Result<PathBuf, GoldenError> {
    let path = task_dir.join("golden.patch");
    std::fs::write(&path, patch)?;
    Ok(path)
}

async fn fetch_diff(url: &str, token: Option<&str>) -> Result<String, GoldenError> {
    let transport = |e: reqwest::Error| ApiError::Transport {
        method: "GET".to_string(),
        path: url.to_string(),
        message: e.to_string(),
    };
    let client = Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(transport)?;

    let mut request = client
        .get(url)
        .header(ACCEPT, DIFF_MEDIA_TYPE)
        .header(USER_AGENT, "sdlc-tasks");
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        request = request.header(AUTHORIZATION, format!("token {token}"));
    }

    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    let body = response.text().await.map_err(transport)?;
    if !status.is_success() {
        return Err(ApiError::Status {
            method: "GET".to_string(),
            path: url.to_string(),
            status: status.as_u16(),
            detail: body,
        }
        .into());
    }
    Ok(body)
}
