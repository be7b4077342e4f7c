//! Clone or refresh the manifest repositories.
//!
//! For each repo: clone when absent, otherwise fetch; materialize every
//! requested branch as a local branch tracking `origin/<branch>`; then check
//! out the first listed branch as the working branch. A clone failure is
//! fatal. Fetch and per-branch failures are logged and skipped, since the
//! scenarios re-verify branch presence before use.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::{RepoConfig, RepoManifest};
use crate::error::CloneError;
use crate::exec::ensure_safe_ref;
use crate::exec::git::{git, git_in, redact};

/// Environment variable holding the clone token.
pub const SOURCE_PAT_ENV: &str = "SOURCE_GITHUB_PAT";

/// Secret file consulted when the environment variable is unset.
pub const SOURCE_PAT_SECRET: &str = "/run/secrets/SOURCE_GITHUB_PAT";

/// Configuration for a cloning run.
#[derive(Debug, Clone)]
pub struct ClonerConfig {
    /// Directory that receives one checkout per manifest entry.
    pub source_base: PathBuf,
    /// Optional token spliced into `https://` remotes during network calls.
    pub token: Option<String>,
}

impl Default for ClonerConfig {
    fn default() -> Self {
        Self {
            source_base: PathBuf::from(super::DEFAULT_SOURCE_BASE),
            token: None,
        }
    }
}

impl ClonerConfig {
    pub fn new(source_base: impl Into<PathBuf>) -> Self {
        Self {
            source_base: source_base.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }
}

/// Resolve the clone token from the environment or the mounted secret.
pub fn resolve_token() -> Option<String> {
    resolve_token_from(std::env::var(SOURCE_PAT_ENV).ok(), Path::new(SOURCE_PAT_SECRET))
}

fn resolve_token_from(env_value: Option<String>, secret_path: &Path) -> Option<String> {
    if let Some(pat) = env_value.filter(|p| !p.is_empty()) {
        return Some(pat);
    }
    std::fs::read_to_string(secret_path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Splice `token` into an `https://` URL. Other schemes are returned as is.
pub fn authenticated_url(url: &str, token: Option<&str>) -> String {
    match (token, url.strip_prefix("https://")) {
        (Some(token), Some(rest)) if !token.is_empty() => format!("https://{token}@{rest}"),
        _ => url.to_string(),
    }
}

/// Clones manifest repositories into a base directory.
pub struct RepoCloner {
    config: ClonerConfig,
}

impl RepoCloner {
    pub fn new(config: ClonerConfig) -> Self {
        Self { config }
    }

    /// Clone or refresh every repository listed in `manifest`.
    pub async fn clone_all(&self, manifest: &RepoManifest) -> Result<(), CloneError> {
        if manifest.is_empty() {
            warn!("No repos found in manifest");
            return Ok(());
        }

        std::fs::create_dir_all(&self.config.source_base)?;

        for (name, repo) in &manifest.repos {
            self.sync_repo(name, repo).await?;
        }

        info!(count = manifest.len(), "Done, cloned {} repo(s)", manifest.len());
        Ok(())
    }

    async fn sync_repo(&self, name: &str, repo: &RepoConfig) -> Result<(), CloneError> {
        let target = self.config.source_base.join(name);
        let token = self.config.token.as_deref();
        let auth_url = authenticated_url(&repo.repo_url, token);

        if target.join(".git").is_dir() {
            info!(repo = name, "Repo already exists, fetching");
            if token.is_some() {
                set_origin(&target, &auth_url).await;
            }
            match git_in(&target, &["fetch", "--all", "--tags"]).await {
                Ok(out) if !out.success() => {
                    warn!(repo = name, stderr = %redact(out.stderr.trim()), "Fetch failed, continuing");
                }
                Err(e) => warn!(repo = name, error = %e, "Fetch failed, continuing"),
                Ok(_) => {}
            }
        } else {
            info!(repo = name, url = %repo.repo_url, target = %target.display(), "Cloning");
            let target_str = target.display().to_string();
            let out = git(&["clone", &auth_url, &target_str]).await?;
            if !out.success() {
                let stderr = redact(out.stderr.trim());
                error!(repo = name, stderr = %stderr, "Clone failed");
                return Err(CloneError::CloneFailed {
                    repo: name.to_string(),
                    stderr,
                });
            }
        }

        if token.is_some() {
            set_origin(&target, &repo.repo_url).await;
        }

        for branch in &repo.branches {
            if let Err(e) = ensure_safe_ref(branch) {
                warn!(repo = name, error = %e, "Skipping branch");
                continue;
            }
            let remote_ref = format!("origin/{branch}");
            let verified = git_in(&target, &["rev-parse", "--verify", "--quiet", &remote_ref])
                .await
                .map(|o| o.success())
                .unwrap_or(false);
            if !verified {
                warn!(repo = name, branch = %branch, "Branch not found on remote, skipping");
                continue;
            }
            match git_in(&target, &["checkout", "-f", "-B", branch, &remote_ref]).await {
                Ok(out) if out.success() => {}
                Ok(out) => {
                    warn!(repo = name, branch = %branch, stderr = %out.stderr.trim(), "Branch checkout failed, skipping");
                }
                Err(e) => warn!(repo = name, branch = %branch, error = %e, "Branch checkout failed, skipping"),
            }
        }

        // The first listed branch is the working branch.
        if let Some(first) = repo.branches.first().filter(|b| ensure_safe_ref(b).is_ok()) {
            if let Ok(out) = git_in(&target, &["checkout", "-f", first]).await {
                if !out.success() {
                    warn!(repo = name, branch = %first, "Could not check out working branch");
                }
            }
        }

        restrict_permissions(&target);
        Ok(())
    }
}

async fn set_origin(target: &Path, url: &str) {
    if let Err(e) = git_in(target, &["remote", "set-url", "origin", url]).await {
        warn!(target = %target.display(), error = %e, "Failed to update origin URL");
    }
}

#[cfg(unix)]
fn restrict_permissions(target: &Path) {
    use std::os::unix::fs::PermissionsExt;

    for entry in walkdir::WalkDir::new(target).into_iter().flatten() {
        if entry.path_is_symlink() {
            continue;
        }
        let perms = std::fs::Permissions::from_mode(0o700);
        if let Err(e) = std::fs::set_permissions(entry.path(), perms) {
            tracing::debug!(path = %entry.path().display(), error = %e, "chmod failed");
        }
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_target: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_url_https() {
        assert_eq!(
            authenticated_url("https://github.com/org/repo", Some("tok")),
            "https://tok@github.com/org/repo"
        );
    }

    #[test]
    fn test_authenticated_url_without_token_or_non_https() {
        assert_eq!(
            authenticated_url("https://github.com/org/repo", None),
            "https://github.com/org/repo"
        );
        assert_eq!(
            authenticated_url("git@github.com:org/repo.git", Some("tok")),
            "git@github.com:org/repo.git"
        );
        assert_eq!(authenticated_url("/srv/git/x", Some("tok")), "/srv/git/x");
    }

    #[test]
    fn test_token_prefers_env() {
        let tmp = tempfile::tempdir().unwrap();
        let secret = tmp.path().join("pat");
        std::fs::write(&secret, "from-file\n").unwrap();
        assert_eq!(
            resolve_token_from(Some("from-env".into()), &secret).as_deref(),
            Some("from-env")
        );
        assert_eq!(resolve_token_from(Some(String::new()), &secret).as_deref(), Some("from-file"));
        assert_eq!(resolve_token_from(None, &tmp.path().join("missing")), None);
    }

    #[test]
    fn test_config_drops_empty_token() {
        let config = ClonerConfig::new("/tmp/x").with_token(Some(String::new()));
        assert!(config.token.is_none());
    }
}
