//! Reference repositories used by the tasks.
//!
//! The manifest (`repo_config.yaml`) names each source repository, where to
//! clone it from and which branches the tasks need:
//!
//! ```yaml
//! repos:
//!   coding-template-sample:
//!     repo_url: https://github.com/hud-evals/coding-template-sample
//!     branches: [server_fix_baseline, server_fix_test, server_fix_golden]
//! ```

pub mod cloner;

pub use cloner::{ClonerConfig, RepoCloner};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CloneError;

/// Default manifest location inside the environment image build.
pub const DEFAULT_MANIFEST_PATH: &str = "/tmp/repo_config.yaml";

/// Default directory the source repositories are cloned into.
pub const DEFAULT_SOURCE_BASE: &str = "/home/root/source";

/// One repository entry of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub repo_url: String,
    /// Branches to materialize locally. The first entry is the working branch.
    #[serde(default)]
    pub branches: Vec<String>,
}

/// The parsed repo manifest. Entries keep their manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoManifest {
    pub repos: Vec<(String, RepoConfig)>,
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    repos: Option<serde_yaml::Mapping>,
}

impl RepoManifest {
    /// Parse a manifest from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawManifest = serde_yaml::from_str(text)?;
        let mut repos = Vec::new();
        for (key, value) in raw.repos.unwrap_or_default() {
            let name: String = serde_yaml::from_value(key)?;
            let config: RepoConfig = serde_yaml::from_value(value)?;
            repos.push((name, config));
        }
        Ok(Self { repos })
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, CloneError> {
        let text = std::fs::read_to_string(path).map_err(|source| CloneError::ReadManifest {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| CloneError::ParseManifest {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_parses_flow_and_block_lists() {
        let yaml = r#"
repos:
  coding-template-sample:
    repo_url: https://github.com/hud-evals/coding-template-sample
    branches: [server_fix_baseline, server_fix_test]
  sdlc-tasks-data:
    repo_url: https://github.com/hud-evals/sdlc-tasks-data
    branches:
      - eval_reward_baseline
      - eval_reward_test
"#;
        let manifest = RepoManifest::from_yaml(yaml).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.repos[0].0, "coding-template-sample");
        assert_eq!(
            manifest.repos[0].1.branches,
            vec!["server_fix_baseline", "server_fix_test"]
        );
        assert_eq!(manifest.repos[1].0, "sdlc-tasks-data");
        assert_eq!(manifest.repos[1].1.branches[1], "eval_reward_test");
    }

    #[test]
    fn test_manifest_preserves_order() {
        let yaml = "repos:\n  zeta:\n    repo_url: z\n  alpha:\n    repo_url: a\n";
        let manifest = RepoManifest::from_yaml(yaml).unwrap();
        let names: Vec<&str> = manifest.repos.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert!(manifest.repos[0].1.branches.is_empty());
    }

    #[test]
    fn test_manifest_empty() {
        assert!(RepoManifest::from_yaml("").unwrap().is_empty());
        assert!(RepoManifest::from_yaml("repos:\n").unwrap().is_empty());
    }

    #[test]
    fn test_manifest_missing_url_is_error() {
        assert!(RepoManifest::from_yaml("repos:\n  x:\n    branches: [a]\n").is_err());
    }
}
