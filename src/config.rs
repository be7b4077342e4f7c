//! Project configuration from `.env` files and the process environment.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;

/// Default HUD API endpoint.
pub const DEFAULT_HUD_API_URL: &str = "https://api.hud.so";

/// Name of the dotenv file in the project root.
pub const DOTENV_FILE: &str = ".env";

/// Variables parsed from a `.env` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DotEnv {
    vars: BTreeMap<String, String>,
}

impl DotEnv {
    /// Load `<dir>/.env`. A missing file yields an empty set.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(DOTENV_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let to_err = |source| ConfigError::DotEnv {
            path: path.display().to_string(),
            source,
        };
        let vars = dotenvy::from_path_iter(&path)
            .map_err(to_err)?
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map_err(to_err)?;
        tracing::debug!(path = %path.display(), count = vars.len(), "Loaded dotenv file");
        Ok(Self { vars })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Value from the file only.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Process environment first, then the file.
    pub fn resolve(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.get(key).map(str::to_string))
    }

    /// Copy file values into the process environment without overriding existing ones.
    pub fn export(&self) {
        for (key, value) in &self.vars {
            if std::env::var_os(key).is_none() {
                std::env::set_var(key, value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Unwrap a required setting or explain how to provide it.
pub fn require(value: Option<String>, name: &str, hint: &str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::Missing {
            name: name.to_string(),
            hint: hint.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DotEnv::load(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_load_parses_pairs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DOTENV_FILE),
            "# comment\nTASKSET_NAME=coding\nENV_NAME = sdlc-env\nEMPTY=\n",
        )
        .unwrap();
        let dotenv = DotEnv::load(dir.path()).unwrap();
        assert_eq!(dotenv.get("TASKSET_NAME"), Some("coding"));
        assert_eq!(dotenv.get("ENV_NAME"), Some("sdlc-env"));
        assert_eq!(dotenv.get("EMPTY"), None);
        assert_eq!(dotenv.get("MISSING"), None);
    }

    #[test]
    fn test_resolve_prefers_process_env() {
        let dotenv = DotEnv::from_pairs([
            ("SDLC_TASKS_TEST_RESOLVE", "from-file"),
            ("SDLC_TASKS_TEST_FILE_ONLY", "file"),
        ]);
        std::env::set_var("SDLC_TASKS_TEST_RESOLVE", "from-env");
        assert_eq!(dotenv.resolve("SDLC_TASKS_TEST_RESOLVE").as_deref(), Some("from-env"));
        assert_eq!(dotenv.resolve("SDLC_TASKS_TEST_FILE_ONLY").as_deref(), Some("file"));
    }

    #[test]
    fn test_export_does_not_override() {
        std::env::set_var("SDLC_TASKS_TEST_EXPORT_SET", "kept");
        let dotenv = DotEnv::from_pairs([
            ("SDLC_TASKS_TEST_EXPORT_SET", "ignored"),
            ("SDLC_TASKS_TEST_EXPORT_NEW", "added"),
        ]);
        dotenv.export();
        assert_eq!(std::env::var("SDLC_TASKS_TEST_EXPORT_SET").unwrap(), "kept");
        assert_eq!(std::env::var("SDLC_TASKS_TEST_EXPORT_NEW").unwrap(), "added");
    }

    #[test]
    fn test_require() {
        assert_eq!(require(Some(" x ".into()), "A", "h").unwrap(), "x");
        let err = require(Some("".into()), "HUD_API_KEY", "Set it in .env.").unwrap_err();
        assert_eq!(err.to_string(), "HUD_API_KEY is not set. Set it in .env.");
        assert!(require(None, "A", "h").is_err());
    }
}
