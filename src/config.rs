use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::RepoRef;
use crate::moderation::classifier::KeywordSet;
use crate::moderation::schedule::MIN_INTERVAL_SECS;

pub const DEFAULT_CONFIG_FILE: &str = "issuewarden.json";
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Everything one monitoring run needs. Replaced as a whole, never patched
/// while a run is in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub token: String,
    #[serde(rename = "username", default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(rename = "suspicious_keywords", default = "KeywordSet::defaults")]
    pub keywords: KeywordSet,
    /// Empty means every repository owned by the account.
    #[serde(rename = "monitored_repos", default)]
    pub repositories: Vec<RepoRef>,
    #[serde(default = "default_interval")]
    pub check_interval: u64,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl Settings {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            account: None,
            keywords: KeywordSet::defaults(),
            repositories: Vec::new(),
            check_interval: DEFAULT_INTERVAL_SECS,
        }
    }

    /// Rejects an empty token and raises a short interval to the floor.
    pub fn validated(mut self) -> Result<Self> {
        self.token = self.token.trim().to_string();
        if self.token.is_empty() {
            return Err(Error::Config("GitHub token is empty".to_string()));
        }

        if self.check_interval < MIN_INTERVAL_SECS {
            tracing::warn!(
                "Check interval {}s is too short for the API rate limit, using {}s",
                self.check_interval,
                MIN_INTERVAL_SECS
            );
            self.check_interval = MIN_INTERVAL_SECS;
        }

        Ok(self)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    /// Token with everything but the last four characters hidden.
    pub fn masked_token(&self) -> String {
        let chars: Vec<char> = self.token.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), tail)
    }
}

/// Source of [`Settings`] for a run.
pub trait ConfigProvider {
    fn load(&self) -> Result<Settings>;

    fn describe(&self) -> String;
}

/// JSON document on disk, written by `configure`.
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, contents)?;
        tracing::info!("Configuration saved to {}", self.path.display());
        Ok(())
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILE)
    }
}

impl ConfigProvider for FileConfig {
    fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Err(Error::ConfigNotFound(self.path.clone()));
        }
        let contents = fs::read_to_string(&self.path)?;
        let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
            Error::Config(format!("failed to parse {}: {}", self.path.display(), e))
        })?;
        settings.validated()
    }

    fn describe(&self) -> String {
        format!("config file {}", self.path.display())
    }
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variables for unattended runs:
/// `GITHUB_TOKEN`, `REPOS_TO_MONITOR` and `SUSPICIOUS_KEYWORDS`.
pub struct EnvConfig {
    lookup: Lookup,
}

impl EnvConfig {
    pub const TOKEN_VAR: &'static str = "GITHUB_TOKEN";
    pub const REPOS_VAR: &'static str = "REPOS_TO_MONITOR";
    pub const KEYWORDS_VAR: &'static str = "SUSPICIOUS_KEYWORDS";

    pub fn new() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProvider for EnvConfig {
    fn load(&self) -> Result<Settings> {
        let token = self.var(Self::TOKEN_VAR).ok_or_else(|| {
            Error::Config(format!("{} environment variable not set", Self::TOKEN_VAR))
        })?;

        let mut settings = Settings::new(token);

        if let Some(keywords) = self.var(Self::KEYWORDS_VAR) {
            settings.keywords = KeywordSet::parse_list(&keywords)
                .map_err(|e| Error::Config(format!("{}: {}", Self::KEYWORDS_VAR, e)))?;
        }

        if let Some(repos) = self.var(Self::REPOS_VAR) {
            settings.repositories = repos
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(|r| r.parse::<RepoRef>())
                .collect::<Result<Vec<_>>>()?;
        }

        settings.validated()
    }

    fn describe(&self) -> String {
        "environment variables".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> EnvConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_env_defaults() {
        let settings = env_from(&[("GITHUB_TOKEN", "ghp_abc")]).load().unwrap();
        assert_eq!(settings.token, "ghp_abc");
        assert_eq!(settings.keywords, KeywordSet::defaults());
        assert!(settings.repositories.is_empty());
        assert_eq!(settings.check_interval, DEFAULT_INTERVAL_SECS);
    }

    #[test]
    fn test_env_lists() {
        let settings = env_from(&[
            ("GITHUB_TOKEN", "ghp_abc"),
            ("REPOS_TO_MONITOR", "octo/spoon, octo/fork"),
            ("SUSPICIOUS_KEYWORDS", "spam,scam"),
        ])
        .load()
        .unwrap();
        assert_eq!(
            settings.repositories,
            vec![RepoRef::new("octo", "spoon"), RepoRef::new("octo", "fork")]
        );
        assert_eq!(settings.keywords.iter().collect::<Vec<_>>(), vec!["spam", "scam"]);
    }

    #[test]
    fn test_env_requires_token() {
        assert!(matches!(env_from(&[]).load(), Err(Error::Config(_))));
    }

    #[test]
    fn test_env_rejects_empty_keyword() {
        let result = env_from(&[
            ("GITHUB_TOKEN", "ghp_abc"),
            ("SUSPICIOUS_KEYWORDS", "spam,,scam"),
        ])
        .load();
        assert!(result.is_err());
    }

    #[test]
    fn test_file_round_trip_and_interval_floor() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileConfig::new(dir.path().join("nested").join("issuewarden.json"));

        let mut settings = Settings::new("ghp_secret");
        settings.account = Some("octo".to_string());
        settings.repositories = vec![RepoRef::new("octo", "spoon")];
        settings.keywords = KeywordSet::new(["spam"]).unwrap();
        settings.check_interval = 5;
        file.save(&settings).unwrap();

        let loaded = file.load().unwrap();
        assert_eq!(loaded.account.as_deref(), Some("octo"));
        assert_eq!(loaded.repositories, settings.repositories);
        assert_eq!(loaded.keywords, settings.keywords);
        assert_eq!(loaded.check_interval, MIN_INTERVAL_SECS);
    }

    #[test]
    fn test_file_uses_flat_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "token": "ghp_abc",
                "username": "octo",
                "suspicious_keywords": ["spam", "Star"],
                "monitored_repos": ["octo/spoon"],
                "check_interval": 90
            }"#,
        )
        .unwrap();

        let settings = FileConfig::new(&path).load().unwrap();
        assert_eq!(settings.check_interval, 90);
        assert_eq!(settings.keywords.iter().collect::<Vec<_>>(), vec!["spam", "Star"]);
    }

    #[test]
    fn test_file_rejects_empty_keyword() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"token": "ghp_abc", "suspicious_keywords": ["spam", ""]}"#).unwrap();
        assert!(matches!(FileConfig::new(&path).load(), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileConfig::new(dir.path().join("absent.json"));
        assert!(matches!(file.load(), Err(Error::ConfigNotFound(_))));
    }

    #[test]
    fn test_masked_token() {
        assert_eq!(Settings::new("ghp_123456").masked_token(), "******3456");
        assert_eq!(Settings::new("abc").masked_token(), "***");
    }
}
