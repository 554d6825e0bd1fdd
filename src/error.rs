use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Interrupted")]
    Cancelled,

    #[error("Invalid or insufficient GitHub token: {0}")]
    InvalidCredential(String),

    #[error("No repositories to monitor: {0}")]
    NoRepositories(String),

    #[error("Invalid repository reference: {0}")]
    InvalidRepository(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors the client hands back to the caller instead of degrading them
    /// to an empty result.
    pub fn is_surfaced(&self) -> bool {
        matches!(self, Error::RateLimited(_) | Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limit_and_cancel_are_surfaced() {
        assert!(Error::RateLimited(60).is_surfaced());
        assert!(Error::Cancelled.is_surfaced());
        assert!(!Error::GitHubApi("boom".to_string()).is_surfaced());
        assert!(!Error::InvalidCredential("401".to_string()).is_surfaced());
    }
}
