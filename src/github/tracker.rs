use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CredentialCheck, Issue, RepoRef};

/// Operations the moderation loop needs from the issue tracker.
///
/// Implementations degrade ordinary failures (bad status, transport errors,
/// unreadable bodies) into the empty or negative value of each operation and
/// log them. `Err` is reserved for conditions the caller should know about:
/// an exhausted rate limit or a wait interrupted by cancellation.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Check the token. Never fails; any problem yields `valid = false`.
    async fn validate_credential(&self) -> CredentialCheck;

    /// Repositories owned by `account`, possibly partial.
    async fn list_repositories(&self, account: &str) -> Result<Vec<RepoRef>>;

    /// Open issues of `repo` in API order. Empty on failure.
    async fn list_open_issues(&self, repo: &RepoRef) -> Result<Vec<Issue>>;

    /// Durable id the deletion mutation needs for `repo#number`.
    async fn resolve_durable_id(&self, repo: &RepoRef, number: u64) -> Result<Option<String>>;

    /// `true` only when the mutation succeeded without any reported error.
    async fn delete_issue(&self, durable_id: &str) -> Result<bool>;
}
