use crate::error::{Error, Result};
use crate::github::IssueTracker;
use crate::models::RepoRef;

/// Checks the token and returns the account it belongs to.
pub async fn authenticate<T: IssueTracker + ?Sized>(tracker: &T) -> Result<String> {
    let check = tracker.validate_credential().await;
    match (check.valid, check.account) {
        (true, Some(account)) => Ok(account),
        _ => Err(Error::InvalidCredential(
            "the token was rejected or GitHub could not be reached".to_string(),
        )),
    }
}

/// The configured repositories, or every repository of `account` when none
/// are configured.
pub async fn select_repositories<T: IssueTracker + ?Sized>(
    tracker: &T,
    account: &str,
    configured: &[RepoRef],
) -> Result<Vec<RepoRef>> {
    if !configured.is_empty() {
        return Ok(configured.to_vec());
    }

    tracing::info!("No repositories configured, discovering repositories of {}", account);
    let discovered = tracker.list_repositories(account).await?;
    if discovered.is_empty() {
        return Err(Error::NoRepositories(format!(
            "no repositories found for {}",
            account
        )));
    }

    tracing::info!("Found {} repositories", discovered.len());
    Ok(discovered)
}
