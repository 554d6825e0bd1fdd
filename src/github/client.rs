use async_trait::async_trait;
use reqwest::{header, Client, Response};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::github::graphql::{DeleteIssueMutation, GraphQlResponse};
use crate::github::paginator::Paginator;
use crate::github::rate_limiter::RateLimiter;
use crate::github::tracker::IssueTracker;
use crate::models::{AuthenticatedUser, CredentialCheck, Issue, RepoRef, Repository};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PER_PAGE: u32 = 100;

pub struct GitHubClient {
    client: Client,
    rate_limiter: RateLimiter,
    graphql_limiter: RateLimiter,
    base_url: String,
    graphql_url: String,
    read_auth: header::HeaderValue,
    mutation_auth: header::HeaderValue,
}

impl GitHubClient {
    pub fn new(token: &str, cancel: CancellationToken) -> Result<Self> {
        Self::with_base_url(token, DEFAULT_API_URL, cancel)
    }

    /// Client whose REST and GraphQL endpoints both live under `base_url`.
    /// Rate-limit waits end early once `cancel` fires.
    pub fn with_base_url(token: &str, base_url: &str, cancel: CancellationToken) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("issuewarden/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        // The REST API takes the `token` scheme, the GraphQL endpoint `bearer`.
        let mut read_auth = header::HeaderValue::from_str(&format!("token {}", token))?;
        read_auth.set_sensitive(true);
        let mut mutation_auth = header::HeaderValue::from_str(&format!("bearer {}", token))?;
        mutation_auth.set_sensitive(true);

        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            // GraphQL has its own point budget, separate from the REST quota.
            rate_limiter: RateLimiter::with_cancellation(cancel.clone()),
            graphql_limiter: RateLimiter::with_cancellation(cancel),
            graphql_url: format!("{}/graphql", base_url),
            base_url,
            read_auth,
            mutation_auth,
        })
    }

    /// Authenticated GET against the REST API.
    pub(crate) async fn send_read(&self, url: &str) -> Result<Response> {
        if !self.rate_limiter.wait().await {
            return Err(Error::Cancelled);
        }

        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, self.read_auth.clone())
            .header(header::ACCEPT, "application/vnd.github.v3+json")
            .send()
            .await?;
        self.rate_limiter.update_from_response(&response);

        if let Some(retry_after) = RateLimiter::exhausted(&response) {
            return Err(Error::RateLimited(retry_after));
        }

        Ok(response)
    }

    pub async fn get_authenticated_user(&self) -> Result<AuthenticatedUser> {
        let url = format!("{}/user", self.base_url);
        let response = self.send_read(&url).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::InvalidCredential(format!("{} - {}", status, body)));
        }

        Ok(response.json().await?)
    }
}

/// Degrades `err` into `fallback` unless the caller has to see it.
fn soften<T>(err: Error, context: &str, fallback: T) -> Result<T> {
    if err.is_surfaced() {
        return Err(err);
    }
    tracing::error!("{}: {}", context, err);
    Ok(fallback)
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn validate_credential(&self) -> CredentialCheck {
        match self.get_authenticated_user().await {
            Ok(user) => {
                tracing::info!("Token is valid, authenticated as {}", user.login);
                CredentialCheck::valid(user.login)
            }
            Err(e) => {
                tracing::error!("Token validation failed: {}", e);
                CredentialCheck::invalid()
            }
        }
    }

    async fn list_repositories(&self, account: &str) -> Result<Vec<RepoRef>> {
        let url = format!("{}/users/{}/repos", self.base_url, account);
        tracing::info!("Fetching repositories for: {}", account);

        let repos: Vec<Repository> = Paginator::new(self)
            .fetch_until_empty(&url, PER_PAGE)
            .await?;

        Ok(repos
            .iter()
            .filter_map(|repo| match repo.repo_ref() {
                Ok(repo_ref) => Some(repo_ref),
                Err(e) => {
                    tracing::warn!("Skipping repository {}: {}", repo.name, e);
                    None
                }
            })
            .collect())
    }

    async fn list_open_issues(&self, repo: &RepoRef) -> Result<Vec<Issue>> {
        let url = format!(
            "{}/repos/{}/{}/issues?state=open",
            self.base_url,
            repo.owner(),
            repo.name()
        );
        tracing::debug!("Fetching open issues for: {}", repo);

        let entries: Vec<Issue> = Paginator::new(self)
            .fetch_until_empty(&url, PER_PAGE)
            .await?;

        Ok(entries
            .into_iter()
            .filter(|issue| !issue.is_pull_request())
            .collect())
    }

    async fn resolve_durable_id(&self, repo: &RepoRef, number: u64) -> Result<Option<String>> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}",
            self.base_url,
            repo.owner(),
            repo.name(),
            number
        );
        let context = format!("Failed to look up {}", repo.issue_label(number));

        let response = match self.send_read(&url).await {
            Ok(response) => response,
            Err(e) => return soften(e, &context, None),
        };

        if !response.status().is_success() {
            tracing::error!("{}: {}", context, response.status());
            return Ok(None);
        }

        match response.json::<Issue>().await {
            Ok(issue) => Ok(issue.node_id.filter(|id| !id.is_empty())),
            Err(e) => soften(e.into(), &context, None),
        }
    }

    async fn delete_issue(&self, durable_id: &str) -> Result<bool> {
        if !self.graphql_limiter.wait().await {
            return Err(Error::Cancelled);
        }
        let context = format!("Failed to delete issue {}", durable_id);

        let sent = self
            .client
            .post(&self.graphql_url)
            .header(header::AUTHORIZATION, self.mutation_auth.clone())
            .json(&DeleteIssueMutation::request(durable_id))
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => return soften(e.into(), &context, false),
        };
        self.graphql_limiter.update_from_response(&response);

        if let Some(retry_after) = RateLimiter::exhausted(&response) {
            return Err(Error::RateLimited(retry_after));
        }

        let status = response.status();
        let payload: GraphQlResponse = match response.json().await {
            Ok(payload) => payload,
            Err(e) => return soften(e.into(), &context, false),
        };

        if payload.has_errors() {
            tracing::error!("{}: {}", context, payload.error_summary());
            return Ok(false);
        }

        if !status.is_success() {
            tracing::error!("{}: {}", context, status);
            return Ok(false);
        }

        Ok(true)
    }
}
