use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::github::client::GitHubClient;

/// Walks `page=1, 2, ...` until the API returns an empty page.
///
/// A failed page ends the walk and keeps what was gathered so far. Only an
/// exhausted rate limit or a cancelled wait is returned as an error.
pub struct Paginator<'a> {
    github: &'a GitHubClient,
}

impl<'a> Paginator<'a> {
    pub fn new(github: &'a GitHubClient) -> Self {
        Self { github }
    }

    pub async fn fetch_until_empty<T: DeserializeOwned>(
        &self,
        base_url: &str,
        per_page: u32,
    ) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        let mut page = 1;

        loop {
            let separator = if base_url.contains('?') { "&" } else { "?" };
            let url = format!("{}{}per_page={}&page={}", base_url, separator, per_page, page);

            tracing::debug!("Fetching: {}", url);
            let response = match self.github.send_read(&url).await {
                Ok(response) => response,
                Err(e) if e.is_surfaced() => return Err(e),
                Err(e) => {
                    tracing::error!("Request for {} failed: {}", url, e);
                    break;
                }
            };

            let status = response.status();
            if !status.is_success() {
                tracing::error!("Request for {} returned {}", url, status);
                break;
            }

            let items: Vec<T> = match response.json().await {
                Ok(items) => items,
                Err(e) => {
                    tracing::error!("Unreadable page from {}: {}", url, e);
                    break;
                }
            };

            if items.is_empty() {
                break;
            }

            all_items.extend(items);
            page += 1;
        }

        Ok(all_items)
    }
}
