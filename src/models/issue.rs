use serde::{Deserialize, Serialize};

/// Issue as returned by the REST issues endpoints.
///
/// `number` addresses the issue in read calls; `node_id` is the global id the
/// GraphQL mutation needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
    /// Present when the entry is a pull request rather than an issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}
