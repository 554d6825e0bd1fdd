//! Typed GraphQL payloads for the mutation endpoint.
//!
//! Issue ids travel as variables, never spliced into the operation text.

use serde::{Deserialize, Serialize};

pub const DELETE_ISSUE_MUTATION: &str = "mutation DeleteIssue($issueId: ID!) { \
deleteIssue(input: { issueId: $issueId }) { clientMutationId } }";

#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest<V> {
    pub query: &'static str,
    pub variables: V,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteIssueVariables {
    pub issue_id: String,
}

pub struct DeleteIssueMutation;

impl DeleteIssueMutation {
    pub fn request(issue_id: &str) -> GraphQlRequest<DeleteIssueVariables> {
        GraphQlRequest {
            query: DELETE_ISSUE_MUTATION,
            variables: DeleteIssueVariables {
                issue_id: issue_id.to_string(),
            },
        }
    }
}

/// A response can carry `errors` next to `data` even with a 200 status.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl GraphQlResponse {
    pub fn errors(&self) -> &[GraphQlError] {
        self.errors.as_deref().unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    pub fn error_summary(&self) -> String {
        self.errors()
            .iter()
            .map(|e| match &e.kind {
                Some(kind) => format!("{} ({})", e.message, kind),
                None => e.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
