use serde::{Deserialize, Serialize};

/// The account behind a token, from `GET /user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub login: String,
}

/// Outcome of checking a token against the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialCheck {
    pub valid: bool,
    pub account: Option<String>,
}

impl CredentialCheck {
    pub fn valid(account: impl Into<String>) -> Self {
        Self {
            valid: true,
            account: Some(account.into()),
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            account: None,
        }
    }
}
