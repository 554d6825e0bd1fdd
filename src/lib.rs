pub mod config;
pub mod error;
pub mod github;
pub mod models;
pub mod moderation;

pub use config::{ConfigProvider, EnvConfig, FileConfig, Settings};
pub use error::{Error, Result};
pub use github::{GitHubClient, IssueTracker};
pub use moderation::{Moderator, RunContext, RunPolicy, Schedule};
pub use tokio_util::sync::CancellationToken;
