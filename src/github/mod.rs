pub mod client;
pub mod graphql;
pub mod paginator;
pub mod rate_limiter;
pub mod tracker;

pub use client::GitHubClient;
pub use paginator::Paginator;
pub use rate_limiter::RateLimiter;
pub use tracker::IssueTracker;
