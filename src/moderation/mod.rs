pub mod classifier;
pub mod ledger;
pub mod moderator;
pub mod schedule;
pub mod startup;

pub use classifier::{classify, Classification, KeywordSet};
pub use ledger::{DedupLedger, SuspicionRecord};
pub use moderator::{IssueOutcome, Moderator, PassReport, RunContext, RunSummary};
pub use schedule::{Backoff, RunPolicy, Schedule};
pub use startup::{authenticate, select_repositories};
