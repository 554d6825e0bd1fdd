use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::github::IssueTracker;
use crate::models::{Issue, RepoRef};
use crate::moderation::classifier::{classify, KeywordSet};
use crate::moderation::ledger::DedupLedger;
use crate::moderation::schedule::{RunPolicy, Schedule};

/// State carried from one pass to the next.
#[derive(Debug, Default)]
pub struct RunContext {
    pub ledger: DedupLedger,
    pub cancel: CancellationToken,
    pub passes: u64,
}

impl RunContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            ledger: DedupLedger::new(),
            cancel,
            passes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    AlreadyActioned,
    Clean,
    Deleted { keyword: String },
    Unresolved { keyword: String },
    DeleteFailed { keyword: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub repositories: usize,
    pub issues_scanned: usize,
    pub suspicious: usize,
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
    /// Repositories whose issues could not be listed this pass.
    pub skipped_repositories: Vec<String>,
    pub rate_limited: bool,
    pub interrupted: bool,
}

impl PassReport {
    fn begin() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            repositories: 0,
            issues_scanned: 0,
            suspicious: 0,
            deleted: Vec::new(),
            failed: Vec::new(),
            skipped_repositories: Vec::new(),
            rate_limited: false,
            interrupted: false,
        }
    }

    fn record(&mut self, label: String, outcome: &IssueOutcome) {
        match outcome {
            IssueOutcome::AlreadyActioned => return,
            IssueOutcome::Clean => {}
            IssueOutcome::Deleted { .. } => {
                self.suspicious += 1;
                self.deleted.push(label);
            }
            IssueOutcome::Unresolved { .. } | IssueOutcome::DeleteFailed { .. } => {
                self.suspicious += 1;
                self.failed.push(label);
            }
        }
        self.issues_scanned += 1;
    }

    fn note_error(&mut self, err: &Error) {
        match err {
            Error::RateLimited(_) => self.rate_limited = true,
            Error::Cancelled => self.interrupted = true,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub passes: u64,
    /// Passes that ran into an exhausted rate limit.
    pub rate_limited_passes: u64,
    pub deleted: usize,
    pub last_report: Option<PassReport>,
}

pub struct Moderator<T: IssueTracker> {
    tracker: T,
    keywords: KeywordSet,
    repositories: Vec<RepoRef>,
    schedule: Schedule,
}

impl<T: IssueTracker> Moderator<T> {
    pub fn new(
        tracker: T,
        keywords: KeywordSet,
        repositories: Vec<RepoRef>,
        schedule: Schedule,
    ) -> Self {
        Self {
            tracker,
            keywords,
            repositories,
            schedule,
        }
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub async fn run(&self, policy: RunPolicy, ctx: &mut RunContext) -> RunSummary {
        let mut summary = RunSummary::default();

        loop {
            let report = self.run_pass(ctx).await;
            summary.passes += 1;
            summary.deleted += report.deleted.len();
            let rate_limited = report.rate_limited;
            if rate_limited {
                summary.rate_limited_passes += 1;
            }
            summary.last_report = Some(report);

            if policy == RunPolicy::Once || ctx.cancel.is_cancelled() {
                break;
            }

            let delay = if rate_limited {
                let delay = self.schedule.retry.delay();
                tracing::warn!("Check hit the rate limit; retrying in {:?}", delay);
                delay
            } else {
                tracing::info!(
                    "Check complete, next check in {}s",
                    self.schedule.interval.as_secs()
                );
                self.schedule.interval
            };

            if !self.schedule.sleep(delay, &ctx.cancel).await {
                break;
            }
        }

        if policy == RunPolicy::Forever {
            tracing::info!("Monitoring stopped after {} passes", summary.passes);
        }
        summary
    }

    /// One sweep over every configured repository, in order. A repository
    /// or issue that fails, rate limits included, is logged and skipped.
    pub async fn run_pass(&self, ctx: &mut RunContext) -> PassReport {
        ctx.passes += 1;
        let mut report = PassReport::begin();
        tracing::info!(
            "Pass {} checking {} repositories",
            ctx.passes,
            self.repositories.len()
        );

        'repos: for repo in &self.repositories {
            if ctx.cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }

            tracing::info!("Checking repository: {}", repo);
            report.repositories += 1;

            let issues = match self.tracker.list_open_issues(repo).await {
                Ok(issues) => issues,
                Err(e) => {
                    tracing::error!("Failed to list issues for {}: {}", repo, e);
                    report.note_error(&e);
                    report.skipped_repositories.push(repo.to_string());
                    continue;
                }
            };

            for issue in &issues {
                if ctx.cancel.is_cancelled() {
                    report.interrupted = true;
                    break 'repos;
                }

                let outcome = self
                    .moderate_issue(repo, issue, &mut ctx.ledger, &mut report)
                    .await;
                report.record(repo.issue_label(issue.number), &outcome);
            }
        }

        report.finished_at = Utc::now();
        if report.suspicious == 0 {
            tracing::info!("No suspicious issues found");
        }
        report
    }

    /// Classify, resolve, delete, mark. Runs to completion once started.
    async fn moderate_issue(
        &self,
        repo: &RepoRef,
        issue: &Issue,
        ledger: &mut DedupLedger,
        report: &mut PassReport,
    ) -> IssueOutcome {
        if ledger.has(repo, issue.number) {
            return IssueOutcome::AlreadyActioned;
        }

        let verdict = classify(&issue.title, issue.body.as_deref(), &self.keywords);
        let Some(keyword) = verdict.matched_keyword().map(str::to_string) else {
            return IssueOutcome::Clean;
        };

        let label = repo.issue_label(issue.number);
        tracing::warn!("Suspicious issue {}: {}", label, issue.title);
        tracing::warn!("Matched keyword: {}", keyword);

        let durable_id = match self.tracker.resolve_durable_id(repo, issue.number).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::error!("Could not resolve node id for {}", label);
                return IssueOutcome::Unresolved { keyword };
            }
            Err(e) => {
                tracing::error!("Could not resolve node id for {}: {}", label, e);
                report.note_error(&e);
                return IssueOutcome::Unresolved { keyword };
            }
        };

        let deleted = match self.tracker.delete_issue(&durable_id).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::error!("Failed to delete {}: {}", label, e);
                report.note_error(&e);
                false
            }
        };

        if !deleted {
            tracing::error!("Failed to delete issue {}", label);
            return IssueOutcome::DeleteFailed { keyword };
        }

        tracing::info!("Deleted issue {}", label);
        ledger.mark(repo.clone(), issue.number);
        IssueOutcome::Deleted { keyword }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{Error, Result};
    use crate::models::CredentialCheck;

    #[derive(Default)]
    struct FakeTracker {
        issues: HashMap<String, Vec<Issue>>,
        broken_repos: HashSet<String>,
        rate_limited_listings: Mutex<u32>,
        rate_limited_resolves: HashSet<u64>,
        cancelled_listings: HashSet<String>,
        reject_deletes: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTracker {
        fn with_issues(mut self, repo: &str, issues: Vec<Issue>) -> Self {
            self.issues.insert(repo.to_string(), issues);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl IssueTracker for FakeTracker {
        async fn validate_credential(&self) -> CredentialCheck {
            CredentialCheck::valid("octo")
        }

        async fn list_repositories(&self, _account: &str) -> Result<Vec<RepoRef>> {
            Ok(Vec::new())
        }

        async fn list_open_issues(&self, repo: &RepoRef) -> Result<Vec<Issue>> {
            self.log(format!("list {}", repo));
            {
                let mut limited = self.rate_limited_listings.lock().unwrap();
                if *limited > 0 {
                    *limited -= 1;
                    return Err(Error::RateLimited(10));
                }
            }
            if self.cancelled_listings.contains(&repo.to_string()) {
                return Err(Error::Cancelled);
            }
            if self.broken_repos.contains(&repo.to_string()) {
                return Err(Error::GitHubApi("connection reset".to_string()));
            }
            Ok(self.issues.get(&repo.to_string()).cloned().unwrap_or_default())
        }

        async fn resolve_durable_id(&self, repo: &RepoRef, number: u64) -> Result<Option<String>> {
            self.log(format!("resolve {}", repo.issue_label(number)));
            if self.rate_limited_resolves.contains(&number) {
                return Err(Error::RateLimited(60));
            }
            Ok(Some(format!("node-{}", number)))
        }

        async fn delete_issue(&self, durable_id: &str) -> Result<bool> {
            self.log(format!("delete {}", durable_id));
            Ok(!self.reject_deletes)
        }
    }

    fn issue(number: u64, title: &str, body: Option<&str>) -> Issue {
        Issue {
            number,
            title: title.to_string(),
            body: body.map(str::to_string),
            node_id: None,
            pull_request: None,
        }
    }

    fn moderator(tracker: FakeTracker, repos: &[&str]) -> Moderator<FakeTracker> {
        Moderator::new(
            tracker,
            KeywordSet::new(["spam"]).unwrap(),
            repos.iter().map(|r| r.parse().unwrap()).collect(),
            Schedule::new(Duration::from_secs(30)),
        )
    }

    #[tokio::test]
    async fn test_pass_deletes_suspicious_issue() {
        let tracker = FakeTracker::default().with_issues(
            "octo/spoon",
            vec![
                issue(1, "Crash on save", Some("stack trace")),
                issue(2, "SPAM bot activity", None),
            ],
        );
        let moderator = moderator(tracker, &["octo/spoon"]);
        let mut ctx = RunContext::default();

        let report = moderator.run_pass(&mut ctx).await;

        assert_eq!(report.issues_scanned, 2);
        assert_eq!(report.deleted, vec!["octo/spoon#2".to_string()]);
        assert!(ctx.ledger.has(&RepoRef::new("octo", "spoon"), 2));
        assert!(!ctx.ledger.has(&RepoRef::new("octo", "spoon"), 1));
        assert_eq!(
            moderator.tracker().calls(),
            vec!["list octo/spoon", "resolve octo/spoon#2", "delete node-2"]
        );
    }

    #[tokio::test]
    async fn test_ledger_entry_skips_resolve_and_delete() {
        let tracker =
            FakeTracker::default().with_issues("octo/spoon", vec![issue(5, "spam spam", None)]);
        let moderator = moderator(tracker, &["octo/spoon"]);
        let mut ctx = RunContext::default();
        ctx.ledger.mark(RepoRef::new("octo", "spoon"), 5);

        let report = moderator.run_pass(&mut ctx).await;

        assert_eq!(report.issues_scanned, 0);
        assert_eq!(moderator.tracker().calls(), vec!["list octo/spoon"]);
    }

    #[tokio::test]
    async fn test_failed_delete_stays_unmarked() {
        let tracker = FakeTracker {
            reject_deletes: true,
            ..Default::default()
        }
        .with_issues("octo/spoon", vec![issue(8, "spam", None)]);
        let moderator = moderator(tracker, &["octo/spoon"]);
        let mut ctx = RunContext::default();

        let report = moderator.run_pass(&mut ctx).await;
        assert_eq!(report.failed, vec!["octo/spoon#8".to_string()]);
        assert!(ctx.ledger.is_empty());

        // Retried on the next pass.
        moderator.run_pass(&mut ctx).await;
        let deletes = moderator
            .tracker()
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("delete"))
            .count();
        assert_eq!(deletes, 2);
    }

    #[tokio::test]
    async fn test_broken_repository_does_not_stop_pass() {
        let mut tracker = FakeTracker::default()
            .with_issues("octo/good", vec![issue(3, "Free spam stars", None)]);
        tracker.broken_repos.insert("octo/bad".to_string());
        let moderator = moderator(tracker, &["octo/bad", "octo/good"]);
        let mut ctx = RunContext::default();

        let report = moderator
            .run(RunPolicy::Once, &mut ctx)
            .await
            .last_report
            .unwrap();

        assert_eq!(report.repositories, 2);
        assert_eq!(report.deleted, vec!["octo/good#3".to_string()]);
        assert_eq!(report.skipped_repositories, vec!["octo/bad".to_string()]);
        assert!(!report.rate_limited);
        assert_eq!(
            moderator.tracker().calls(),
            vec![
                "list octo/bad",
                "list octo/good",
                "resolve octo/good#3",
                "delete node-3"
            ]
        );
    }

    #[tokio::test]
    async fn test_repositories_and_issues_keep_order() {
        let tracker = FakeTracker::default()
            .with_issues("octo/b", vec![issue(9, "spam", None), issue(2, "spam", None)])
            .with_issues("octo/a", vec![issue(1, "spam", None)]);
        let moderator = moderator(tracker, &["octo/b", "octo/a"]);

        let report = moderator.run_pass(&mut RunContext::default()).await;
        assert_eq!(report.deleted, vec!["octo/b#9", "octo/b#2", "octo/a#1"]);
    }

    #[tokio::test]
    async fn test_cancelled_pass_stops_between_issues() {
        let tracker = FakeTracker::default()
            .with_issues("octo/spoon", vec![issue(1, "spam", None), issue(2, "spam", None)]);
        let moderator = moderator(tracker, &["octo/spoon"]);
        let mut ctx = RunContext::default();
        ctx.cancel.cancel();

        let report = moderator.run_pass(&mut ctx).await;
        assert!(report.interrupted);
        assert!(report.deleted.is_empty());
        assert!(moderator.tracker().calls().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_repository_does_not_stop_single_pass() {
        let tracker = FakeTracker {
            rate_limited_listings: Mutex::new(1),
            ..Default::default()
        }
        .with_issues("octo/healthy", vec![issue(7, "Buy spam here", None)]);
        let moderator = moderator(tracker, &["octo/limited", "octo/healthy"]);
        let mut ctx = RunContext::default();

        let summary = moderator.run(RunPolicy::Once, &mut ctx).await;
        let report = summary.last_report.unwrap();

        assert_eq!(summary.passes, 1);
        assert_eq!(summary.rate_limited_passes, 1);
        assert!(report.rate_limited);
        assert_eq!(report.skipped_repositories, vec!["octo/limited".to_string()]);
        assert_eq!(report.deleted, vec!["octo/healthy#7".to_string()]);
        assert!(ctx.ledger.has(&RepoRef::new("octo", "healthy"), 7));
    }

    #[tokio::test]
    async fn test_rate_limited_resolve_fails_only_that_issue() {
        let tracker = FakeTracker {
            rate_limited_resolves: HashSet::from([1]),
            ..Default::default()
        }
        .with_issues("octo/spoon", vec![issue(1, "spam", None), issue(2, "spam", None)]);
        let moderator = moderator(tracker, &["octo/spoon"]);
        let mut ctx = RunContext::default();

        let report = moderator.run_pass(&mut ctx).await;

        assert!(report.rate_limited);
        assert_eq!(report.failed, vec!["octo/spoon#1".to_string()]);
        assert_eq!(report.deleted, vec!["octo/spoon#2".to_string()]);
        assert!(!ctx.ledger.has(&RepoRef::new("octo", "spoon"), 1));
    }

    #[tokio::test]
    async fn test_cancelled_listing_marks_pass_interrupted() {
        let mut tracker = FakeTracker::default();
        tracker.cancelled_listings.insert("octo/first".to_string());
        let moderator = moderator(tracker, &["octo/first"]);

        let report = moderator.run_pass(&mut RunContext::default()).await;

        assert!(report.interrupted);
        assert!(!report.rate_limited);
        assert_eq!(report.issues_scanned, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forever_uses_cooldown_after_rate_limit() {
        let tracker = FakeTracker {
            rate_limited_listings: Mutex::new(1),
            ..Default::default()
        }
        .with_issues("octo/spoon", vec![issue(4, "spam", None)]);
        let moderator = moderator(tracker, &["octo/spoon"]);
        let mut ctx = RunContext::default();

        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            // Cooldown (10s) fits before this fires, a second interval (30s) does not.
            tokio::time::sleep(Duration::from_secs(35)).await;
            cancel.cancel();
        });

        let summary = moderator.run(RunPolicy::Forever, &mut ctx).await;

        assert_eq!(summary.passes, 2);
        assert_eq!(summary.rate_limited_passes, 1);
        assert_eq!(summary.deleted, 1);
        assert!(ctx.ledger.has(&RepoRef::new("octo", "spoon"), 4));
        let resolves = moderator
            .tracker()
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("resolve"))
            .count();
        assert_eq!(resolves, 1);
    }
}
