use std::collections::HashSet;

use crate::models::RepoRef;

/// Marks an issue as already actioned in this run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SuspicionRecord {
    pub repo: RepoRef,
    pub number: u64,
}

/// Issues actioned during the current process. Never persisted, so a restart
/// evaluates everything again.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<SuspicionRecord>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, repo: &RepoRef, number: u64) -> bool {
        // HashSet lookup needs an owned key; records are small.
        self.seen.contains(&SuspicionRecord {
            repo: repo.clone(),
            number,
        })
    }

    pub fn mark(&mut self, repo: RepoRef, number: u64) {
        self.seen.insert(SuspicionRecord { repo, number });
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
