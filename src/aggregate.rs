use std::collections::{HashMap, HashSet};

use crate::types::{PullRequest, ViewerInfo};

/// Pull requests of one repository, in the order they were reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryGroup {
    /// `owner/name`
    pub repository: String,
    pub pull_requests: Vec<PullRequest>,
}

/// Classified pull requests grouped by repository.
///
/// Repositories iterate in first-seen order. A pull request whose URL is
/// already present is dropped, whatever its other fields say.
#[derive(Debug, Clone)]
pub struct Report {
    viewer: ViewerInfo,
    groups: Vec<RepositoryGroup>,
    index: HashMap<String, usize>,
    seen_urls: HashSet<String>,
    skipped: usize,
}

impl Report {
    pub fn new(viewer: ViewerInfo) -> Self {
        Self {
            viewer,
            groups: Vec::new(),
            index: HashMap::new(),
            seen_urls: HashSet::new(),
            skipped: 0,
        }
    }

    /// Returns `false` when a pull request with the same URL was already
    /// added.
    pub fn insert(&mut self, pr: PullRequest) -> bool {
        if !self.seen_urls.insert(pr.url.clone()) {
            return false;
        }

        let key = format!("{}/{}", pr.org, pr.repository);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.groups.push(RepositoryGroup {
                    repository: key.clone(),
                    pull_requests: Vec::new(),
                });
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        self.groups[slot].pull_requests.push(pr);
        true
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Number of candidates filtered out of the report.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn viewer(&self) -> &ViewerInfo {
        &self.viewer
    }

    /// Number of pull requests in the report.
    pub fn len(&self) -> usize {
        self.seen_urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_urls.is_empty()
    }

    pub fn repositories(&self) -> impl Iterator<Item = &RepositoryGroup> {
        self.groups.iter()
    }

    pub fn get(&self, repository: &str) -> Option<&[PullRequest]> {
        self.index
            .get(repository)
            .map(|&slot| self.groups[slot].pull_requests.as_slice())
    }

    pub fn pull_requests(&self) -> impl Iterator<Item = &PullRequest> {
        self.groups.iter().flat_map(|group| group.pull_requests.iter())
    }
}
