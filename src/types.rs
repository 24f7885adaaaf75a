use std::{collections::BTreeSet, fmt};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Default number of pull requests requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// GitHub rejects connection sizes above this.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default upper bound on concurrent detail lookups.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Only the first this-many check suites of the head commit are inspected.
pub const MAX_CHECK_SUITES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    #[error("repository must not be empty")]
    Empty,
    #[error("repository must be in format 'owner/repo', got: '{0}'")]
    InvalidFormat(String),
    #[error("not a GitHub repository URL: '{0}'")]
    InvalidUrl(String),
}

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();
        if owner.trim().is_empty() || name.trim().is_empty() {
            return Err(RepoError::Empty);
        }
        if owner.contains('/') || name.contains('/') {
            return Err(RepoError::InvalidFormat(format!("{owner}/{name}")));
        }
        Ok(Self { owner, name })
    }

    /// Parses `owner/repo`.
    pub fn parse(s: &str) -> Result<Self, RepoError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RepoError::Empty);
        }
        match s.split_once('/') {
            Some((owner, name)) if !name.contains('/') => Self::new(owner, name)
                .map_err(|_| RepoError::InvalidFormat(s.to_string())),
            _ => Err(RepoError::InvalidFormat(s.to_string())),
        }
    }

    /// Parses `https://github.com/owner/repo[/...]`.
    pub fn parse_url(s: &str) -> Result<Self, RepoError> {
        let url = url::Url::parse(s).map_err(|_| RepoError::InvalidUrl(s.to_string()))?;
        if url.host_str() != Some("github.com") {
            return Err(RepoError::InvalidUrl(s.to_string()));
        }
        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        match segments.as_slice() {
            [owner, name, ..] => {
                Self::new(*owner, *name).map_err(|_| RepoError::InvalidUrl(s.to_string()))
            }
            _ => Err(RepoError::InvalidUrl(s.to_string())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The (owner, repo, number) triple that keys both a candidate and its
/// detail lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateId {
    pub repo: Repo,
    pub number: u64,
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub repo: Repo,
    pub is_archived: bool,
}

/// A pull request discovered by pagination, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: CandidateId,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub is_draft: bool,
    pub repository: RepositoryRef,
    pub assignees: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// One page of the viewer's open pull requests.
#[derive(Debug, Clone)]
pub struct CandidatePage {
    pub candidates: Vec<Candidate>,
    pub page_info: PageInfo,
}

/// The authenticated identity the report is built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerInfo {
    pub login: String,
    pub name: Option<String>,
    pub total_open: usize,
}

impl ViewerInfo {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.login)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStateStatus {
    Behind,
    Blocked,
    Clean,
    Dirty,
    Draft,
    HasHooks,
    Unstable,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    ChangesRequested,
    ReviewRequired,
    #[serde(other)]
    Commented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    #[serde(other)]
    Pending,
}

impl CheckStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    TimedOut,
    ActionRequired,
    Skipped,
    Stale,
    StartupFailure,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CheckSuite {
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
}

/// Merge, review and CI detail for a non-draft candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailedState {
    pub merge_state_status: MergeStateStatus,
    pub review_decision: Option<ReviewDecision>,
    pub check_suites: Vec<CheckSuite>,
}

/// Single-value reduction of a pull request's check suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckRollup {
    Success,
    Failure,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewState {
    Draft,
    Approved,
    ChangesRequested,
    None,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::Draft => "DRAFT",
            ReviewState::Approved => "APPROVED",
            ReviewState::ChangesRequested => "CHANGES_REQUESTED",
            ReviewState::None => "none",
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a pull request is not (yet) mergeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockingReason {
    Dirty,
    Unknown,
    Blocked,
    Behind,
    Draft,
    Unstable,
    FailingTests,
    HasHooks,
    Clean,
}

impl BlockingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockingReason::Dirty => "DIRTY",
            BlockingReason::Unknown => "UNKNOWN",
            BlockingReason::Blocked => "BLOCKED",
            BlockingReason::Behind => "BEHIND",
            BlockingReason::Draft => "DRAFT",
            BlockingReason::Unstable => "UNSTABLE",
            BlockingReason::FailingTests => "FAILING_TESTS",
            BlockingReason::HasHooks => "HAS_HOOKS",
            BlockingReason::Clean => "CLEAN",
        }
    }
}

impl fmt::Display for BlockingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified pull request, the unit of the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub title: String,
    pub url: String,
    pub repository: String,
    pub org: String,
    pub created_at: DateTime<Utc>,
    pub state: ReviewState,
    pub blocked_by: BlockingReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Normal,
    Quiet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub mode: DisplayMode,
    pub truncate_titles: bool,
}

/// Caller-side configuration of a pipeline run.
///
/// `orgs` and `repos` restrict the report to a scope; when both are empty
/// every repository is in scope.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub orgs: Vec<String>,
    pub repos: Vec<Repo>,
    pub page_size: u32,
    pub max_concurrent: usize,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            orgs: Vec::new(),
            repos: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl QuerySpec {
    pub fn in_scope(&self, repo: &Repo) -> bool {
        if self.orgs.is_empty() && self.repos.is_empty() {
            return true;
        }
        self.orgs
            .iter()
            .any(|org| org.eq_ignore_ascii_case(repo.owner()))
            || self.repos.iter().any(|r| {
                r.owner().eq_ignore_ascii_case(repo.owner())
                    && r.name().eq_ignore_ascii_case(repo.name())
            })
    }

    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn effective_max_concurrent(&self) -> usize {
        self.max_concurrent.max(1)
    }
}

/// Source of pull request data.
///
/// Each method is one round-trip to the hosting service. Implementations
/// report failures as [`crate::Error`] wrapped in `anyhow::Error`.
#[async_trait]
pub trait Forge: Send + Sync {
    async fn viewer_info(&self) -> anyhow::Result<ViewerInfo>;

    /// Fetches one page of the viewer's open pull requests, most recently
    /// updated first.
    async fn fetch_candidate_page(
        &self,
        first: u32,
        after: Option<&str>,
    ) -> anyhow::Result<CandidatePage>;

    async fn fetch_detailed_state(&self, id: &CandidateId) -> anyhow::Result<DetailedState>;
}

/// Receives `found/total` counters while the report is assembled.
pub trait Progress: Send + Sync {
    fn update(&self, found: usize, total: usize);
}

impl Progress for () {
    fn update(&self, _found: usize, _total: usize) {}
}
