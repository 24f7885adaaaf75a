//! prstatus: open pull requests of the authenticated GitHub user, each
//! classified by review state and by what blocks it from merging.
//!
//! The pipeline pages through the viewer's open pull requests, drops the
//! ones that are archived, assigned elsewhere or out of scope, resolves
//! merge state, review decision and check-suite results concurrently, and
//! groups the classified pull requests by repository.

pub mod aggregate;
pub mod classify;
pub mod cli;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod github;
pub mod graphql;
pub mod query;
pub mod types;

pub use aggregate::{RepositoryGroup, Report};
pub use classify::{blocking_reason, review_state, rollup_check_suites};
pub use cli::parse_args;
pub use error::Error;
pub use fetch::fetch_pages;
pub use filter::{Relevance, RelevanceFilter, SkipReason};
pub use github::{GitHub, get_github_token, setup_github_client};
pub use query::fetch_report;
pub use types::{
    BlockingReason, Candidate, CandidateId, CandidatePage, CheckConclusion, CheckRollup,
    CheckStatus, CheckSuite, DetailedState, DisplayMode, DisplayOptions, Forge, MergeStateStatus,
    PageInfo, Progress, PullRequest, QuerySpec, Repo, RepoError, RepositoryRef, ReviewDecision,
    ReviewState, ViewerInfo,
};
