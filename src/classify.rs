//! Reduction of merge metadata and check suites into the blocking taxonomy.

use tracing::warn;

use crate::types::{
    BlockingReason, Candidate, CheckConclusion, CheckRollup, CheckSuite, DetailedState,
    MAX_CHECK_SUITES, MergeStateStatus, PullRequest, ReviewDecision, ReviewState,
};

/// Folds check suites left to right into a single rollup.
///
/// Suites that have not completed are ignored. Once a failure is seen the
/// result stays `Failure`; otherwise the last completed suite decides, with
/// any conclusion other than success or failure counting as neutral.
pub fn rollup_check_suites(suites: &[CheckSuite]) -> CheckRollup {
    suites
        .iter()
        .take(MAX_CHECK_SUITES)
        .fold(CheckRollup::Neutral, |acc, suite| {
            if acc == CheckRollup::Failure || !suite.status.is_terminal() {
                return acc;
            }
            match suite.conclusion {
                Some(CheckConclusion::Success) => CheckRollup::Success,
                Some(CheckConclusion::Failure) => CheckRollup::Failure,
                _ => CheckRollup::Neutral,
            }
        })
}

pub fn blocking_reason(state: &DetailedState) -> BlockingReason {
    if rollup_check_suites(&state.check_suites) == CheckRollup::Failure {
        return BlockingReason::FailingTests;
    }

    match state.merge_state_status {
        MergeStateStatus::Behind => BlockingReason::Behind,
        MergeStateStatus::Blocked => BlockingReason::Blocked,
        MergeStateStatus::Clean => BlockingReason::Clean,
        MergeStateStatus::Dirty => BlockingReason::Dirty,
        MergeStateStatus::HasHooks => BlockingReason::HasHooks,
        MergeStateStatus::Unstable => BlockingReason::Unstable,
        MergeStateStatus::Unknown => BlockingReason::Unknown,
        // Only drafts may be blocked by DRAFT; the candidate said otherwise.
        MergeStateStatus::Draft => {
            warn!("Merge state reports DRAFT for a ready pull request");
            BlockingReason::Unknown
        }
    }
}

pub fn review_state(decision: Option<ReviewDecision>) -> ReviewState {
    match decision {
        Some(ReviewDecision::Approved) => ReviewState::Approved,
        Some(ReviewDecision::ChangesRequested) => ReviewState::ChangesRequested,
        Some(ReviewDecision::ReviewRequired | ReviewDecision::Commented) | None => {
            ReviewState::None
        }
    }
}

pub fn classify_draft(candidate: Candidate) -> PullRequest {
    into_pull_request(candidate, ReviewState::Draft, BlockingReason::Draft)
}

pub fn classify_ready(candidate: Candidate, state: &DetailedState) -> PullRequest {
    let review = review_state(state.review_decision);
    let blocked_by = blocking_reason(state);
    into_pull_request(candidate, review, blocked_by)
}

fn into_pull_request(
    candidate: Candidate,
    state: ReviewState,
    blocked_by: BlockingReason,
) -> PullRequest {
    let repo = candidate.repository.repo;
    PullRequest {
        title: candidate.title,
        url: candidate.url,
        repository: repo.name().to_string(),
        org: repo.owner().to_string(),
        created_at: candidate.created_at,
        state,
        blocked_by,
    }
}
