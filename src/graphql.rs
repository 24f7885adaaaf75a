//! GraphQL documents and response shapes for the three lookups the
//! pipeline performs, plus their conversion into domain types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    error::Error,
    types::{
        Candidate, CandidateId, CandidatePage, CheckSuite, DetailedState, MAX_CHECK_SUITES,
        MergeStateStatus, PageInfo, Repo, RepositoryRef, ReviewDecision, ViewerInfo,
    },
};

/// Assignees beyond this many are not fetched.
const MAX_ASSIGNEES: u32 = 10;

pub fn viewer_query() -> serde_json::Value {
    serde_json::json!({
        "query": r#"
            query {
                viewer {
                    login
                    name
                    pullRequests(states: OPEN) {
                        totalCount
                    }
                }
            }
        "#,
        "variables": {}
    })
}

pub fn candidate_page_query(first: u32, after: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "query": r#"
            query($first: Int!, $after: String, $assignees: Int!) {
                viewer {
                    pullRequests(
                        first: $first,
                        after: $after,
                        states: OPEN,
                        orderBy: { field: UPDATED_AT, direction: DESC }
                    ) {
                        nodes {
                            number
                            title
                            url
                            createdAt
                            isDraft
                            repository {
                                name
                                isArchived
                                owner {
                                    login
                                }
                            }
                            assignees(first: $assignees) {
                                nodes {
                                    login
                                }
                            }
                        }
                        pageInfo {
                            hasNextPage
                            endCursor
                        }
                    }
                }
            }
        "#,
        "variables": {
            "first": first,
            "after": after,
            "assignees": MAX_ASSIGNEES,
        }
    })
}

pub fn detailed_state_query(id: &CandidateId) -> serde_json::Value {
    serde_json::json!({
        "query": r#"
            query($owner: String!, $name: String!, $number: Int!, $suites: Int!) {
                repository(owner: $owner, name: $name) {
                    pullRequest(number: $number) {
                        mergeStateStatus
                        reviewDecision
                        commits(last: 1) {
                            nodes {
                                commit {
                                    checkSuites(first: $suites) {
                                        nodes {
                                            status
                                            conclusion
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        "#,
        "variables": {
            "owner": id.repo.owner(),
            "name": id.repo.name(),
            "number": id.number,
            "suites": MAX_CHECK_SUITES,
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ViewerData {
    pub viewer: GraphQLViewer,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLViewer {
    pub login: String,
    pub name: Option<String>,
    pub pull_requests: TotalCount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePageData {
    pub viewer: ViewerPullRequests,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerPullRequests {
    pub pull_requests: PullRequestConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestConnection {
    pub nodes: Vec<GraphQLCandidate>,
    pub page_info: GraphQLPageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLPageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLCandidate {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub is_draft: bool,
    pub repository: GraphQLRepository,
    pub assignees: LoginConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRepository {
    pub name: String,
    pub is_archived: bool,
    pub owner: Login,
}

#[derive(Debug, Deserialize)]
pub struct LoginConnection {
    pub nodes: Vec<Login>,
}

#[derive(Debug, Deserialize)]
pub struct Login {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct DetailedStateData {
    pub repository: Option<DetailRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailRepository {
    pub pull_request: Option<GraphQLDetailedState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLDetailedState {
    pub merge_state_status: MergeStateStatus,
    pub review_decision: Option<ReviewDecision>,
    pub commits: CommitConnection,
}

#[derive(Debug, Deserialize)]
pub struct CommitConnection {
    pub nodes: Vec<CommitNode>,
}

#[derive(Debug, Deserialize)]
pub struct CommitNode {
    pub commit: GraphQLCommit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLCommit {
    pub check_suites: Option<CheckSuiteConnection>,
}

#[derive(Debug, Deserialize)]
pub struct CheckSuiteConnection {
    pub nodes: Vec<CheckSuite>,
}

/// Unwraps the `data` member, turning a GraphQL error list into an
/// [`Error`].
pub fn into_data<T>(response: GraphQLResponse<T>) -> Result<T, Error> {
    if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
        let message = errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let forbidden = errors
            .iter()
            .any(|e| e.kind.as_deref() == Some("FORBIDDEN"));
        return Err(if forbidden {
            Error::AuthRejected(message)
        } else {
            Error::Transport(message)
        });
    }

    response
        .data
        .ok_or_else(|| Error::MalformedResponse("response has neither data nor errors".into()))
}

pub fn convert_viewer(data: ViewerData) -> ViewerInfo {
    ViewerInfo {
        login: data.viewer.login,
        name: data.viewer.name,
        total_open: data.viewer.pull_requests.total_count,
    }
}

pub fn convert_candidate(node: GraphQLCandidate) -> Result<Candidate, Error> {
    let repo = Repo::new(node.repository.owner.login, node.repository.name)
        .map_err(|e| Error::MalformedResponse(format!("{} ({})", e, node.url)))?;

    Ok(Candidate {
        id: CandidateId {
            repo: repo.clone(),
            number: node.number,
        },
        title: node.title,
        url: node.url,
        created_at: node.created_at,
        is_draft: node.is_draft,
        repository: RepositoryRef {
            repo,
            is_archived: node.repository.is_archived,
        },
        assignees: node
            .assignees
            .nodes
            .into_iter()
            .map(|a| a.login)
            .collect::<BTreeSet<_>>(),
    })
}

pub fn convert_candidate_page(data: CandidatePageData) -> Result<CandidatePage, Error> {
    let connection = data.viewer.pull_requests;
    let candidates = connection
        .nodes
        .into_iter()
        .map(convert_candidate)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CandidatePage {
        candidates,
        page_info: PageInfo {
            has_next_page: connection.page_info.has_next_page,
            end_cursor: connection.page_info.end_cursor,
        },
    })
}

/// Extracts the head commit's check suites, truncated to
/// [`MAX_CHECK_SUITES`].
pub fn convert_detailed_state(
    id: &CandidateId,
    data: DetailedStateData,
) -> Result<DetailedState, Error> {
    let detail = data
        .repository
        .ok_or_else(|| Error::MalformedResponse(format!("repository {} not found", id.repo)))?
        .pull_request
        .ok_or_else(|| Error::MalformedResponse(format!("pull request {id} not found")))?;

    let check_suites = detail
        .commits
        .nodes
        .into_iter()
        .last()
        .and_then(|node| node.commit.check_suites)
        .map(|suites| suites.nodes.into_iter().take(MAX_CHECK_SUITES).collect())
        .unwrap_or_default();

    Ok(DetailedState {
        merge_state_status: detail.merge_state_status,
        review_decision: detail.review_decision,
        check_suites,
    })
}
