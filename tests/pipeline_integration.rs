use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use prstatus::{
    BlockingReason, Candidate, CandidateId, CandidatePage, CheckConclusion, CheckStatus,
    CheckSuite, DetailedState, Error, Forge, MergeStateStatus, PageInfo, Progress, PullRequest,
    QuerySpec, Repo, RepositoryRef, ReviewDecision, ReviewState, ViewerInfo, fetch_report,
};

/// In-memory forge serving fixed pages and detail lookups.
struct MockHub {
    viewer: ViewerInfo,
    pages: Vec<CandidatePage>,
    details: HashMap<CandidateId, DetailedState>,
    delays: HashMap<CandidateId, Duration>,
    fail_viewer: Option<Error>,
    fail_page: Option<(usize, Error)>,
    fail_detail: Option<CandidateId>,
    page_requests: AtomicUsize,
    detail_requests: Mutex<Vec<CandidateId>>,
    completed_lookups: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockHub {
    fn new(viewer: &str, pages: Vec<Vec<Candidate>>) -> Self {
        let total = pages.iter().map(Vec::len).sum();
        let last = pages.len().saturating_sub(1);
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, candidates)| CandidatePage {
                candidates,
                page_info: PageInfo {
                    has_next_page: i < last,
                    end_cursor: Some(format!("cursor-{}", i + 1)),
                },
            })
            .collect();

        Self {
            viewer: ViewerInfo {
                login: viewer.to_string(),
                name: None,
                total_open: total,
            },
            pages,
            details: HashMap::new(),
            delays: HashMap::new(),
            fail_viewer: None,
            fail_page: None,
            fail_detail: None,
            page_requests: AtomicUsize::new(0),
            detail_requests: Mutex::new(Vec::new()),
            completed_lookups: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_detail(mut self, candidate: &Candidate, state: DetailedState) -> Self {
        self.details.insert(candidate.id.clone(), state);
        self
    }

    fn with_delay(mut self, candidate: &Candidate, millis: u64) -> Self {
        self.delays
            .insert(candidate.id.clone(), Duration::from_millis(millis));
        self
    }

    fn detail_requests(&self) -> Vec<CandidateId> {
        self.detail_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Forge for MockHub {
    async fn viewer_info(&self) -> Result<ViewerInfo> {
        if let Some(err) = &self.fail_viewer {
            return Err(err.clone().into());
        }
        Ok(self.viewer.clone())
    }

    async fn fetch_candidate_page(
        &self,
        _first: u32,
        after: Option<&str>,
    ) -> Result<CandidatePage> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        let index = match after {
            None => 0,
            Some(cursor) => cursor
                .strip_prefix("cursor-")
                .and_then(|n| n.parse::<usize>().ok())
                .expect("cursor issued by the mock"),
        };

        if let Some((fail_at, err)) = &self.fail_page
            && *fail_at == index
        {
            return Err(err.clone().into());
        }

        Ok(self.pages[index].clone())
    }

    async fn fetch_detailed_state(&self, id: &CandidateId) -> Result<DetailedState> {
        self.detail_requests.lock().unwrap().push(id.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(id) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_detail.as_ref() == Some(id) {
            return Err(Error::Transport(format!("lookup of {id} failed")).into());
        }

        self.completed_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .details
            .get(id)
            .cloned()
            .unwrap_or_else(|| clean_state(None)))
    }
}

#[derive(Default)]
struct RecordingProgress {
    updates: Mutex<Vec<(usize, usize)>>,
}

impl Progress for RecordingProgress {
    fn update(&self, found: usize, total: usize) {
        self.updates.lock().unwrap().push((found, total));
    }
}

fn candidate(repo: &str, number: u64) -> Candidate {
    let repo = Repo::parse(repo).unwrap();
    Candidate {
        id: CandidateId {
            repo: repo.clone(),
            number,
        },
        title: format!("Change {number}"),
        url: format!("https://github.com/{repo}/pull/{number}"),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        is_draft: false,
        repository: RepositoryRef {
            repo,
            is_archived: false,
        },
        assignees: BTreeSet::new(),
    }
}

fn draft(repo: &str, number: u64) -> Candidate {
    Candidate {
        is_draft: true,
        ..candidate(repo, number)
    }
}

fn archived(repo: &str, number: u64) -> Candidate {
    let mut c = candidate(repo, number);
    c.repository.is_archived = true;
    c
}

fn assigned(repo: &str, number: u64, assignees: &[&str]) -> Candidate {
    Candidate {
        assignees: assignees.iter().map(|a| a.to_string()).collect(),
        ..candidate(repo, number)
    }
}

fn suite(status: CheckStatus, conclusion: Option<CheckConclusion>) -> CheckSuite {
    CheckSuite { status, conclusion }
}

fn clean_state(review: Option<ReviewDecision>) -> DetailedState {
    DetailedState {
        merge_state_status: MergeStateStatus::Clean,
        review_decision: review,
        check_suites: vec![suite(
            CheckStatus::Completed,
            Some(CheckConclusion::Success),
        )],
    }
}

fn urls(prs: &[&PullRequest]) -> Vec<String> {
    prs.iter().map(|pr| pr.url.clone()).collect()
}

#[tokio::test]
async fn test_draft_and_failing_pull_requests() {
    let pr1 = draft("acme/widgets", 1);
    let pr2 = candidate("acme/widgets", 2);
    let hub = MockHub::new("carol", vec![vec![pr1.clone(), pr2.clone()]])
        .with_detail(
            &pr1,
            DetailedState {
                merge_state_status: MergeStateStatus::Clean,
                review_decision: Some(ReviewDecision::Approved),
                check_suites: vec![],
            },
        )
        .with_detail(
            &pr2,
            DetailedState {
                merge_state_status: MergeStateStatus::Clean,
                review_decision: Some(ReviewDecision::ChangesRequested),
                check_suites: vec![
                    suite(CheckStatus::Completed, Some(CheckConclusion::Failure)),
                    suite(CheckStatus::Completed, Some(CheckConclusion::Success)),
                ],
            },
        );

    let report = fetch_report(&QuerySpec::default(), &hub, &()).await.unwrap();

    let prs = report.get("acme/widgets").unwrap();
    assert_eq!(prs.len(), 2);
    assert_eq!(prs[0].url, pr1.url);
    assert_eq!(prs[0].state, ReviewState::Draft);
    assert_eq!(prs[0].blocked_by, BlockingReason::Draft);
    assert_eq!(prs[1].url, pr2.url);
    assert_eq!(prs[1].state, ReviewState::ChangesRequested);
    assert_eq!(prs[1].blocked_by, BlockingReason::FailingTests);

    // Drafts are never looked up.
    assert_eq!(hub.detail_requests(), vec![pr2.id.clone()]);
}

#[tokio::test]
async fn test_pagination_requests_each_page_once() {
    let pages = vec![
        vec![candidate("acme/a", 1), candidate("acme/a", 2)],
        vec![candidate("acme/b", 3), candidate("acme/a", 4)],
        vec![candidate("acme/c", 5)],
    ];
    let hub = MockHub::new("carol", pages);

    let report = fetch_report(&QuerySpec::default(), &hub, &()).await.unwrap();

    assert_eq!(hub.page_requests.load(Ordering::SeqCst), 3);
    assert_eq!(report.len(), 5);
    assert_eq!(report.skipped(), 0);

    let repos: Vec<&str> = report
        .repositories()
        .map(|g| g.repository.as_str())
        .collect();
    assert_eq!(repos, vec!["acme/a", "acme/b", "acme/c"]);
    let numbers: Vec<&str> = report
        .get("acme/a")
        .unwrap()
        .iter()
        .map(|pr| pr.title.as_str())
        .collect();
    assert_eq!(numbers, vec!["Change 1", "Change 2", "Change 4"]);
}

#[tokio::test]
async fn test_single_page_stops_after_one_request() {
    let hub = MockHub::new("carol", vec![vec![candidate("acme/a", 1)]]);

    fetch_report(&QuerySpec::default(), &hub, &()).await.unwrap();

    assert_eq!(hub.page_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_irrelevant_candidates_are_skipped_and_counted() {
    let pages = vec![
        vec![
            archived("acme/old", 1),
            assigned("acme/widgets", 2, &["alice", "bob"]),
            assigned("acme/widgets", 3, &[]),
        ],
        vec![
            assigned("acme/widgets", 4, &["bob", "carol"]),
            candidate("elsewhere/tool", 5),
            archived("elsewhere/tool", 6),
        ],
    ];
    let hub = MockHub::new("carol", pages);
    let spec = QuerySpec {
        orgs: vec!["acme".to_string()],
        ..QuerySpec::default()
    };

    let report = fetch_report(&spec, &hub, &()).await.unwrap();

    let shown: Vec<&PullRequest> = report.pull_requests().collect();
    assert_eq!(
        urls(&shown),
        vec![
            "https://github.com/acme/widgets/pull/3",
            "https://github.com/acme/widgets/pull/4",
        ]
    );
    // Two archived, one reassigned, one out of scope.
    assert_eq!(report.skipped(), 4);
    assert!(report.get("acme/old").is_none());
    assert_eq!(hub.detail_requests().len(), 2);
}

#[tokio::test]
async fn test_out_of_order_lookups_keep_discovery_order() {
    let candidates: Vec<Candidate> = (1..=6).map(|n| candidate("acme/widgets", n)).collect();
    let mut hub = MockHub::new("carol", vec![candidates.clone()]);
    // Earlier pull requests resolve last.
    for (i, c) in candidates.iter().enumerate() {
        hub = hub.with_delay(c, 10 * (6 - i as u64));
    }
    let spec = QuerySpec {
        max_concurrent: 3,
        ..QuerySpec::default()
    };

    let report = fetch_report(&spec, &hub, &()).await.unwrap();

    let shown: Vec<&PullRequest> = report.pull_requests().collect();
    let expected: Vec<String> = candidates.iter().map(|c| c.url.clone()).collect();
    assert_eq!(urls(&shown), expected);

    let max = hub.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "at most 3 lookups in flight, saw {max}");
    assert!(max > 1, "lookups should overlap, saw {max}");
}

#[tokio::test]
async fn test_failed_lookup_aborts_run_and_cancels_in_flight() {
    let slow: Vec<Candidate> = (1..=4).map(|n| candidate("acme/widgets", n)).collect();
    let broken = candidate("acme/widgets", 5);
    let mut pages = slow.clone();
    pages.push(broken.clone());

    let mut hub = MockHub::new("carol", vec![pages]);
    for c in &slow {
        hub = hub.with_delay(c, 200);
    }
    hub.fail_detail = Some(broken.id.clone());

    let err = fetch_report(&QuerySpec::default(), &hub, &())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::Transport(_))
    ));
    assert_eq!(hub.completed_lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_auth_failure_on_page_aborts_before_lookups() {
    let mut hub = MockHub::new(
        "carol",
        vec![vec![candidate("acme/a", 1)], vec![candidate("acme/a", 2)]],
    );
    hub.fail_page = Some((1, Error::AuthRejected("Bad credentials".to_string())));

    let err = fetch_report(&QuerySpec::default(), &hub, &())
        .await
        .unwrap_err();

    assert!(err.downcast_ref::<Error>().is_some_and(Error::is_auth));
    assert_eq!(hub.page_requests.load(Ordering::SeqCst), 2);
    assert!(hub.detail_requests().is_empty());
}

#[tokio::test]
async fn test_auth_failure_on_viewer_lookup() {
    let mut hub = MockHub::new("carol", vec![vec![candidate("acme/a", 1)]]);
    hub.fail_viewer = Some(Error::AuthRejected("token expired".to_string()));

    let err = fetch_report(&QuerySpec::default(), &hub, &())
        .await
        .unwrap_err();

    assert!(err.downcast_ref::<Error>().is_some_and(Error::is_auth));
    assert_eq!(hub.page_requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_cursor_is_malformed() {
    let mut hub = MockHub::new(
        "carol",
        vec![vec![candidate("acme/a", 1)], vec![candidate("acme/a", 2)]],
    );
    hub.pages[0].page_info.end_cursor = None;

    let err = fetch_report(&QuerySpec::default(), &hub, &())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::MalformedResponse(_))
    ));
    assert_eq!(hub.page_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rerun_yields_identical_report() {
    let pages = vec![
        vec![draft("acme/a", 1), candidate("acme/b", 2)],
        vec![candidate("acme/a", 3)],
    ];
    let hub = MockHub::new("carol", pages)
        .with_detail(&candidate("acme/b", 2), clean_state(Some(ReviewDecision::Approved)));

    let first = fetch_report(&QuerySpec::default(), &hub, &()).await.unwrap();
    let second = fetch_report(&QuerySpec::default(), &hub, &()).await.unwrap();

    let first: Vec<PullRequest> = first.pull_requests().cloned().collect();
    let second: Vec<PullRequest> = second.pull_requests().cloned().collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_duplicate_urls_across_pages_collapse() {
    let pr = candidate("acme/widgets", 8);
    let mut retitled = pr.clone();
    retitled.title = "Change 8 (edited)".to_string();
    let hub = MockHub::new("carol", vec![vec![pr.clone()], vec![retitled]]);
    let progress = RecordingProgress::default();

    let report = fetch_report(&QuerySpec::default(), &hub, &progress)
        .await
        .unwrap();

    assert_eq!(report.len(), 1);
    assert_eq!(report.get("acme/widgets").unwrap()[0].title, "Change 8");
    assert_eq!(hub.detail_requests().len(), 1);
    let updates = progress.updates.lock().unwrap().clone();
    assert_eq!(updates.len(), 1);
}

#[tokio::test]
async fn test_progress_counts_every_candidate() {
    let pages = vec![
        vec![draft("acme/a", 1), archived("acme/a", 2)],
        vec![candidate("acme/a", 3), candidate("acme/a", 4)],
    ];
    let hub = MockHub::new("carol", pages);
    let progress = RecordingProgress::default();

    fetch_report(&QuerySpec::default(), &hub, &progress)
        .await
        .unwrap();

    let updates = progress.updates.lock().unwrap().clone();
    assert_eq!(updates.len(), 4);
    assert_eq!(updates.last(), Some(&(4, 4)));
    let founds: Vec<usize> = updates.iter().map(|(found, _)| *found).collect();
    assert_eq!(founds, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_no_open_pull_requests() {
    let hub = MockHub::new("carol", vec![vec![]]);

    let report = fetch_report(&QuerySpec::default(), &hub, &()).await.unwrap();

    assert!(report.is_empty());
    assert_eq!(report.skipped(), 0);
    assert_eq!(report.viewer().login, "carol");
    assert_eq!(hub.page_requests.load(Ordering::SeqCst), 1);
}
