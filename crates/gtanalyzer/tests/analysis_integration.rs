//! Integration tests for the repository analysis engine.
//!
//! A scripted in-memory `RepositorySource` stands in for GitHub. Scenarios:
//! - Dispatch acknowledges immediately with one combination per entity
//! - Every entity lands in the store exactly once, in submission order
//! - Branch, collaborator, commit-list and PR-list failures fail fast and skip later stages
//! - Data from non-collaborators never reaches the report
//! - Enrichment failures (stats, PR detail) keep the entity successful
//! - Cancellation, panics and timeouts are reported through the handle

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use gtanalyzer::analysis::{
    AnalysisParams, AnalysisProgress, BatchRequest, CANCELLED_ERROR, DispatchError, Dispatcher,
    EntityAnalyzer, EntityRef, EntityResult, ProgressCallback, RepositoryAnalyzer,
    RepositoryReport, ResultPoller, WorkerState,
};
use gtanalyzer::platform::{
    Commit, CommitStats, DateWindow, PullRequest, PullRequestDetail, RepositorySource,
    UpstreamError,
};
use gtanalyzer::store::ProgressStore;
use serde_json::json;

/// Upper bound for any batch to drain in these tests.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const TTL: Duration = Duration::from_secs(3600);

// ─── Fixtures ──────────────────────────────────────────────────────────────────

#[derive(Default, Clone)]
struct RepoFixture {
    /// `None` makes the call fail as rate limited.
    branches: Option<Vec<String>>,
    collaborators: Option<Vec<String>>,
    /// Fail the commit listing of every branch as rate limited.
    commits_fail: bool,
    /// Fail the pull request listing as rate limited.
    pulls_fail: bool,
    commits: HashMap<String, Vec<Commit>>,
    stats: HashMap<String, CommitStats>,
    pulls: Vec<PullRequest>,
    details: HashMap<u64, PullRequestDetail>,
}

impl RepoFixture {
    fn new(branches: &[&str], collaborators: &[&str]) -> Self {
        Self {
            branches: Some(branches.iter().map(|b| b.to_string()).collect()),
            collaborators: Some(collaborators.iter().map(|c| c.to_string()).collect()),
            ..Self::default()
        }
    }

    fn commit(mut self, branch: &str, sha: &str, author: &str, stats: Option<(u64, u64)>) -> Self {
        self.commits
            .entry(branch.to_string())
            .or_default()
            .push(commit(sha, author));
        if let Some((additions, deletions)) = stats {
            self.stats.insert(
                sha.to_string(),
                CommitStats {
                    additions,
                    deletions,
                    total: additions + deletions,
                },
            );
        }
        self
    }

    fn pull(mut self, pr: PullRequest, detail: bool) -> Self {
        if detail {
            self.details.insert(pr.number, pr_detail(pr.number));
        }
        self.pulls.push(pr);
        self
    }
}

/// Scripted source keyed by repository name; records every call.
#[derive(Clone, Default)]
struct FakeGitHub {
    repos: HashMap<String, RepoFixture>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeGitHub {
    fn with_repo(mut self, name: &str, fixture: RepoFixture) -> Self {
        self.repos.insert(name.to_string(), fixture);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn repo(&self, repo: &str) -> Result<&RepoFixture, UpstreamError> {
        self.repos
            .get(repo)
            .ok_or_else(|| UpstreamError::not_found(repo.to_string()))
    }
}

#[async_trait]
impl RepositorySource for FakeGitHub {
    async fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<String>, UpstreamError> {
        self.log(format!("branches {owner}/{repo}"));
        self.repo(repo)?
            .branches
            .clone()
            .ok_or_else(UpstreamError::rate_limited)
    }

    async fn list_collaborators(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<String>, UpstreamError> {
        self.log(format!("collaborators {owner}/{repo}"));
        self.repo(repo)?
            .collaborators
            .clone()
            .ok_or_else(UpstreamError::rate_limited)
    }

    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        window: &DateWindow,
    ) -> Result<Vec<Commit>, UpstreamError> {
        self.log(format!(
            "commits {owner}/{repo}@{branch} {:?}..{:?}",
            window.since, window.until
        ));
        let fixture = self.repo(repo)?;
        if fixture.commits_fail {
            return Err(UpstreamError::rate_limited());
        }
        Ok(fixture.commits.get(branch).cloned().unwrap_or_default())
    }

    async fn commit_stats(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CommitStats, UpstreamError> {
        self.log(format!("stats {owner}/{repo}#{sha}"));
        self.repo(repo)?
            .stats
            .get(sha)
            .copied()
            .ok_or_else(|| UpstreamError::api(500, "stats unavailable"))
    }

    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<PullRequest>, UpstreamError> {
        self.log(format!("pulls {owner}/{repo}"));
        let fixture = self.repo(repo)?;
        if fixture.pulls_fail {
            return Err(UpstreamError::rate_limited());
        }
        Ok(fixture.pulls.clone())
    }

    async fn pr_detail(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequestDetail, UpstreamError> {
        self.log(format!("pr_detail {owner}/{repo}#{number}"));
        self.repo(repo)?
            .details
            .get(&number)
            .cloned()
            .ok_or_else(|| UpstreamError::not_found(format!("pull {number}")))
    }
}

fn commit(sha: &str, author: &str) -> Commit {
    Commit {
        sha: sha.to_string(),
        author: Some(author.to_string()),
        message: format!("change {sha}"),
        comment_count: 0,
        url: format!("https://github.com/org/repo/commit/{sha}"),
        date: Some("2024-01-05T10:00:00Z".to_string()),
    }
}

fn pull(number: u64, head: &str, base: &str, author: &str) -> PullRequest {
    PullRequest {
        number,
        head_branch: head.to_string(),
        base_branch: base.to_string(),
        author: Some(author.to_string()),
        assignees: Vec::new(),
        reviewers: Vec::new(),
        created_at: Some("2024-01-06T10:00:00Z".to_string()),
        closed_at: None,
        merged_at: None,
    }
}

fn pr_detail(number: u64) -> PullRequestDetail {
    PullRequestDetail {
        number,
        comments: 1,
        review_comments: 2,
        commits: 3,
        additions: 40,
        deletions: 5,
        changed_files: 4,
        created_at: Some("2024-01-06T10:00:00Z".to_string()),
        closed_at: None,
        merged_at: None,
    }
}

fn batch(names: &[&str]) -> BatchRequest {
    BatchRequest::new(
        names.iter().map(|n| EntityRef::new(*n)).collect(),
        AnalysisParams::for_owner("org"),
    )
}

fn engine(
    source: FakeGitHub,
) -> (
    Dispatcher<RepositoryAnalyzer<FakeGitHub>>,
    Arc<ProgressStore<RepositoryReport>>,
) {
    let store = Arc::new(ProgressStore::new(TTL));
    let dispatcher = Dispatcher::new(
        Arc::new(RepositoryAnalyzer::new(source)),
        Arc::clone(&store),
    );
    (dispatcher, store)
}

fn report_of(result: &EntityResult<RepositoryReport>) -> &RepositoryReport {
    result
        .success()
        .unwrap_or_else(|| panic!("expected success, got {result:?}"))
}

// ─── Engine behavior ───────────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_scenario_matches_expected_documents() {
    let source = FakeGitHub::default()
        .with_repo(
            "repoA",
            RepoFixture::new(&["main"], &["alice"]).commit("main", "c1", "alice", Some((3, 1))),
        )
        .with_repo(
            "repoB",
            RepoFixture {
                branches: None,
                ..RepoFixture::new(&[], &[])
            },
        );
    let calls = source.clone();
    let (dispatcher, store) = engine(source);

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA", "repoB"])).unwrap();
    assert!(ack.saved);
    assert_eq!(ack.combinations, 2);
    assert!(!ack.request_id.to_string().is_empty());

    let report = tokio::time::timeout(DRAIN_TIMEOUT, handle.wait())
        .await
        .expect("batch should drain");
    assert_eq!(report.state, WorkerState::Drained);
    assert_eq!((report.succeeded, report.failed), (1, 1));

    let snapshot = store.snapshot(&ack.request_id).unwrap();
    assert!(snapshot.is_done());
    let value = serde_json::to_value(&snapshot).unwrap();

    assert_eq!(
        value["results"]["repoA"],
        json!({
            "main": {
                "alice": {
                    "commits": [{
                        "sha": "c1",
                        "author": "alice",
                        "message": "change c1",
                        "comment_count": 0,
                        "url": "https://github.com/org/repo/commit/c1",
                        "date": "2024-01-05T10:00:00Z",
                        "stats": {"additions": 3, "deletions": 1, "total": 4}
                    }]
                }
            },
            "pr_details": {}
        })
    );
    assert_eq!(value["results"]["repoB"]["error"], "rate limited");
    assert_eq!(value["results"]["repoB"]["failed"], true);

    // repoB stopped at its branch listing.
    let repo_b_calls: Vec<String> = calls
        .calls()
        .into_iter()
        .filter(|c| c.ends_with("org/repoB"))
        .collect();
    assert_eq!(repo_b_calls, vec!["branches org/repoB".to_string()]);
}

#[tokio::test]
async fn dispatch_returns_before_any_entity_completes() {
    let source = FakeGitHub::default().with_repo("repoA", RepoFixture::new(&["main"], &["alice"]));
    let (dispatcher, store) = engine(source);

    // The current-thread runtime does not run the worker until we yield.
    let (ack, handle) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    let early = store.snapshot(&ack.request_id).unwrap();
    assert_eq!(early.expected, 1);
    assert_eq!(early.completed(), 0);

    let _ = handle.wait().await;
    assert_eq!(store.snapshot(&ack.request_id).unwrap().completed(), 1);
}

#[tokio::test]
async fn entities_are_recorded_once_in_submission_order() {
    let names = ["zeta", "alpha", "mid", "beta"];
    let mut source = FakeGitHub::default();
    for name in names {
        source = source.with_repo(name, RepoFixture::new(&["main"], &["alice"]));
    }
    let calls = source.clone();
    let (dispatcher, store) = engine(source);

    let (ack, handle) = dispatcher.dispatch(batch(&names)).unwrap();
    let _ = handle.wait().await;

    let snapshot = store.snapshot(&ack.request_id).unwrap();
    assert_eq!(snapshot.completed(), names.len());
    assert_eq!(snapshot.entity_names().collect::<Vec<_>>(), names.to_vec());

    let branch_calls: Vec<String> = calls
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("branches"))
        .collect();
    let expected: Vec<String> = names.iter().map(|n| format!("branches org/{n}")).collect();
    assert_eq!(branch_calls, expected);
}

#[tokio::test]
async fn collaborator_failure_skips_commit_and_pull_fetches() {
    let source = FakeGitHub::default().with_repo(
        "repoA",
        RepoFixture {
            collaborators: None,
            ..RepoFixture::new(&["main", "dev"], &[]).commit("main", "c1", "alice", Some((1, 1)))
        },
    );
    let calls = source.clone();
    let (dispatcher, store) = engine(source);

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    let _ = handle.wait().await;

    let result = store.get(&ack.request_id, "repoA").unwrap();
    let failure = result.failure().expect("failure document");
    assert_eq!(failure.error, "rate limited");
    assert!(failure.failed);

    assert_eq!(
        calls.calls(),
        vec!["branches org/repoA".to_string(), "collaborators org/repoA".to_string()]
    );
}

#[tokio::test]
async fn commit_list_failure_skips_remaining_branches_and_pulls() {
    let source = FakeGitHub::default().with_repo(
        "repoA",
        RepoFixture {
            commits_fail: true,
            ..RepoFixture::new(&["main", "dev"], &["alice"])
                .pull(pull(1, "dev", "main", "alice"), true)
        },
    );
    let calls = source.clone();
    let (dispatcher, store) = engine(source);

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    let report = handle.wait().await;
    assert_eq!((report.succeeded, report.failed), (0, 1));

    let result = store.get(&ack.request_id, "repoA").unwrap();
    assert_eq!(result.failure().expect("failure document").error, "rate limited");

    let calls = calls.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[2].starts_with("commits org/repoA@main"));
    assert!(!calls.iter().any(|c| c.starts_with("pulls") || c.starts_with("stats")));
}

#[tokio::test]
async fn pull_list_failure_skips_pull_details() {
    let source = FakeGitHub::default().with_repo(
        "repoA",
        RepoFixture {
            pulls_fail: true,
            ..RepoFixture::new(&["main"], &["alice"])
                .commit("main", "c1", "alice", Some((1, 0)))
                .pull(pull(1, "main", "main", "alice"), true)
        },
    );
    let calls = source.clone();
    let (dispatcher, store) = engine(source);

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    let _ = handle.wait().await;

    let result = store.get(&ack.request_id, "repoA").unwrap();
    let failure = result.failure().expect("failure document");
    assert_eq!(failure.error, "rate limited");
    assert!(failure.failed);

    let calls = calls.calls();
    assert_eq!(calls.last().map(String::as_str), Some("pulls org/repoA"));
    assert!(!calls.iter().any(|c| c.starts_with("pr_detail")));
}

#[tokio::test]
async fn non_collaborator_activity_is_filtered_out() {
    let mut teammate_pr = pull(1, "feature", "main", "mallory");
    teammate_pr.assignees = vec!["alice".to_string(), "eve".to_string()];
    teammate_pr.reviewers = vec!["mallory".to_string()];

    let source = FakeGitHub::default().with_repo(
        "repoA",
        RepoFixture::new(&["main", "feature"], &["alice"])
            .commit("main", "c1", "alice", Some((2, 0)))
            .commit("main", "c2", "mallory", Some((9, 9)))
            .commit("feature", "c3", "eve", Some((1, 0)))
            .pull(teammate_pr, true),
    );
    let calls = source.clone();
    let (dispatcher, store) = engine(source);

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    let _ = handle.wait().await;

    let result = store.get(&ack.request_id, "repoA").unwrap();
    let report = report_of(&result);

    for branch in report.branches.values() {
        assert_eq!(branch.keys().collect::<Vec<_>>(), vec!["alice"]);
    }
    let main = report.activity("main", "alice").unwrap();
    assert_eq!(main.commits.len(), 1);
    assert_eq!(main.commits[0].commit.sha, "c1");
    assert_eq!(main.assignee, vec![1]);
    assert!(report.activity("feature", "alice").unwrap().commits.is_empty());

    // PR authored by a non-collaborator: no detail fetched.
    assert!(report.pr_details.is_empty());
    assert!(!calls.calls().iter().any(|c| c.starts_with("pr_detail")));

    let text = serde_json::to_string(report).unwrap();
    assert!(!text.contains("mallory"));
    assert!(!text.contains("eve"));
}

#[tokio::test]
async fn empty_collaborator_list_yields_empty_branches() {
    let source = FakeGitHub::default().with_repo(
        "repoA",
        RepoFixture::new(&["main", "dev"], &[])
            .commit("main", "c1", "alice", Some((1, 1)))
            .pull(pull(4, "dev", "main", "alice"), true),
    );
    let (dispatcher, store) = engine(source);

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    let _ = handle.wait().await;

    let result = store.get(&ack.request_id, "repoA").unwrap();
    assert_eq!(
        serde_json::to_value(report_of(&result)).unwrap(),
        json!({"main": {}, "dev": {}, "pr_details": {}})
    );
}

#[tokio::test]
async fn pull_requests_attribute_roles_and_collect_details() {
    let mut pr = pull(12, "feature", "main", "alice");
    pr.reviewers = vec!["bob".to_string()];
    let other = pull(13, "feature", "main", "bob");

    let source = FakeGitHub::default().with_repo(
        "repoA",
        RepoFixture::new(&["main", "feature"], &["alice", "bob"])
            .pull(pr, true)
            .pull(other, false),
    );
    let (dispatcher, store) = engine(source);

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    let _ = handle.wait().await;

    let result = store.get(&ack.request_id, "repoA").unwrap();
    let report = report_of(&result);
    for branch in ["main", "feature"] {
        assert_eq!(report.activity(branch, "alice").unwrap().author, vec![12]);
        let bob = report.activity(branch, "bob").unwrap();
        assert_eq!(bob.reviewer, vec![12]);
        assert_eq!(bob.author, vec![13]);
    }

    // #13's detail lookup fails: the PR is left out, the entity still succeeds.
    assert_eq!(report.pr_details.keys().copied().collect::<Vec<_>>(), vec![12]);
    assert_eq!(report.pr_details[&12].changed_files, 4);
}

#[tokio::test]
async fn failed_commit_stats_are_recorded_as_null() {
    let source = FakeGitHub::default().with_repo(
        "repoA",
        RepoFixture::new(&["main"], &["alice"]).commit("main", "c1", "alice", None),
    );
    let (dispatcher, store) = engine(source);

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    let _ = handle.wait().await;

    let result = store.get(&ack.request_id, "repoA").unwrap();
    let value = serde_json::to_value(report_of(&result)).unwrap();
    assert!(value["main"]["alice"]["commits"][0]["stats"].is_null());
}

#[tokio::test]
async fn entity_window_overrides_batch_window() {
    let source = FakeGitHub::default().with_repo("repoA", RepoFixture::new(&["main"], &["alice"]));
    let calls = source.clone();
    let (dispatcher, _store) = engine(source);

    let params = AnalysisParams::for_owner("org")
        .with_window(Some("2024-01-01".to_string()), Some("2024-12-31".to_string()));
    let entity = EntityRef::new("repoA").with_window(Some("2024-06-01".to_string()), None);
    let (_, handle) = dispatcher
        .dispatch(BatchRequest::new(vec![entity], params))
        .unwrap();
    let _ = handle.wait().await;

    assert!(calls
        .calls()
        .contains(&r#"commits org/repoA@main Some("2024-06-01")..Some("2024-12-31")"#.to_string()));
}

#[tokio::test]
async fn missing_owner_is_a_failure_document() {
    let source = FakeGitHub::default().with_repo("repoA", RepoFixture::new(&["main"], &["alice"]));
    let calls = source.clone();
    let (dispatcher, store) = engine(source);

    let (ack, handle) = dispatcher
        .dispatch(BatchRequest::new(
            vec![EntityRef::new("repoA")],
            AnalysisParams::default(),
        ))
        .unwrap();
    let _ = handle.wait().await;

    assert!(store.get(&ack.request_id, "repoA").unwrap().is_failure());
    assert!(calls.calls().is_empty());
}

#[tokio::test]
async fn polling_twice_returns_identical_snapshots() {
    let source = FakeGitHub::default().with_repo(
        "repoA",
        RepoFixture::new(&["main"], &["alice"]).commit("main", "c1", "alice", Some((1, 0))),
    );
    let (dispatcher, store) = engine(source);
    let poller = ResultPoller::new(Arc::clone(&store));

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    let _ = handle.wait().await;

    let first = poller.poll(&ack.request_id).unwrap();
    let second = poller.poll(&ack.request_id).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert!(poller.poll_entity(&ack.request_id, "repoA").is_ok());
    assert!(poller.poll_entity(&ack.request_id, "repoZ").unwrap_err().is_not_ready());
}

#[tokio::test]
async fn malformed_batches_are_rejected_synchronously() {
    let (dispatcher, store) = engine(FakeGitHub::default());

    let err = dispatcher.dispatch(batch(&["repoA", "repoA"])).unwrap_err();
    assert_eq!(
        err,
        DispatchError::DuplicateEntity {
            name: "repoA".to_string()
        }
    );
    assert!(matches!(
        dispatcher.dispatch(batch(&[])).unwrap_err(),
        DispatchError::EmptyBatch
    ));
    assert!(store.is_empty());
}

#[tokio::test]
async fn concurrent_batches_are_independent() {
    let source = FakeGitHub::default()
        .with_repo("repoA", RepoFixture::new(&["main"], &["alice"]))
        .with_repo("repoB", RepoFixture::new(&["main"], &["bob"]));
    let (dispatcher, store) = engine(source);

    let (first, h1) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    let (second, h2) = dispatcher.dispatch(batch(&["repoB", "repoA"])).unwrap();
    assert_ne!(first.request_id, second.request_id);

    let _ = tokio::join!(h1.wait(), h2.wait());
    assert_eq!(store.snapshot(&first.request_id).unwrap().completed(), 1);
    assert_eq!(store.snapshot(&second.request_id).unwrap().completed(), 2);
}

// ─── Handle: cancellation, panics, timeouts ────────────────────────────────────

#[tokio::test]
async fn cancel_before_start_records_every_entity_as_cancelled() {
    let source = FakeGitHub::default().with_repo("repoA", RepoFixture::new(&["main"], &["alice"]));
    let calls = source.clone();
    let (dispatcher, store) = engine(source);

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA", "repoB"])).unwrap();
    handle.cancel();
    let report = handle.wait().await;

    assert_eq!(report.state, WorkerState::Cancelled);
    assert_eq!(report.cancelled, 2);
    assert_eq!(report.recorded(), ack.combinations);
    assert!(calls.calls().is_empty());

    let snapshot = store.snapshot(&ack.request_id).unwrap();
    assert!(snapshot.is_done());
    for (_, result) in snapshot.results() {
        assert_eq!(result.failure().unwrap().error, CANCELLED_ERROR);
    }
}

#[tokio::test]
async fn cancel_mid_batch_finishes_current_entity() {
    let source = FakeGitHub::default()
        .with_repo("repoA", RepoFixture::new(&["main"], &["alice"]))
        .with_repo("repoB", RepoFixture::new(&["main"], &["alice"]))
        .with_repo("repoC", RepoFixture::new(&["main"], &["alice"]));
    let store = Arc::new(ProgressStore::new(TTL));

    let flag: Arc<OnceLock<Arc<AtomicBool>>> = Arc::new(OnceLock::new());
    let flag_capture = Arc::clone(&flag);
    let callback: ProgressCallback = Box::new(move |event| {
        if let AnalysisProgress::EntityCompleted { entity, .. } = event
            && entity == "repoA"
            && let Some(cancel) = flag_capture.get()
        {
            cancel.store(true, Ordering::SeqCst);
        }
    });
    let dispatcher = Dispatcher::new(Arc::new(RepositoryAnalyzer::new(source)), Arc::clone(&store))
        .with_progress(Arc::new(callback));

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA", "repoB", "repoC"])).unwrap();
    flag.set(handle.cancel_flag()).unwrap();
    let report = handle.wait().await;

    assert_eq!(report.state, WorkerState::Cancelled);
    assert_eq!((report.succeeded, report.cancelled), (1, 2));

    let snapshot = store.snapshot(&ack.request_id).unwrap();
    assert!(!snapshot.get("repoA").unwrap().is_failure());
    assert!(snapshot.get("repoC").unwrap().is_failure());
}

struct PanickingAnalyzer;

#[async_trait]
impl EntityAnalyzer for PanickingAnalyzer {
    type Report = u32;

    fn kind(&self) -> &'static str {
        "test"
    }

    async fn analyze(
        &self,
        _entity: &EntityRef,
        _params: &AnalysisParams,
        _on_progress: Option<&ProgressCallback>,
    ) -> EntityResult<u32> {
        panic!("analyzer exploded");
    }
}

struct StalledAnalyzer;

#[async_trait]
impl EntityAnalyzer for StalledAnalyzer {
    type Report = u32;

    fn kind(&self) -> &'static str {
        "test"
    }

    async fn analyze(
        &self,
        _entity: &EntityRef,
        _params: &AnalysisParams,
        _on_progress: Option<&ProgressCallback>,
    ) -> EntityResult<u32> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        EntityResult::Success(1)
    }
}

#[tokio::test]
async fn worker_panic_is_captured_in_report() {
    let store = Arc::new(ProgressStore::new(TTL));
    let dispatcher = Dispatcher::new(Arc::new(PanickingAnalyzer), Arc::clone(&store));

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    let report = handle.wait().await;

    assert_eq!(report.request_id, ack.request_id);
    assert!(report.panic_info.unwrap().contains("analyzer exploded"));
}

#[tokio::test(start_paused = true)]
async fn wait_timeout_aborts_stalled_worker() {
    let store = Arc::new(ProgressStore::new(TTL));
    let dispatcher = Dispatcher::new(Arc::new(StalledAnalyzer), Arc::clone(&store));

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    assert!(!handle.is_finished());
    let report = handle.wait_timeout(Duration::from_secs(5)).await;

    assert!(report.panic_info.unwrap().contains("timed out"));
    assert_eq!(store.snapshot(&ack.request_id).unwrap().completed(), 0);
}

struct SlowAnalyzer;

#[async_trait]
impl EntityAnalyzer for SlowAnalyzer {
    type Report = u32;

    fn kind(&self) -> &'static str {
        "test"
    }

    async fn analyze(
        &self,
        _entity: &EntityRef,
        _params: &AnalysisParams,
        _on_progress: Option<&ProgressCallback>,
    ) -> EntityResult<u32> {
        tokio::time::sleep(Duration::from_secs(20)).await;
        EntityResult::Success(1)
    }
}

#[tokio::test(start_paused = true)]
async fn entities_slower_than_ttl_are_all_kept() {
    let store = Arc::new(ProgressStore::new(Duration::from_secs(10)));
    let sweeper = store.spawn_sweeper(Duration::from_secs(1));
    let dispatcher = Dispatcher::new(Arc::new(SlowAnalyzer), Arc::clone(&store));

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA", "repoB"])).unwrap();
    let report = handle.wait().await;
    assert_eq!(report.state, WorkerState::Drained);
    assert_eq!((report.succeeded, report.dropped), (2, 0));

    let snapshot = store.snapshot(&ack.request_id).unwrap();
    assert_eq!(snapshot.entity_names().collect::<Vec<_>>(), vec!["repoA", "repoB"]);
    assert!(snapshot.is_done());

    // Once drained, the TTL runs as usual.
    tokio::time::sleep(Duration::from_secs(12)).await;
    assert!(store.snapshot(&ack.request_id).unwrap_err().is_not_ready());
    sweeper.abort();
}

#[tokio::test(start_paused = true)]
async fn aborted_worker_releases_its_request_after_ttl() {
    let store = Arc::new(ProgressStore::new(Duration::from_secs(10)));
    let dispatcher = Dispatcher::new(Arc::new(StalledAnalyzer), Arc::clone(&store));

    let (ack, handle) = dispatcher.dispatch(batch(&["repoA"])).unwrap();
    let _ = handle.wait_timeout(Duration::from_secs(5)).await;
    assert!(store.snapshot(&ack.request_id).is_ok());

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(store.evict_expired(), 1);
}
