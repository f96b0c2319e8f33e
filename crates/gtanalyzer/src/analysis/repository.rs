//! Repository analysis: the collaborator-keyed merge of branches, commits and
//! pull requests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Serialize;

use super::progress::{AnalysisProgress, ProgressCallback, emit};
use super::types::{AnalysisParams, EntityAnalyzer, EntityRef, EntityResult, FailureDocument};
use crate::platform::{
    Commit, CommitStats, DateWindow, PullRequest, PullRequestDetail, RepositorySource,
    UpstreamError,
};

/// A commit with its line statistics attached.
///
/// `stats` is `None` when the per-commit lookup failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitRecord {
    #[serde(flatten)]
    pub commit: Commit,
    pub stats: Option<CommitStats>,
}

/// Everything one collaborator did on one branch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollaboratorActivity {
    pub commits: Vec<CommitRecord>,
    /// Numbers of pull requests the collaborator is assigned to.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignee: Vec<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reviewer: Vec<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<u64>,
}

/// Per-branch, per-collaborator activity of one repository.
///
/// Serializes with the branch names at the top level next to `pr_details`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepositoryReport {
    #[serde(flatten)]
    pub branches: BTreeMap<String, BTreeMap<String, CollaboratorActivity>>,
    pub pr_details: BTreeMap<u64, PullRequestDetail>,
}

impl RepositoryReport {
    /// Activity of `login` on `branch`, if both are known.
    #[must_use]
    pub fn activity(&self, branch: &str, login: &str) -> Option<&CollaboratorActivity> {
        self.branches.get(branch).and_then(|b| b.get(login))
    }
}

/// PR roles a collaborator can hold.
#[derive(Clone, Copy)]
enum Role {
    Assignee,
    Reviewer,
    Author,
}

impl CollaboratorActivity {
    fn record_role(&mut self, role: Role, number: u64) {
        let list = match role {
            Role::Assignee => &mut self.assignee,
            Role::Reviewer => &mut self.reviewer,
            Role::Author => &mut self.author,
        };
        if !list.contains(&number) {
            list.push(number);
        }
    }
}

/// Analyzes GitHub-style repositories through a [`RepositorySource`].
pub struct RepositoryAnalyzer<S> {
    source: S,
}

impl<S: RepositorySource> RepositoryAnalyzer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    async fn build_report(
        &self,
        owner: &str,
        repo: &str,
        window: &DateWindow,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<RepositoryReport, UpstreamError> {
        let stage = |stage: &'static str| {
            tracing::debug!(owner, repo, stage, "Starting stage");
            emit(
                on_progress,
                AnalysisProgress::StageStarted {
                    entity: repo.to_string(),
                    stage,
                },
            );
        };

        stage("branches");
        let branches = self.source.list_branches(owner, repo).await?;

        stage("collaborators");
        let collaborators = self.source.list_collaborators(owner, repo).await?;

        // Only skeleton keys ever receive data.
        let mut report = RepositoryReport::default();
        for branch in &branches {
            let per_branch = report.branches.entry(branch.clone()).or_default();
            for login in &collaborators {
                per_branch.entry(login.clone()).or_default();
            }
        }

        stage("commits");
        for branch in &branches {
            let commits = self.source.list_commits(owner, repo, branch, window).await?;
            let bucketed = self.bucket_commits(owner, repo, commits, &report, branch).await;
            if let Some(per_branch) = report.branches.get_mut(branch) {
                for (login, records) in bucketed {
                    if let Some(activity) = per_branch.get_mut(&login) {
                        activity.commits.extend(records);
                    }
                }
            }
        }

        stage("pull_requests");
        let pulls = self.source.list_pull_requests(owner, repo).await?;
        for pr in &pulls {
            attribute_pull_request(&mut report, pr);
        }

        stage("pr_details");
        for pr in &pulls {
            let authored_by_collaborator = pr
                .author
                .as_ref()
                .is_some_and(|login| collaborators.contains(login));
            if !authored_by_collaborator || report.pr_details.contains_key(&pr.number) {
                continue;
            }
            match self.source.pr_detail(owner, repo, pr.number).await {
                Ok(detail) => {
                    report.pr_details.insert(pr.number, detail);
                }
                Err(e) => {
                    tracing::warn!(
                        owner,
                        repo,
                        number = pr.number,
                        error = %e,
                        "Skipping pull request detail"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Bucket commits by author login, attaching stats to those the merge
    /// will keep. Commits without a login, or by non-collaborators, are
    /// dropped here since the merge would discard them anyway.
    async fn bucket_commits(
        &self,
        owner: &str,
        repo: &str,
        commits: Vec<Commit>,
        report: &RepositoryReport,
        branch: &str,
    ) -> HashMap<String, Vec<CommitRecord>> {
        let mut bucketed: HashMap<String, Vec<CommitRecord>> = HashMap::new();
        for commit in commits {
            let Some(login) = commit.author.clone() else {
                continue;
            };
            if report.activity(branch, &login).is_none() {
                continue;
            }

            let stats = match self.source.commit_stats(owner, repo, &commit.sha).await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    tracing::warn!(
                        owner,
                        repo,
                        sha = %commit.sha,
                        error = %e,
                        "Commit stats unavailable"
                    );
                    None
                }
            };
            bucketed
                .entry(login)
                .or_default()
                .push(CommitRecord { commit, stats });
        }
        bucketed
    }
}

/// Attribute a PR's roles to its head and base branches.
fn attribute_pull_request(report: &mut RepositoryReport, pr: &PullRequest) {
    let mut targets = vec![pr.head_branch.as_str()];
    if pr.base_branch != pr.head_branch {
        targets.push(pr.base_branch.as_str());
    }

    let roles = pr
        .assignees
        .iter()
        .map(|login| (login, Role::Assignee))
        .chain(pr.reviewers.iter().map(|login| (login, Role::Reviewer)))
        .chain(pr.author.iter().map(|login| (login, Role::Author)));

    for (login, role) in roles {
        for branch in &targets {
            if let Some(activity) = report
                .branches
                .get_mut(*branch)
                .and_then(|b| b.get_mut(login))
            {
                activity.record_role(role, pr.number);
            }
        }
    }
}

#[async_trait]
impl<S: RepositorySource + 'static> EntityAnalyzer for RepositoryAnalyzer<S> {
    type Report = RepositoryReport;

    fn kind(&self) -> &'static str {
        "github"
    }

    async fn analyze(
        &self,
        entity: &EntityRef,
        params: &AnalysisParams,
        on_progress: Option<&ProgressCallback>,
    ) -> EntityResult<RepositoryReport> {
        let Some(owner) = params.owner.as_deref().filter(|o| !o.trim().is_empty()) else {
            return EntityResult::Failure(FailureDocument::new(
                &entity.name,
                "repository owner is required",
            ));
        };

        let window = DateWindow::new(
            entity.start.clone().or_else(|| params.start.clone()),
            entity.end.clone().or_else(|| params.end.clone()),
        );

        match self.build_report(owner, &entity.name, &window, on_progress).await {
            Ok(report) => EntityResult::Success(report),
            Err(e) => {
                tracing::warn!(
                    owner,
                    repo = %entity.name,
                    error = %e,
                    "Repository analysis failed"
                );
                EntityResult::Failure(FailureDocument::from_upstream(&entity.name, &e))
            }
        }
    }
}
