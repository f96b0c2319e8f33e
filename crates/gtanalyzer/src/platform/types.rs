use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::Result;

/// Inclusive date window for commit listing.
///
/// Values are ISO-8601 strings passed to the upstream as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub since: Option<String>,
    pub until: Option<String>,
}

impl DateWindow {
    #[must_use]
    pub fn new(since: Option<String>, until: Option<String>) -> Self {
        Self { since, until }
    }
}

// ─── Repository records ────────────────────────────────────────────────────────

/// A commit as returned by a branch commit listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    /// Login of the commit author; absent when the author has no account.
    pub author: Option<String>,
    pub message: String,
    pub comment_count: u64,
    pub url: String,
    pub date: Option<String>,
}

/// Line statistics for a single commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
}

/// A pull request from a repository-wide listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head_branch: String,
    pub base_branch: String,
    pub author: Option<String>,
    pub assignees: Vec<String>,
    pub reviewers: Vec<String>,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
    pub merged_at: Option<String>,
}

/// Review and size counters for a single pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestDetail {
    pub number: u64,
    pub comments: u64,
    pub review_comments: u64,
    pub commits: u64,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
    pub merged_at: Option<String>,
}

/// Per-repository accessors the repository analyzer consumes.
///
/// Every call may fail independently.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Names of all branches.
    async fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<String>>;

    /// Logins of all collaborators.
    async fn list_collaborators(&self, owner: &str, repo: &str) -> Result<Vec<String>>;

    /// Commits reachable from `branch` within `window`, in upstream order.
    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        window: &DateWindow,
    ) -> Result<Vec<Commit>>;

    async fn commit_stats(&self, owner: &str, repo: &str, sha: &str) -> Result<CommitStats>;

    /// All pull requests regardless of state.
    async fn list_pull_requests(&self, owner: &str, repo: &str) -> Result<Vec<PullRequest>>;

    async fn pr_detail(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequestDetail>;
}

#[async_trait]
impl<T: RepositorySource + ?Sized> RepositorySource for Arc<T> {
    async fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<String>> {
        (**self).list_branches(owner, repo).await
    }

    async fn list_collaborators(&self, owner: &str, repo: &str) -> Result<Vec<String>> {
        (**self).list_collaborators(owner, repo).await
    }

    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        window: &DateWindow,
    ) -> Result<Vec<Commit>> {
        (**self).list_commits(owner, repo, branch, window).await
    }

    async fn commit_stats(&self, owner: &str, repo: &str, sha: &str) -> Result<CommitStats> {
        (**self).commit_stats(owner, repo, sha).await
    }

    async fn list_pull_requests(&self, owner: &str, repo: &str) -> Result<Vec<PullRequest>> {
        (**self).list_pull_requests(owner, repo).await
    }

    async fn pr_detail(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequestDetail> {
        (**self).pr_detail(owner, repo, number).await
    }
}

// ─── Board records ─────────────────────────────────────────────────────────────

/// A project member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardMember {
    pub id: u64,
    pub name: String,
    pub username: String,
}

/// A project looked up by slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardProject {
    pub id: u64,
    pub name: String,
    pub members: Vec<BoardMember>,
}

/// Sprint-level fields of a milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneDetails {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub is_closed: bool,
    pub total_points: Option<f64>,
    pub closed_points: Option<f64>,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
    pub estimated_start: Option<String>,
    pub estimated_finish: Option<String>,
}

/// A milestone with the user stories planned into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Milestone {
    pub details: MilestoneDetails,
    pub user_stories: Vec<UserStory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStory {
    pub id: u64,
    #[serde(rename = "ref")]
    pub reference: u64,
    pub status: Option<String>,
    pub subject: String,
    pub total_points: Option<f64>,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
    pub finish_date: Option<String>,
    pub is_closed: bool,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardTask {
    pub id: u64,
    #[serde(rename = "ref")]
    pub reference: u64,
    pub status: Option<String>,
    pub subject: String,
    pub user_story: Option<u64>,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
    pub finished_date: Option<String>,
    pub due_date: Option<String>,
    pub is_closed: bool,
    pub assigned_to: Option<String>,
}

/// One change event from a story or task history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub created_at: Option<String>,
    pub diff: serde_json::Value,
}

/// Per-board accessors the board analyzer consumes.
#[async_trait]
pub trait BoardSource: Send + Sync {
    async fn project_by_slug(&self, slug: &str) -> Result<BoardProject>;

    /// Milestones of a project, each carrying its user stories.
    async fn milestones(&self, project_id: u64) -> Result<Vec<Milestone>>;

    async fn tasks(&self, project_id: u64) -> Result<Vec<BoardTask>>;

    async fn user_story_history(&self, user_story_id: u64) -> Result<Vec<HistoryEvent>>;

    async fn task_history(&self, task_id: u64) -> Result<Vec<HistoryEvent>>;
}

#[async_trait]
impl<T: BoardSource + ?Sized> BoardSource for Arc<T> {
    async fn project_by_slug(&self, slug: &str) -> Result<BoardProject> {
        (**self).project_by_slug(slug).await
    }

    async fn milestones(&self, project_id: u64) -> Result<Vec<Milestone>> {
        (**self).milestones(project_id).await
    }

    async fn tasks(&self, project_id: u64) -> Result<Vec<BoardTask>> {
        (**self).tasks(project_id).await
    }

    async fn user_story_history(&self, user_story_id: u64) -> Result<Vec<HistoryEvent>> {
        (**self).user_story_history(user_story_id).await
    }

    async fn task_history(&self, task_id: u64) -> Result<Vec<HistoryEvent>> {
        (**self).task_history(task_id).await
    }
}
