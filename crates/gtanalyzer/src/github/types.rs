//! Wire types for the subset of the GitHub REST API the analyzer reads.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubBranch {
    pub name: String,
}

/// Item of `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitItem {
    pub sha: String,
    pub html_url: String,
    pub commit: GitHubCommitData,
    /// Account linked to the commit author; null for unknown emails.
    pub author: Option<GitHubUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitData {
    pub message: String,
    #[serde(default)]
    pub comment_count: u64,
    pub author: Option<GitHubSignature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubSignature {
    pub date: Option<String>,
}

/// Body of `GET /repos/{owner}/{repo}/commits/{sha}` (only stats are read).
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitDetail {
    pub stats: Option<GitHubCommitStats>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitStats {
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubBranchRef {
    #[serde(rename = "ref")]
    pub name: String,
}

/// Item of `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPullRequest {
    pub number: u64,
    pub user: Option<GitHubUser>,
    #[serde(default)]
    pub assignees: Vec<GitHubUser>,
    #[serde(default)]
    pub requested_reviewers: Vec<GitHubUser>,
    pub head: GitHubBranchRef,
    pub base: GitHubBranchRef,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
    pub merged_at: Option<String>,
}

/// Body of `GET /repos/{owner}/{repo}/pulls/{number}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPullRequestDetail {
    pub number: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub review_comments: u64,
    #[serde(default)]
    pub commits: u64,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changed_files: u64,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
    pub merged_at: Option<String>,
}

/// Error body returned by GitHub alongside non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubErrorBody {
    pub message: String,
}
