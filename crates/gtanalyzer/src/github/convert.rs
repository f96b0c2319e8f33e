use super::types::{
    GitHubCommitItem, GitHubCommitStats, GitHubPullRequest, GitHubPullRequestDetail,
};
use crate::platform::{Commit, CommitStats, PullRequest, PullRequestDetail};

pub fn to_commit(item: GitHubCommitItem) -> Commit {
    Commit {
        sha: item.sha,
        author: item.author.map(|a| a.login),
        message: item.commit.message,
        comment_count: item.commit.comment_count,
        url: item.html_url,
        date: item.commit.author.and_then(|s| s.date),
    }
}

pub fn to_commit_stats(stats: GitHubCommitStats) -> CommitStats {
    CommitStats {
        additions: stats.additions,
        deletions: stats.deletions,
        total: stats.total,
    }
}

pub fn to_pull_request(pr: GitHubPullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        head_branch: pr.head.name,
        base_branch: pr.base.name,
        author: pr.user.map(|u| u.login),
        assignees: pr.assignees.into_iter().map(|u| u.login).collect(),
        reviewers: pr.requested_reviewers.into_iter().map(|u| u.login).collect(),
        created_at: pr.created_at,
        closed_at: pr.closed_at,
        merged_at: pr.merged_at,
    }
}

pub fn to_pull_request_detail(detail: GitHubPullRequestDetail) -> PullRequestDetail {
    PullRequestDetail {
        number: detail.number,
        comments: detail.comments,
        review_comments: detail.review_comments,
        commits: detail.commits,
        additions: detail.additions,
        deletions: detail.deletions,
        changed_files: detail.changed_files,
        created_at: detail.created_at,
        closed_at: detail.closed_at,
        merged_at: detail.merged_at,
    }
}
