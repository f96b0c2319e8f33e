//! Board analysis: milestones with their user stories, tasks and histories.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use super::progress::{AnalysisProgress, ProgressCallback, emit};
use super::types::{AnalysisParams, EntityAnalyzer, EntityRef, EntityResult, FailureDocument};
use crate::platform::{
    BoardMember, BoardSource, BoardTask, HistoryEvent, MilestoneDetails, UpstreamError, UserStory,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    #[serde(flatten)]
    pub task: BoardTask,
    /// `None` when the history lookup failed.
    pub history: Option<Vec<HistoryEvent>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStoryReport {
    #[serde(flatten)]
    pub story: UserStory,
    pub history: Option<Vec<HistoryEvent>>,
    pub tasks: Vec<TaskReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneReport {
    #[serde(flatten)]
    pub details: MilestoneDetails,
    pub user_stories: Vec<UserStoryReport>,
}

/// Full analysis of one board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardReport {
    pub id: u64,
    pub name: String,
    pub members: Vec<BoardMember>,
    pub milestones: Vec<MilestoneReport>,
}

/// Sprint dates of a milestone, without its stories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MilestoneSummary {
    pub name: String,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
    pub estimated_start: Option<String>,
    pub estimated_finish: Option<String>,
}

impl From<MilestoneDetails> for MilestoneSummary {
    fn from(details: MilestoneDetails) -> Self {
        Self {
            name: details.name,
            created_date: details.created_date,
            modified_date: details.modified_date,
            estimated_start: details.estimated_start,
            estimated_finish: details.estimated_finish,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum HistoryItem {
    UserStory,
    Task,
}

/// Analyzes Taiga-style project boards through a [`BoardSource`].
///
/// Entity names are board slugs. The batch date window is not applied.
pub struct BoardAnalyzer<S> {
    source: S,
}

impl<S: BoardSource> BoardAnalyzer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Milestone dates of a board, looked up by slug.
    pub async fn milestone_summaries(
        &self,
        board: &str,
    ) -> Result<Vec<MilestoneSummary>, UpstreamError> {
        let project = self.source.project_by_slug(board).await?;
        let milestones = self.source.milestones(project.id).await?;
        Ok(milestones
            .into_iter()
            .map(|m| MilestoneSummary::from(m.details))
            .collect())
    }

    async fn build_report(
        &self,
        slug: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<BoardReport, UpstreamError> {
        let stage = |stage: &'static str| {
            tracing::debug!(board = slug, stage, "Starting stage");
            emit(
                on_progress,
                AnalysisProgress::StageStarted {
                    entity: slug.to_string(),
                    stage,
                },
            );
        };

        stage("project");
        let project = self.source.project_by_slug(slug).await?;

        stage("milestones");
        let milestones = self.source.milestones(project.id).await?;

        stage("tasks");
        let mut tasks_by_story: HashMap<u64, Vec<BoardTask>> = HashMap::new();
        for task in self.source.tasks(project.id).await? {
            if let Some(story_id) = task.user_story {
                tasks_by_story.entry(story_id).or_default().push(task);
            }
        }

        stage("history");
        let mut milestone_reports = Vec::with_capacity(milestones.len());
        for milestone in milestones {
            let mut story_reports = Vec::with_capacity(milestone.user_stories.len());
            for story in milestone.user_stories {
                let history = self.history_or_none(slug, HistoryItem::UserStory, story.id).await;
                let mut task_reports = Vec::new();
                for task in tasks_by_story.remove(&story.id).unwrap_or_default() {
                    let history = self.history_or_none(slug, HistoryItem::Task, task.id).await;
                    task_reports.push(TaskReport { task, history });
                }
                story_reports.push(UserStoryReport {
                    story,
                    history,
                    tasks: task_reports,
                });
            }
            milestone_reports.push(MilestoneReport {
                details: milestone.details,
                user_stories: story_reports,
            });
        }

        Ok(BoardReport {
            id: project.id,
            name: project.name,
            members: project.members,
            milestones: milestone_reports,
        })
    }

    async fn history_or_none(
        &self,
        slug: &str,
        item: HistoryItem,
        id: u64,
    ) -> Option<Vec<HistoryEvent>> {
        let result = match item {
            HistoryItem::UserStory => self.source.user_story_history(id).await,
            HistoryItem::Task => self.source.task_history(id).await,
        };
        match result {
            Ok(events) => Some(events),
            Err(e) => {
                tracing::warn!(board = slug, item = ?item, id, error = %e, "History unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl<S: BoardSource + 'static> EntityAnalyzer for BoardAnalyzer<S> {
    type Report = BoardReport;

    fn kind(&self) -> &'static str {
        "taiga"
    }

    async fn analyze(
        &self,
        entity: &EntityRef,
        _params: &AnalysisParams,
        on_progress: Option<&ProgressCallback>,
    ) -> EntityResult<BoardReport> {
        let slug = entity.name.trim();
        match self.build_report(slug, on_progress).await {
            Ok(report) => EntityResult::Success(report),
            Err(e) => {
                tracing::warn!(board = slug, error = %e, "Board analysis failed");
                EntityResult::Failure(FailureDocument::from_upstream(&entity.name, &e))
            }
        }
    }
}
