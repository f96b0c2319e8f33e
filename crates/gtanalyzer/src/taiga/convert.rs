//! Conversions from Taiga wire types to board records.

use chrono::DateTime;

use super::types::{
    TaigaHistoryEntry, TaigaMember, TaigaMilestone, TaigaProject, TaigaTask, TaigaUserStory,
};
use crate::platform::{
    BoardMember, BoardProject, BoardTask, HistoryEvent, Milestone, MilestoneDetails, UserStory,
};

/// Reduce an RFC 3339 timestamp to its `YYYY-MM-DD` date.
///
/// Values that do not parse are passed through untouched.
pub fn to_date(value: Option<String>) -> Option<String> {
    value.map(|raw| match DateTime::parse_from_rfc3339(&raw) {
        Ok(parsed) => parsed.format("%Y-%m-%d").to_string(),
        Err(_) => raw,
    })
}

fn to_member(member: TaigaMember) -> BoardMember {
    BoardMember {
        id: member.id,
        name: member.full_name,
        username: member.username,
    }
}

pub fn to_project(project: TaigaProject) -> BoardProject {
    BoardProject {
        id: project.id,
        name: project.name,
        members: project.members.into_iter().map(to_member).collect(),
    }
}

pub fn to_user_story(story: TaigaUserStory) -> UserStory {
    UserStory {
        id: story.id,
        reference: story.reference,
        status: story.status_extra_info.map(|s| s.name),
        subject: story.subject,
        total_points: story.total_points,
        created_date: to_date(story.created_date),
        modified_date: to_date(story.modified_date),
        finish_date: to_date(story.finish_date),
        is_closed: story.is_closed,
        assigned_to: story.assigned_to_extra_info.map(|a| a.username),
    }
}

/// Milestone dates are normalized except the estimates, which Taiga already
/// returns as plain dates.
pub fn to_milestone(milestone: TaigaMilestone) -> Milestone {
    Milestone {
        details: MilestoneDetails {
            id: milestone.id,
            name: milestone.name,
            slug: milestone.slug,
            is_closed: milestone.closed,
            total_points: milestone.total_points,
            closed_points: milestone.closed_points,
            created_date: to_date(milestone.created_date),
            modified_date: to_date(milestone.modified_date),
            estimated_start: milestone.estimated_start,
            estimated_finish: milestone.estimated_finish,
        },
        user_stories: milestone.user_stories.into_iter().map(to_user_story).collect(),
    }
}

pub fn to_task(task: TaigaTask) -> BoardTask {
    BoardTask {
        id: task.id,
        reference: task.reference,
        status: task.status_extra_info.map(|s| s.name),
        subject: task.subject,
        user_story: task.user_story,
        created_date: to_date(task.created_date),
        modified_date: to_date(task.modified_date),
        finished_date: to_date(task.finished_date),
        due_date: to_date(task.due_date),
        is_closed: task.is_closed,
        assigned_to: task.assigned_to_extra_info.map(|a| a.username),
    }
}

pub fn to_history_event(entry: TaigaHistoryEntry) -> HistoryEvent {
    HistoryEvent {
        created_at: to_date(entry.created_at),
        diff: entry.diff,
    }
}
