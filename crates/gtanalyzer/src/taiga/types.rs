//! Taiga REST wire types.
//!
//! Only the fields the board analyzer reads are modelled; everything else in
//! Taiga's verbose payloads is ignored.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TaigaProject {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub members: Vec<TaigaMember>,
}

#[derive(Debug, Deserialize)]
pub struct TaigaMember {
    pub id: u64,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct TaigaMilestone {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub closed: bool,
    pub total_points: Option<f64>,
    pub closed_points: Option<f64>,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
    pub estimated_start: Option<String>,
    pub estimated_finish: Option<String>,
    #[serde(default)]
    pub user_stories: Vec<TaigaUserStory>,
}

#[derive(Debug, Deserialize)]
pub struct TaigaStatusInfo {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TaigaAssigneeInfo {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct TaigaUserStory {
    pub id: u64,
    #[serde(rename = "ref")]
    pub reference: u64,
    pub status_extra_info: Option<TaigaStatusInfo>,
    #[serde(default)]
    pub subject: String,
    pub total_points: Option<f64>,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
    pub finish_date: Option<String>,
    #[serde(default)]
    pub is_closed: bool,
    pub assigned_to_extra_info: Option<TaigaAssigneeInfo>,
}

#[derive(Debug, Deserialize)]
pub struct TaigaTask {
    pub id: u64,
    #[serde(rename = "ref")]
    pub reference: u64,
    pub status_extra_info: Option<TaigaStatusInfo>,
    #[serde(default)]
    pub subject: String,
    pub user_story: Option<u64>,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
    pub finished_date: Option<String>,
    pub due_date: Option<String>,
    #[serde(default)]
    pub is_closed: bool,
    pub assigned_to_extra_info: Option<TaigaAssigneeInfo>,
}

#[derive(Debug, Deserialize)]
pub struct TaigaHistoryEntry {
    pub created_at: Option<String>,
    #[serde(default)]
    pub diff: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct TaigaErrorBody {
    #[serde(rename = "_error_message")]
    pub message: String,
}
