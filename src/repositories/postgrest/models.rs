use chrono::{DateTime, Utc};

use crate::entities::{ConfessionId, ProfileId, ReportId};

#[derive(Debug, Clone, ::serde::Serialize, ::serde::Deserialize)]
pub struct ProfileRow {
    pub id: ProfileId,
    pub firebase_uid: String,
    pub username: String,
    #[serde(default)]
    pub is_admin: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, ::serde::Serialize)]
pub struct ProfileInsert {
    pub firebase_uid: String,
    pub username: String,
}

#[derive(Debug, Clone, ::serde::Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

#[derive(Debug, Clone, ::serde::Serialize, ::serde::Deserialize)]
pub struct ConfessionRow {
    pub id: ConfessionId,
    pub user_id: ProfileId,
    pub username: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub support_count: Option<i64>,
    #[serde(default)]
    pub is_flagged: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, ::serde::Serialize)]
pub struct ConfessionInsert {
    pub user_id: ProfileId,
    pub username: String,
    pub content: String,
    pub category: String,
}

#[derive(Debug, Clone, ::serde::Serialize)]
pub struct ConfessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_flagged: Option<bool>,
}

#[derive(Debug, Clone, ::serde::Serialize, ::serde::Deserialize)]
pub struct CommentRow {
    pub confession_id: ConfessionId,
    pub user_id: ProfileId,
    pub username: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, ::serde::Serialize)]
pub struct CommentInsert {
    pub confession_id: ConfessionId,
    pub user_id: ProfileId,
    pub username: String,
    pub comment: String,
}

#[derive(Debug, Clone, ::serde::Serialize, ::serde::Deserialize)]
pub struct ReportRow {
    pub id: ReportId,
    pub target_id: ConfessionId,
    #[serde(default)]
    pub target_type: Option<String>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, ::serde::Serialize)]
pub struct ReportInsert {
    pub target_id: ConfessionId,
    pub target_type: String,
    pub reason: String,
}

/// PostgREST error body.
#[derive(Debug, Clone, Default, ::serde::Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}
