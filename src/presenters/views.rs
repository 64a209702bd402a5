//! View-models handed to presenters. Every field is display-ready.

use crate::entities::{ConfessionId, ProfileId, ReportId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Loading,
    Auth,
    UsernameClaim,
    Main,
    Redirected,
}

/// admin console sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Overview,
    Messages,
    Reports,
    Users,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
    /// must be acknowledged before anything else happens.
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn alert(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Alert,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow {
    pub id: ConfessionId,
    pub username: String,
    pub content: String,
    pub support_count: i64,
    pub age: String,
    /// author or admin.
    pub can_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub username: String,
    pub comment: String,
    pub age: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub id: ConfessionId,
    pub username: String,
    pub content: String,
    pub support_count: i64,
    pub is_flagged: bool,
    pub age: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportTarget {
    Present {
        id: ConfessionId,
        username: String,
        content: String,
    },
    /// the reported confession no longer exists.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub id: ReportId,
    pub reason: String,
    pub target: ReportTarget,
    pub age: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: ProfileId,
    pub username: String,
    /// leading 12 chars of the identity subject.
    pub uid: String,
    pub is_admin: bool,
    pub joined: String,
}

pub const REDACTED: &str = "Redacted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentRow {
    pub reason: String,
    /// target author, or [`REDACTED`] when the target is gone.
    pub username: String,
    pub age: String,
}
