use async_trait::async_trait;

use crate::entities::{
    Comment, Confession, ConfessionId, Profile, ProfileId, Report, ReportId,
};

pub mod mock;
pub mod postgrest;

pub(crate) type Result<T> = ::std::result::Result<T, RepositoryError>;

#[async_trait]
pub trait ProfileRepository {
    async fn insert(&self, item: NewProfile) -> Result<Profile>;

    async fn find(&self, id: ProfileId) -> Result<Profile>;
    async fn find_by_uid(&self, firebase_uid: &str) -> Result<Profile>;
    async fn find_by_username(&self, username: &str) -> Result<Profile>;
    async fn finds(&self, query: ProfileQuery) -> Result<Vec<Profile>>;
    async fn count(&self) -> Result<u64>;

    async fn update(&self, id: ProfileId, mutation: ProfileMutation) -> Result<Profile>;
}

#[async_trait]
pub trait ConfessionRepository {
    async fn insert(&self, item: NewConfession) -> Result<Confession>;

    async fn find(&self, id: ConfessionId) -> Result<Confession>;
    async fn finds(&self, query: ConfessionQuery) -> Result<Vec<Confession>>;
    async fn finds_by_ids(&self, ids: &[ConfessionId]) -> Result<Vec<Confession>>;
    async fn count(&self) -> Result<u64>;

    async fn update(&self, id: ConfessionId, mutation: ConfessionMutation) -> Result<Confession>;

    async fn delete(&self, id: ConfessionId) -> Result<()>;
}

#[async_trait]
pub trait CommentRepository {
    async fn insert(&self, item: NewComment) -> Result<Comment>;

    /// comments of one confession, oldest first.
    async fn finds(&self, confession_id: ConfessionId) -> Result<Vec<Comment>>;
}

#[async_trait]
pub trait ReportRepository {
    async fn insert(&self, item: NewReport) -> Result<Report>;

    /// reports, newest first.
    async fn finds(&self, query: ReportQuery) -> Result<Vec<Report>>;
    async fn count(&self) -> Result<u64>;

    async fn delete(&self, id: ReportId) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub firebase_uid: String,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct NewConfession {
    pub user_id: ProfileId,
    pub username: String,
    pub content: String,
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub confession_id: ConfessionId,
    pub user_id: ProfileId,
    pub username: String,
    pub comment: String,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub target_id: ConfessionId,
    pub target_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfessionOrder {
    CreatedAtDesc,
    SupportCountDesc,
}

impl ConfessionOrder {
    pub(crate) fn column(self) -> &'static str {
        match self {
            ConfessionOrder::CreatedAtDesc => "created_at",
            ConfessionOrder::SupportCountDesc => "support_count",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfessionQuery {
    /// `None` matches flagged and unflagged rows alike.
    pub flagged: Option<bool>,
    pub order: ConfessionOrder,
    pub limit: Option<usize>,
}

impl Default for ConfessionQuery {
    fn default() -> Self {
        Self {
            flagged: None,
            order: ConfessionOrder::CreatedAtDesc,
            limit: None,
        }
    }
}

/// profiles, newest first.
#[derive(Debug, Clone, Default)]
pub struct ProfileQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileMutation {
    pub is_admin: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfessionMutation {
    pub support_count: Option<i64>,
    pub is_flagged: Option<bool>,
}

#[derive(Debug, ::thiserror::Error)]
pub enum RepositoryError {
    #[error("cannot find object.")]
    NotFound,

    #[error("expected unique object, found non-unique objects (matched: {matched})")]
    NoUnique { matched: u32 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}
