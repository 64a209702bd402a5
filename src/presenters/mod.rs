use anyhow::Result;
use async_trait::async_trait;

use crate::entities::{ConfessionId, Profile, Stats};

pub mod impls;
pub mod views;

use views::{
    CommentRow, FeedRow, IncidentRow, MessageRow, Notice, ReportRow, Screen, Section, UserRow,
};

#[async_trait]
pub trait Notifier {
    async fn notify(&self, notice: Notice) -> Result<()>;
}

#[async_trait]
pub trait SessionPresenter: Notifier {
    async fn show_screen(&self, screen: Screen) -> Result<()>;

    /// `None` hides every role-gated element.
    async fn show_profile(&self, profile: Option<Profile>) -> Result<()>;

    /// leaves the admin console for the user app.
    async fn redirect(&self) -> Result<()>;
}

#[async_trait]
pub trait FeedPresenter: Notifier {
    async fn render_feed(&self, rows: Vec<FeedRow>) -> Result<()>;
    async fn render_comments(&self, id: ConfessionId, rows: Vec<CommentRow>) -> Result<()>;
    async fn close_composer(&self) -> Result<()>;
}

#[async_trait]
pub trait ModerationPresenter: Notifier {
    async fn show_section(&self, section: Section) -> Result<()>;

    async fn render_stats(&self, stats: Stats) -> Result<()>;
    async fn render_messages(&self, rows: Vec<MessageRow>) -> Result<()>;
    async fn render_reports(&self, rows: Vec<ReportRow>) -> Result<()>;
    async fn render_users(&self, rows: Vec<UserRow>) -> Result<()>;
    async fn render_incidents(&self, rows: Vec<IncidentRow>) -> Result<()>;
}

/// interactive yes/no gate in front of destructive operations.
#[async_trait]
pub trait Confirm {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// answer fixed up front (command line `--yes`, tests).
#[derive(Debug, Clone, Copy)]
pub struct Preconfirmed(pub bool);

#[async_trait]
impl Confirm for Preconfirmed {
    async fn confirm(&self, prompt: &str) -> bool {
        tracing::trace!("confirm `{}` - {}", prompt, self.0);
        self.0
    }
}

/// presenter failures never abort an operation; they are logged.
pub(crate) fn shown(res: Result<()>) {
    if let Err(e) = res {
        tracing::warn!("presenter failed - {:?}", e);
    }
}
