//! Presenter that hands every rendered view-model back over a channel.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::super::views::{
    CommentRow, FeedRow, IncidentRow, MessageRow, Notice, ReportRow, Screen, Section, UserRow,
};
use super::super::{FeedPresenter, ModerationPresenter, Notifier, SessionPresenter};
use crate::entities::{ConfessionId, Profile, Stats};

#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Screen(Screen),
    Profile(Option<Profile>),
    Notice(Notice),
    Redirect,
    Feed(Vec<FeedRow>),
    Comments(ConfessionId, Vec<CommentRow>),
    ComposerClosed,
    Section(Section),
    Stats(Stats),
    Messages(Vec<MessageRow>),
    Reports(Vec<ReportRow>),
    Users(Vec<UserRow>),
    Incidents(Vec<IncidentRow>),
}

#[derive(Clone)]
pub struct ReturnPresenter {
    pub ret: mpsc::UnboundedSender<Rendered>,
}

impl ReturnPresenter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Rendered>) {
        let (ret, rx) = mpsc::unbounded_channel();
        (Self { ret }, rx)
    }

    fn send(&self, r: Rendered) -> Result<()> {
        self.ret.send(r).map_err(|e| anyhow::anyhow!(e.to_string()))
    }
}

/// everything rendered so far, without waiting.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Rendered>) -> Vec<Rendered> {
    let mut out = vec![];
    while let Ok(r) = rx.try_recv() {
        out.push(r);
    }
    out
}

#[async_trait]
impl Notifier for ReturnPresenter {
    async fn notify(&self, notice: Notice) -> Result<()> { self.send(Rendered::Notice(notice)) }
}

#[async_trait]
impl SessionPresenter for ReturnPresenter {
    async fn show_screen(&self, screen: Screen) -> Result<()> {
        self.send(Rendered::Screen(screen))
    }

    async fn show_profile(&self, profile: Option<Profile>) -> Result<()> {
        self.send(Rendered::Profile(profile))
    }

    async fn redirect(&self) -> Result<()> { self.send(Rendered::Redirect) }
}

#[async_trait]
impl FeedPresenter for ReturnPresenter {
    async fn render_feed(&self, rows: Vec<FeedRow>) -> Result<()> {
        self.send(Rendered::Feed(rows))
    }

    async fn render_comments(&self, id: ConfessionId, rows: Vec<CommentRow>) -> Result<()> {
        self.send(Rendered::Comments(id, rows))
    }

    async fn close_composer(&self) -> Result<()> { self.send(Rendered::ComposerClosed) }
}

#[async_trait]
impl ModerationPresenter for ReturnPresenter {
    async fn show_section(&self, section: Section) -> Result<()> {
        self.send(Rendered::Section(section))
    }

    async fn render_stats(&self, stats: Stats) -> Result<()> { self.send(Rendered::Stats(stats)) }

    async fn render_messages(&self, rows: Vec<MessageRow>) -> Result<()> {
        self.send(Rendered::Messages(rows))
    }

    async fn render_reports(&self, rows: Vec<ReportRow>) -> Result<()> {
        self.send(Rendered::Reports(rows))
    }

    async fn render_users(&self, rows: Vec<UserRow>) -> Result<()> {
        self.send(Rendered::Users(rows))
    }

    async fn render_incidents(&self, rows: Vec<IncidentRow>) -> Result<()> {
        self.send(Rendered::Incidents(rows))
    }
}
