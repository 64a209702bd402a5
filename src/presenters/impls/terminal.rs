use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::super::views::{
    CommentRow, FeedRow, IncidentRow, MessageRow, Notice, NoticeKind, ReportRow, ReportTarget,
    Screen, Section, UserRow,
};
use super::super::{FeedPresenter, ModerationPresenter, Notifier, SessionPresenter};
use crate::entities::{ConfessionId, Profile, Stats};

pub(crate) const SUCCESS: (u8, u8, u8) = (0xac, 0xbf, 0xa4);
pub(crate) const ERROR: (u8, u8, u8) = (0xef, 0x44, 0x44);
pub(crate) const INFO: (u8, u8, u8) = (0xff, 0x7f, 0x11);

const TITLE: (u8, u8, u8) = (0xfb, 0xf1, 0xc7);
const MUTED: (u8, u8, u8) = (0x66, 0x5c, 0x54);
const SUPPORT: (u8, u8, u8) = (0xd3, 0x86, 0x9b);
const ADMIN: (u8, u8, u8) = (0xfa, 0xdb, 0x2f);

fn paint((r, g, b): (u8, u8, u8), s: &str) -> String {
    format!("\x1b[38;2;{};{};{}m{}\x1b[0m", r, g, b, s)
}

fn heading(s: &str) -> String { paint(TITLE, &format!("== {} ==", s)) }

/// renders to text lines consumed by the command front end's printer.
#[derive(Clone)]
pub struct TerminalPresenter {
    pub out: mpsc::Sender<String>,
}

impl TerminalPresenter {
    async fn emit(&self, text: String) -> Result<()> {
        self.out
            .send(text)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))
    }
}

#[async_trait]
impl Notifier for TerminalPresenter {
    async fn notify(&self, Notice { kind, message }: Notice) -> Result<()> {
        let text = match kind {
            NoticeKind::Success => paint(SUCCESS, &format!("✓ {}", message)),
            NoticeKind::Error => paint(ERROR, &format!("✗ {}", message)),
            NoticeKind::Info => paint(INFO, &format!("• {}", message)),
            NoticeKind::Alert => paint(ERROR, &format!("!! {} !!", message.to_uppercase())),
        };

        self.emit(text).await
    }
}

#[async_trait]
impl SessionPresenter for TerminalPresenter {
    async fn show_screen(&self, screen: Screen) -> Result<()> {
        let text = match screen {
            Screen::Loading => paint(MUTED, "loading..."),
            Screen::Auth => heading("sign in")
                + "\n  signin <email> <password> | signup <email> <password>",
            Screen::UsernameClaim => heading("choose a username")
                + "\n  claim <username>  (3-20 letters, digits or _)",
            Screen::Main => heading("welcome"),
            Screen::Redirected => paint(MUTED, "leaving the admin console"),
        };

        self.emit(text).await
    }

    async fn show_profile(&self, profile: Option<Profile>) -> Result<()> {
        let text = match profile {
            Some(Profile {
                username,
                is_admin: true,
                ..
            }) => format!("@{} {}", username, paint(ADMIN, "[admin]")),
            Some(Profile { username, .. }) => format!("@{}", username),
            None => return Ok(()),
        };

        self.emit(text).await
    }

    async fn redirect(&self) -> Result<()> { self.emit(paint(INFO, "-> user app")).await }
}

#[async_trait]
impl FeedPresenter for TerminalPresenter {
    async fn render_feed(&self, rows: Vec<FeedRow>) -> Result<()> {
        let mut text = heading("feed");

        if rows.is_empty() {
            text += &format!("\n{}", paint(MUTED, "no confessions yet"));
        }
        for FeedRow {
            id,
            username,
            content,
            support_count,
            age,
            can_delete,
        } in rows
        {
            text += &format!(
                "\n{} {} {}\n  {}\n  {} {}",
                paint(TITLE, &format!("@{}", username)),
                paint(MUTED, &age),
                if can_delete { paint(MUTED, "(yours to delete)") } else { String::new() },
                content,
                paint(SUPPORT, &format!("♥ {}", support_count)),
                paint(MUTED, &id.to_string()),
            );
        }

        self.emit(text).await
    }

    async fn render_comments(&self, id: ConfessionId, rows: Vec<CommentRow>) -> Result<()> {
        let mut text = heading(&format!("comments on {}", id));

        if rows.is_empty() {
            text += &format!("\n{}", paint(MUTED, "no comments yet"));
        }
        for CommentRow {
            username,
            comment,
            age,
        } in rows
        {
            text += &format!("\n  @{} {}: {}", username, paint(MUTED, &age), comment);
        }

        self.emit(text).await
    }

    async fn close_composer(&self) -> Result<()> { Ok(()) }
}

#[async_trait]
impl ModerationPresenter for TerminalPresenter {
    async fn show_section(&self, section: Section) -> Result<()> {
        self.emit(heading(&format!("{:?}", section).to_lowercase()))
            .await
    }

    async fn render_stats(&self, Stats { messages, reports, users }: Stats) -> Result<()> {
        let badge = match reports {
            0 => String::new(),
            n => paint(ERROR, &format!(" ({} pending)", n)),
        };

        self.emit(format!(
            "messages {} | reports {}{} | users {}",
            messages, reports, badge, users
        ))
        .await
    }

    async fn render_messages(&self, rows: Vec<MessageRow>) -> Result<()> {
        let mut text = heading("messages");

        for MessageRow {
            id,
            username,
            content,
            support_count,
            is_flagged,
            age,
        } in rows
        {
            text += &format!(
                "\n{} @{} {} ♥{}{}\n  {}",
                paint(MUTED, &id.to_string()),
                username,
                paint(MUTED, &age),
                support_count,
                if is_flagged { paint(ERROR, " flagged") } else { String::new() },
                content,
            );
        }

        self.emit(text).await
    }

    async fn render_reports(&self, rows: Vec<ReportRow>) -> Result<()> {
        let mut text = heading("reports");

        if rows.is_empty() {
            text += &format!("\n{}", paint(SUCCESS, "nothing to review"));
        }
        for ReportRow {
            id,
            reason,
            target,
            age,
        } in rows
        {
            let target = match target {
                ReportTarget::Present {
                    id,
                    username,
                    content,
                } => format!("@{}: {} {}", username, content, paint(MUTED, &id.to_string())),
                ReportTarget::Removed => paint(MUTED, "source removed"),
            };

            text += &format!(
                "\n{} {} {}\n  {}",
                paint(MUTED, &id.to_string()),
                paint(ERROR, &reason),
                paint(MUTED, &age),
                target,
            );
        }

        self.emit(text).await
    }

    async fn render_users(&self, rows: Vec<UserRow>) -> Result<()> {
        let mut text = heading("users");

        for UserRow {
            id,
            username,
            uid,
            is_admin,
            joined,
        } in rows
        {
            text += &format!(
                "\n{} @{} {} joined {}{}",
                paint(MUTED, &id.to_string()),
                username,
                paint(MUTED, &uid),
                joined,
                if is_admin { paint(ADMIN, " [admin]") } else { String::new() },
            );
        }

        self.emit(text).await
    }

    async fn render_incidents(&self, rows: Vec<IncidentRow>) -> Result<()> {
        let mut text = heading("recent incidents");

        for IncidentRow {
            reason,
            username,
            age,
        } in rows
        {
            text += &format!("\n  {} on @{} {}", paint(ERROR, &reason), username, paint(MUTED, &age));
        }

        self.emit(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ReportId;

    #[tokio::test]
    async fn removed_targets_render_as_source_removed() {
        let (out, mut rx) = mpsc::channel(4);
        let p = TerminalPresenter { out };

        p.render_reports(vec![ReportRow {
            id: ReportId::new(),
            reason: "spam".to_string(),
            target: ReportTarget::Removed,
            age: "Just now".to_string(),
        }])
        .await
        .unwrap();

        let text = rx.recv().await.unwrap();
        assert!(text.contains("source removed"));
        assert!(text.contains("spam"));
    }

    #[tokio::test]
    async fn notices_use_brand_colors() {
        let (out, mut rx) = mpsc::channel(4);
        let p = TerminalPresenter { out };

        p.notify(Notice::success("Posted")).await.unwrap();
        p.notify(Notice::error("Error loading messages")).await.unwrap();

        assert!(rx.recv().await.unwrap().contains("\x1b[38;2;172;191;164m"));
        assert!(rx.recv().await.unwrap().contains("\x1b[38;2;239;68;68m"));
    }
}
