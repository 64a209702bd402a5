use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{age, failed, signed_in};
use crate::entities::{Confession, ConfessionId, Profile, ProfileId, Report, ReportId, Stats};
use crate::error::{AppError, AppResult};
use crate::presenters::views::{
    IncidentRow, MessageRow, Notice, ReportRow, ReportTarget, Section, UserRow, REDACTED,
};
use crate::presenters::{shown, Confirm, ModerationPresenter};
use crate::realtime::{Reaction, TableChange};
use crate::repositories::{
    ConfessionOrder, ConfessionQuery, ConfessionRepository, ProfileMutation, ProfileQuery,
    ProfileRepository, ReportQuery, ReportRepository,
};
use crate::session::{Landing, SharedSession};
use crate::utils::prefix_chars;

pub const MESSAGES_LIMIT: usize = 100;
pub const INCIDENTS_LIMIT: usize = 5;
pub const UID_PREFIX_CHARS: usize = 12;

const DELETE_PROMPT: &str = "Permanent Action: Delete this content?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminSort {
    #[default]
    Latest,
    Supported,
}

/// section a moderator deleted from; it is the one reloaded afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOrigin {
    Messages,
    Reports,
}

/// one admin view that realtime changes can refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminView {
    Stats,
    Messages,
    Reports,
    Users,
    Incidents,
}

pub struct ModerationController {
    pub state: SharedSession,
    pub profiles: Arc<dyn ProfileRepository + Sync + Send>,
    pub confessions: Arc<dyn ConfessionRepository + Sync + Send>,
    pub reports: Arc<dyn ReportRepository + Sync + Send>,
    pub pres: Arc<dyn ModerationPresenter + Sync + Send>,
    pub sort: Mutex<AdminSort>,
}

impl ModerationController {
    async fn admin(&self) -> AppResult<Profile> {
        let profile = signed_in(&self.state).await?;

        match profile.is_admin {
            true => Ok(profile),
            false => Err(AppError::unauthorized("administrator permissions required")),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn load_stats(&self) -> AppResult<Stats> {
        self.admin().await?;

        let (messages, reports, users) = tokio::join!(
            self.confessions.count(),
            self.reports.count(),
            self.profiles.count()
        );

        let stats = match (messages, reports, users) {
            (Ok(messages), Ok(reports), Ok(users)) => Stats {
                messages,
                reports,
                users,
            },
            (Err(e), ..) | (_, Err(e), _) | (.., Err(e)) => {
                return failed(&*self.pres, "Error loading stats", e.into()).await
            },
        };
        tracing::trace!("stats - {:?}", stats);

        shown(self.pres.render_stats(stats).await);
        Ok(stats)
    }

    /// every message, flagged ones included.
    #[tracing::instrument(skip(self))]
    pub async fn load_messages(&self, sort: AdminSort) -> AppResult<()> {
        self.admin().await?;
        *self.sort.lock().await = sort;

        let order = match sort {
            AdminSort::Latest => ConfessionOrder::CreatedAtDesc,
            AdminSort::Supported => ConfessionOrder::SupportCountDesc,
        };
        let res = self
            .confessions
            .finds(ConfessionQuery {
                flagged: None,
                order,
                limit: Some(MESSAGES_LIMIT),
            })
            .await;

        let rows = match res {
            Ok(v) => v,
            Err(e) => return failed(&*self.pres, "Error loading messages", e.into()).await,
        };

        let rows = rows
            .into_iter()
            .map(|c| MessageRow {
                id: c.id,
                username: c.username,
                content: c.content,
                support_count: c.support_count,
                is_flagged: c.is_flagged,
                age: age(c.created_at),
            })
            .collect();
        shown(self.pres.render_messages(rows).await);

        Ok(())
    }

    /// reports newest first, each joined with its target; missing targets are
    /// rendered as removed.
    #[tracing::instrument(skip(self))]
    pub async fn load_reports(&self) -> AppResult<()> {
        self.admin().await?;

        let (reports, targets) = match self.reports_with_targets(None).await {
            Ok(v) => v,
            Err(e) => return failed(&*self.pres, "Error loading reports", e).await,
        };

        let rows = reports
            .into_iter()
            .map(|r| ReportRow {
                target: match targets.get(&r.target_id) {
                    Some(c) => ReportTarget::Present {
                        id: c.id,
                        username: c.username.clone(),
                        content: c.content.clone(),
                    },
                    None => ReportTarget::Removed,
                },
                id: r.id,
                reason: r.reason,
                age: age(r.created_at),
            })
            .collect();
        shown(self.pres.render_reports(rows).await);

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn load_users(&self) -> AppResult<()> {
        self.admin().await?;

        let users = match self.profiles.finds(ProfileQuery::default()).await {
            Ok(v) => v,
            Err(e) => return failed(&*self.pres, "Error loading users", e.into()).await,
        };

        let rows = users
            .into_iter()
            .map(|p| UserRow {
                id: p.id,
                uid: prefix_chars(&p.firebase_uid, UID_PREFIX_CHARS),
                username: p.username,
                is_admin: p.is_admin,
                joined: p.created_at.format("%Y-%m-%d").to_string(),
            })
            .collect();
        shown(self.pres.render_users(rows).await);

        Ok(())
    }

    /// the latest reports with their target's author.
    #[tracing::instrument(skip(self))]
    pub async fn load_incidents(&self) -> AppResult<()> {
        self.admin().await?;

        let (reports, targets) = match self.reports_with_targets(Some(INCIDENTS_LIMIT)).await {
            Ok(v) => v,
            Err(e) => return failed(&*self.pres, "Error loading incidents", e).await,
        };

        let rows = reports
            .into_iter()
            .map(|r| IncidentRow {
                username: targets
                    .get(&r.target_id)
                    .map(|c| c.username.clone())
                    .unwrap_or_else(|| REDACTED.to_string()),
                reason: r.reason,
                age: age(r.created_at),
            })
            .collect();
        shown(self.pres.render_incidents(rows).await);

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn show_section(&self, section: Section) -> AppResult<()> {
        self.admin().await?;
        shown(self.pres.show_section(section).await);

        match section {
            Section::Overview => {
                self.load_stats().await?;
                self.load_incidents().await
            },
            Section::Messages => {
                let sort = *self.sort.lock().await;
                self.load_messages(sort).await
            },
            Section::Reports => self.load_reports().await,
            Section::Users => self.load_users().await,
        }
    }

    /// `Ok(false)` when the confirmation was declined.
    #[tracing::instrument(skip(self, confirm))]
    pub async fn delete_message(
        &self,
        id: ConfessionId,
        origin: DeleteOrigin,
        confirm: &(dyn Confirm + Sync + Send),
    ) -> AppResult<bool> {
        self.admin().await?;

        if !confirm.confirm(DELETE_PROMPT).await {
            return Ok(false);
        }

        if let Err(e) = self.confessions.delete(id).await {
            let e = AppError::from(e);
            let msg = format!("Action Failed: {}", e);
            return failed(&*self.pres, &msg, e).await;
        }
        shown(self.pres.notify(Notice::success("Content removed successfully.")).await);

        self.refresh(match origin {
            DeleteOrigin::Reports => AdminView::Reports,
            DeleteOrigin::Messages => AdminView::Messages,
        })
        .await;
        self.refresh(AdminView::Stats).await;

        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub async fn dismiss_report(&self, id: ReportId) -> AppResult<()> {
        self.admin().await?;

        if let Err(e) = self.reports.delete(id).await {
            return failed(&*self.pres, "Error dismissing report", e.into()).await;
        }
        shown(self.pres.notify(Notice::info("Report dismissed.")).await);

        self.refresh(AdminView::Reports).await;
        self.refresh(AdminView::Stats).await;

        Ok(())
    }

    /// flips `is_admin` of `id`; `Ok(None)` when the confirmation was declined.
    #[tracing::instrument(skip(self, confirm))]
    pub async fn toggle_admin(
        &self,
        id: ProfileId,
        confirm: &(dyn Confirm + Sync + Send),
    ) -> AppResult<Option<bool>> {
        let viewer = self.admin().await?;

        let current = match self.profiles.find(id).await {
            Ok(p) => p.is_admin,
            Err(e) => return failed(&*self.pres, "Error updating permissions", e.into()).await,
        };

        let prompt = format!(
            "Are you sure you want to {} administrative permissions?",
            if current { "remove" } else { "grant" }
        );
        if !confirm.confirm(&prompt).await {
            return Ok(None);
        }

        let res = self
            .profiles
            .update(id, ProfileMutation {
                is_admin: Some(!current),
            })
            .await;

        let updated = match res {
            Ok(p) => p,
            Err(e) => return failed(&*self.pres, "Error updating permissions", e.into()).await,
        };
        shown(self.pres.notify(Notice::info("User permissions updated.")).await);

        // own flag: later calls are gated on the new value
        if updated.id == viewer.id {
            self.state.write().await.profile = Some(updated.clone());
        }

        self.refresh(AdminView::Users).await;
        self.refresh(AdminView::Stats).await;

        Ok(Some(updated.is_admin))
    }

    /// reloads one view, logging instead of returning failures.
    pub async fn refresh(&self, view: AdminView) {
        let res = match view {
            AdminView::Stats => self.load_stats().await.map(|_| ()),
            AdminView::Messages => {
                let sort = *self.sort.lock().await;
                self.load_messages(sort).await
            },
            AdminView::Reports => self.load_reports().await,
            AdminView::Users => self.load_users().await,
            AdminView::Incidents => self.load_incidents().await,
        };

        if let Err(e) = res {
            tracing::warn!("refresh of {:?} failed: {}", view, e);
        }
    }

    async fn reports_with_targets(
        &self,
        limit: Option<usize>,
    ) -> AppResult<(Vec<Report>, HashMap<ConfessionId, Confession>)> {
        let reports = self.reports.finds(ReportQuery { limit }).await?;

        if reports.is_empty() {
            return Ok((reports, HashMap::new()));
        }

        let mut ids = reports.iter().map(|r| r.target_id).collect::<Vec<_>>();
        ids.sort();
        ids.dedup();

        let targets = self
            .confessions
            .finds_by_ids(&ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        Ok((reports, targets))
    }
}

#[async_trait]
impl Landing for ModerationController {
    async fn land(&self) {
        self.refresh(AdminView::Stats).await;
        self.refresh(AdminView::Incidents).await;
    }
}

/// realtime reaction reloading one admin view.
pub struct Refresh {
    pub ctrl: Arc<ModerationController>,
    pub view: AdminView,
}

#[async_trait]
impl Reaction for Refresh {
    async fn react(&self, change: TableChange) {
        tracing::trace!("{:?} refresh on {:?}", self.view, change);
        self.ctrl.refresh(self.view).await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tokio::sync::mpsc;

    use super::*;
    use crate::entities::{REPORT_TARGET_CONFESSION, DEFAULT_CATEGORY};
    use crate::presenters::impls::ret::{drain, Rendered, ReturnPresenter};
    use crate::presenters::Preconfirmed;
    use crate::repositories::mock::InMemoryRepository;
    use crate::session;

    struct Fixture {
        ctrl: ModerationController,
        admin: Profile,
        profiles: Arc<InMemoryRepository<Profile>>,
        confessions: Arc<InMemoryRepository<Confession>>,
        reports: Arc<InMemoryRepository<Report>>,
        rx: mpsc::UnboundedReceiver<Rendered>,
    }

    fn profile(uid: &str, username: &str, is_admin: bool) -> Profile {
        Profile {
            id: ProfileId::new(),
            firebase_uid: uid.to_string(),
            username: username.to_string(),
            is_admin,
            created_at: Utc::now(),
        }
    }

    fn confession(username: &str, content: &str, support: i64, mins_ago: i64) -> Confession {
        Confession {
            id: ConfessionId::new(),
            user_id: ProfileId::new(),
            username: username.to_string(),
            content: content.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            support_count: support,
            is_flagged: false,
            created_at: Utc::now() - Duration::minutes(mins_ago),
        }
    }

    fn report(target: ConfessionId, reason: &str, mins_ago: i64) -> Report {
        Report {
            id: ReportId::new(),
            target_id: target,
            target_type: REPORT_TARGET_CONFESSION.to_string(),
            reason: reason.to_string(),
            created_at: Utc::now() - Duration::minutes(mins_ago),
        }
    }

    async fn fixture(is_admin: bool) -> Fixture {
        let admin = profile("firebase-uid-0123456789", "moderator", is_admin);

        let profiles = Arc::new(InMemoryRepository::<Profile>::new());
        profiles.seed(vec![admin.clone()]).await;
        let confessions = Arc::new(InMemoryRepository::<Confession>::new());
        let reports = Arc::new(InMemoryRepository::<Report>::new());

        let state = session::shared();
        state.write().await.profile = Some(admin.clone());
        let (pres, rx) = ReturnPresenter::new();

        let ctrl = ModerationController {
            state,
            profiles: profiles.clone(),
            confessions: confessions.clone(),
            reports: reports.clone(),
            pres: Arc::new(pres),
            sort: Mutex::new(AdminSort::default()),
        };

        Fixture {
            ctrl,
            admin,
            profiles,
            confessions,
            reports,
            rx,
        }
    }

    fn last<T>(rendered: &[Rendered], pick: impl Fn(&Rendered) -> Option<T>) -> T {
        rendered.iter().rev().find_map(pick).unwrap()
    }

    #[tokio::test]
    async fn every_operation_is_role_gated() {
        let f = fixture(false).await;
        let yes = Preconfirmed(true);

        assert!(matches!(f.ctrl.load_stats().await, Err(AppError::Unauthorized(_))));
        assert!(matches!(
            f.ctrl.load_messages(AdminSort::Latest).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(f.ctrl.load_reports().await, Err(AppError::Unauthorized(_))));
        assert!(matches!(f.ctrl.load_users().await, Err(AppError::Unauthorized(_))));
        assert!(matches!(f.ctrl.load_incidents().await, Err(AppError::Unauthorized(_))));
        assert!(matches!(
            f.ctrl.show_section(Section::Users).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            f.ctrl
                .delete_message(ConfessionId::new(), DeleteOrigin::Messages, &yes)
                .await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            f.ctrl.dismiss_report(ReportId::new()).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            f.ctrl.toggle_admin(f.admin.id, &yes).await,
            Err(AppError::Unauthorized(_))
        ));
        assert_eq!(f.profiles.writes(), 0);
    }

    #[tokio::test]
    async fn stats_count_every_table() {
        let mut f = fixture(true).await;
        let a = confession("amy", "first message", 0, 3);
        let b = confession("bob", "second message", 0, 2);
        f.confessions.seed(vec![a.clone(), b]).await;
        f.reports.seed(vec![report(a.id, "spam", 1)]).await;

        let stats = f.ctrl.load_stats().await.unwrap();

        let expected = Stats {
            messages: 2,
            reports: 1,
            users: 1,
        };
        assert_eq!(stats, expected);
        assert_eq!(drain(&mut f.rx), vec![Rendered::Stats(expected)]);
    }

    #[tokio::test]
    async fn messages_include_flagged_and_follow_the_sort() {
        let mut f = fixture(true).await;
        let flagged = Confession {
            is_flagged: true,
            ..confession("amy", "flagged one", 7, 1)
        };
        f.confessions
            .seed(vec![confession("bob", "older", 9, 10), flagged])
            .await;

        f.ctrl.load_messages(AdminSort::Latest).await.unwrap();
        f.ctrl.load_messages(AdminSort::Supported).await.unwrap();

        let rendered = drain(&mut f.rx);
        let lists = rendered
            .iter()
            .filter_map(|r| match r {
                Rendered::Messages(rows) => Some(
                    rows.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
                ),
                _ => None,
            })
            .collect::<Vec<_>>();

        assert_eq!(lists, vec![vec!["flagged one", "older"], vec!["older", "flagged one"]]);
        assert_eq!(*f.ctrl.sort.lock().await, AdminSort::Supported);
    }

    #[tokio::test]
    async fn deleted_targets_render_as_removed() {
        let mut f = fixture(true).await;
        let kept = confession("amy", "still here", 0, 5);
        let gone = confession("bob", "about to go", 0, 4);
        f.confessions.seed(vec![kept.clone(), gone.clone()]).await;
        f.reports
            .seed(vec![report(kept.id, "rude", 2), report(gone.id, "spam", 1)])
            .await;

        let deleted = f
            .ctrl
            .delete_message(gone.id, DeleteOrigin::Reports, &Preconfirmed(true))
            .await
            .unwrap();
        assert!(deleted);

        let rendered = drain(&mut f.rx);
        let rows = last(&rendered, |r| match r {
            Rendered::Reports(rows) => Some(rows.clone()),
            _ => None,
        });

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].reason, "spam");
        assert_eq!(rows[0].target, ReportTarget::Removed);
        assert!(matches!(&rows[1].target, ReportTarget::Present { username, .. } if username == "amy"));

        let stats = last(&rendered, |r| match r {
            Rendered::Stats(s) => Some(*s),
            _ => None,
        });
        assert_eq!(stats.messages, 1);

        f.ctrl.load_incidents().await.unwrap();
        let incidents = last(&drain(&mut f.rx), |r| match r {
            Rendered::Incidents(rows) => Some(rows.clone()),
            _ => None,
        });
        assert_eq!(
            incidents.iter().map(|i| i.username.as_str()).collect::<Vec<_>>(),
            vec![REDACTED, "amy"]
        );
    }

    #[tokio::test]
    async fn declined_delete_touches_nothing() {
        let mut f = fixture(true).await;
        let c = confession("amy", "still here", 0, 5);
        f.confessions.seed(vec![c.clone()]).await;

        let deleted = f
            .ctrl
            .delete_message(c.id, DeleteOrigin::Messages, &Preconfirmed(false))
            .await
            .unwrap();

        assert!(!deleted);
        assert_eq!(f.confessions.writes(), 0);
        assert!(drain(&mut f.rx).is_empty());
    }

    #[tokio::test]
    async fn incidents_are_capped() {
        let mut f = fixture(true).await;
        let c = confession("amy", "popular target", 0, 60);
        f.confessions.seed(vec![c.clone()]).await;
        f.reports
            .seed((0..8).map(|i| report(c.id, &format!("r{}", i), i)).collect())
            .await;

        f.ctrl.load_incidents().await.unwrap();

        let rows = last(&drain(&mut f.rx), |r| match r {
            Rendered::Incidents(rows) => Some(rows.clone()),
            _ => None,
        });
        assert_eq!(
            rows.iter().map(|i| i.reason.as_str()).collect::<Vec<_>>(),
            vec!["r0", "r1", "r2", "r3", "r4"]
        );
    }

    #[tokio::test]
    async fn dismissing_reloads_reports_and_stats() {
        let mut f = fixture(true).await;
        let c = confession("amy", "reported", 0, 5);
        let r = report(c.id, "spam", 1);
        f.confessions.seed(vec![c]).await;
        f.reports.seed(vec![r.clone()]).await;

        f.ctrl.dismiss_report(r.id).await.unwrap();

        let rendered = drain(&mut f.rx);
        assert!(rendered.contains(&Rendered::Notice(Notice::info("Report dismissed."))));
        assert!(rendered.contains(&Rendered::Reports(vec![])));
        assert_eq!(
            last(&rendered, |r| match r {
                Rendered::Stats(s) => Some(s.reports),
                _ => None,
            }),
            0
        );
    }

    #[tokio::test]
    async fn toggling_admin_flips_the_flag() {
        let mut f = fixture(true).await;
        let user = profile("uid-user", "regular", false);
        f.profiles
            .seed(vec![f.admin.clone(), user.clone()])
            .await;

        assert_eq!(f.ctrl.toggle_admin(user.id, &Preconfirmed(false)).await.unwrap(), None);
        assert_eq!(f.profiles.writes(), 0);

        assert_eq!(
            f.ctrl.toggle_admin(user.id, &Preconfirmed(true)).await.unwrap(),
            Some(true)
        );
        assert_eq!(
            f.ctrl.toggle_admin(user.id, &Preconfirmed(true)).await.unwrap(),
            Some(false)
        );

        let users = last(&drain(&mut f.rx), |r| match r {
            Rendered::Users(rows) => Some(rows.clone()),
            _ => None,
        });
        let row = users.iter().find(|u| u.id == user.id).unwrap();
        assert!(!row.is_admin);
    }

    #[tokio::test]
    async fn removing_the_own_flag_ends_admin_access() {
        let mut f = fixture(true).await;

        assert_eq!(
            f.ctrl.toggle_admin(f.admin.id, &Preconfirmed(true)).await.unwrap(),
            Some(false)
        );

        let state = f.ctrl.state.read().await.clone();
        assert_eq!(state.profile.map(|p| p.is_admin), Some(false));
        assert!(matches!(f.ctrl.load_stats().await, Err(AppError::Unauthorized(_))));
        assert!(drain(&mut f.rx).contains(&Rendered::Notice(Notice::info("User permissions updated."))));
    }

    #[tokio::test]
    async fn completed_actions_survive_failed_reloads() {
        let mut f = fixture(true).await;
        let c = confession("amy", "reported", 0, 5);
        let r = report(c.id, "spam", 1);
        f.confessions.seed(vec![c.clone()]).await;
        f.reports.seed(vec![r.clone()]).await;

        f.confessions.fail_after_next_write();
        assert!(f
            .ctrl
            .delete_message(c.id, DeleteOrigin::Messages, &Preconfirmed(true))
            .await
            .unwrap());
        assert!(f.confessions.snapshot().await.is_empty());

        f.reports.fail_after_next_write();
        f.ctrl.dismiss_report(r.id).await.unwrap();
        assert!(f.reports.snapshot().await.is_empty());

        let rendered = drain(&mut f.rx);
        assert!(rendered.contains(&Rendered::Notice(Notice::success("Content removed successfully."))));
        assert!(rendered.contains(&Rendered::Notice(Notice::info("Report dismissed."))));
        assert!(!rendered.iter().any(|x| matches!(x, Rendered::Stats(_))));
    }

    #[tokio::test]
    async fn user_directory_truncates_uids() {
        let mut f = fixture(true).await;

        f.ctrl.show_section(Section::Users).await.unwrap();

        let rendered = drain(&mut f.rx);
        assert_eq!(rendered[0], Rendered::Section(Section::Users));
        let users = last(&rendered, |r| match r {
            Rendered::Users(rows) => Some(rows.clone()),
            _ => None,
        });
        assert_eq!(users[0].uid, "firebase-uid");
        assert_eq!(users[0].username, "moderator");
    }
}
