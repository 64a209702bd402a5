use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{age, failed, signed_in};
use crate::entities::{
    Comment, Confession, ConfessionId, Profile, DEFAULT_CATEGORY, REPORT_TARGET_CONFESSION,
};
use crate::error::{AppError, AppResult};
use crate::presenters::views::{CommentRow, FeedRow, Notice};
use crate::presenters::{shown, Confirm, FeedPresenter};
use crate::realtime::{Reaction, TableChange};
use crate::repositories::{
    CommentRepository, ConfessionMutation, ConfessionOrder, ConfessionQuery, ConfessionRepository,
    NewComment, NewConfession, NewReport, ProfileRepository, ReportRepository,
};
use crate::session::{Landing, SharedSession};

pub const FEED_LIMIT: usize = 50;
pub const MIN_CONFESSION_CHARS: usize = 10;

const DELETE_PROMPT: &str = "Are you sure you want to delete this message? This action is permanent.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedSort {
    #[default]
    Latest,
    /// ordered exactly like `Latest` for now.
    Trending,
    Supported,
}

impl FeedSort {
    fn order(self) -> ConfessionOrder {
        match self {
            FeedSort::Latest | FeedSort::Trending => ConfessionOrder::CreatedAtDesc,
            FeedSort::Supported => ConfessionOrder::SupportCountDesc,
        }
    }
}

pub struct FeedController {
    pub state: SharedSession,
    pub profiles: Arc<dyn ProfileRepository + Sync + Send>,
    pub confessions: Arc<dyn ConfessionRepository + Sync + Send>,
    pub comments: Arc<dyn CommentRepository + Sync + Send>,
    pub reports: Arc<dyn ReportRepository + Sync + Send>,
    pub pres: Arc<dyn FeedPresenter + Sync + Send>,
    pub sort: Mutex<FeedSort>,
}

impl FeedController {
    pub async fn current_sort(&self) -> FeedSort { *self.sort.lock().await }

    /// non-flagged confessions in `sort` order; `sort` becomes the current sort.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, sort: FeedSort) -> AppResult<()> {
        let viewer = signed_in(&self.state).await?;
        *self.sort.lock().await = sort;

        let res = self
            .confessions
            .finds(ConfessionQuery {
                flagged: Some(false),
                order: sort.order(),
                limit: Some(FEED_LIMIT),
            })
            .await;

        let rows = match res {
            Ok(v) => v,
            Err(e) => return failed(&*self.pres, "Error loading messages", e.into()).await,
        };
        tracing::trace!("loaded - {} rows", rows.len());

        let rows = rows.into_iter().map(|c| feed_row(c, &viewer)).collect();
        shown(self.pres.render_feed(rows).await);

        Ok(())
    }

    /// reloads with the current sort.
    pub async fn reload(&self) -> AppResult<()> {
        let sort = self.current_sort().await;
        self.load(sort).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn post(&self, content: &str) -> AppResult<()> {
        let viewer = signed_in(&self.state).await?;
        let content = content.trim();

        if content.chars().count() < MIN_CONFESSION_CHARS {
            let msg = format!("Message must be at least {} characters", MIN_CONFESSION_CHARS);
            shown(self.pres.notify(Notice::error(msg.clone())).await);
            return Err(AppError::Validation(msg));
        }

        let author = match self.author(&viewer).await {
            Ok(p) => p,
            Err(e) => return failed(&*self.pres, "Error posting message", e).await,
        };

        let res = self
            .confessions
            .insert(NewConfession {
                user_id: author.id,
                username: author.username,
                content: content.to_string(),
                category: DEFAULT_CATEGORY.to_string(),
            })
            .await;

        match res {
            Ok(c) => tracing::debug!("posted - {}", c.id),
            Err(e) => return failed(&*self.pres, "Error posting message", e.into()).await,
        }

        shown(self.pres.notify(Notice::success("Message posted!")).await);
        shown(self.pres.close_composer().await);

        Ok(())
    }

    /// read-then-write increment; concurrent supporters may lose increments.
    #[tracing::instrument(skip(self))]
    pub async fn react(&self, id: ConfessionId) -> AppResult<i64> {
        signed_in(&self.state).await?;

        let current = match self.confessions.find(id).await {
            Ok(c) => c.support_count,
            Err(e) => return failed(&*self.pres, "Error adding support", e.into()).await,
        };

        let res = self
            .confessions
            .update(id, ConfessionMutation {
                support_count: Some(current + 1),
                ..Default::default()
            })
            .await;

        match res {
            Ok(c) => Ok(c.support_count),
            Err(e) => failed(&*self.pres, "Error adding support", e.into()).await,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn report(&self, id: ConfessionId, reason: &str) -> AppResult<()> {
        signed_in(&self.state).await?;
        let reason = reason.trim();

        if reason.is_empty() {
            let e = AppError::validation("a reason is required");
            return failed(&*self.pres, "Please give a reason for the report", e).await;
        }

        let res = self
            .reports
            .insert(NewReport {
                target_id: id,
                target_type: REPORT_TARGET_CONFESSION.to_string(),
                reason: reason.to_string(),
            })
            .await;

        match res {
            Ok(_) => {
                shown(self.pres.notify(Notice::success("Message reported to admin")).await);
                Ok(())
            },
            Err(e) => failed(&*self.pres, "Error submitting report", e.into()).await,
        }
    }

    /// `Ok(false)` when the confirmation was declined.
    #[tracing::instrument(skip(self, confirm))]
    pub async fn delete(
        &self,
        id: ConfessionId,
        confirm: &(dyn Confirm + Sync + Send),
    ) -> AppResult<bool> {
        let viewer = signed_in(&self.state).await?;

        if !confirm.confirm(DELETE_PROMPT).await {
            return Ok(false);
        }

        let target = match self.confessions.find(id).await {
            Ok(c) => c,
            Err(e) => return failed(&*self.pres, "Error deleting message", e.into()).await,
        };
        if !may_delete(&target, &viewer) {
            let e = AppError::unauthorized("only the author or an admin can delete this message");
            return failed(&*self.pres, "You cannot delete this message", e).await;
        }

        if let Err(e) = self.confessions.delete(id).await {
            return failed(&*self.pres, "Error deleting message", e.into()).await;
        }
        shown(self.pres.notify(Notice::success("Message deleted successfully")).await);

        if let Err(e) = self.reload().await {
            tracing::warn!("feed reload after delete failed: {}", e);
        }
        Ok(true)
    }

    /// comments of `id`, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn comments(&self, id: ConfessionId) -> AppResult<()> {
        signed_in(&self.state).await?;

        let rows = match self.comments.finds(id).await {
            Ok(v) => v,
            Err(e) => return failed(&*self.pres, "Error loading comments", e.into()).await,
        };

        let rows = rows
            .into_iter()
            .map(
                |Comment {
                     username,
                     comment,
                     created_at,
                     ..
                 }| CommentRow {
                    username,
                    comment,
                    age: age(created_at),
                },
            )
            .collect();
        shown(self.pres.render_comments(id, rows).await);

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn comment(&self, id: ConfessionId, text: &str) -> AppResult<()> {
        let viewer = signed_in(&self.state).await?;
        let text = text.trim();

        if text.is_empty() {
            let e = AppError::validation("a comment cannot be empty");
            return failed(&*self.pres, "Comment cannot be empty", e).await;
        }

        let author = match self.author(&viewer).await {
            Ok(p) => p,
            Err(e) => return failed(&*self.pres, "Error posting comment", e).await,
        };

        let res = self
            .comments
            .insert(NewComment {
                confession_id: id,
                user_id: author.id,
                username: author.username,
                comment: text.to_string(),
            })
            .await;

        if let Err(e) = res {
            return failed(&*self.pres, "Error posting comment", e.into()).await;
        }
        shown(self.pres.notify(Notice::success("Comment posted!")).await);

        self.comments(id).await
    }

    /// the viewer's profile as currently stored, looked up by identity subject.
    async fn author(&self, viewer: &Profile) -> AppResult<Profile> {
        Ok(self.profiles.find_by_uid(&viewer.firebase_uid).await?)
    }
}

fn may_delete(target: &Confession, viewer: &Profile) -> bool {
    viewer.is_admin || target.user_id == viewer.id
}

fn feed_row(c: Confession, viewer: &Profile) -> FeedRow {
    FeedRow {
        can_delete: may_delete(&c, viewer),
        id: c.id,
        username: c.username,
        content: c.content,
        support_count: c.support_count,
        age: age(c.created_at),
    }
}

#[async_trait]
impl Landing for FeedController {
    async fn land(&self) {
        if let Err(e) = self.reload().await {
            tracing::warn!("initial feed load failed: {}", e);
        }
    }
}

/// realtime reaction: full feed reload with the current sort.
pub struct ReloadFeed(pub Arc<FeedController>);

#[async_trait]
impl Reaction for ReloadFeed {
    async fn react(&self, change: TableChange) {
        tracing::trace!("feed reload on {:?}", change);

        if let Err(e) = self.0.reload().await {
            tracing::warn!("feed reload failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tokio::sync::mpsc;

    use super::*;
    use crate::entities::{ProfileId, Report};
    use crate::presenters::impls::ret::{drain, Rendered, ReturnPresenter};
    use crate::presenters::Preconfirmed;
    use crate::repositories::mock::InMemoryRepository;
    use crate::session;

    struct Fixture {
        ctrl: FeedController,
        viewer: Profile,
        confessions: Arc<InMemoryRepository<Confession>>,
        reports: Arc<InMemoryRepository<Report>>,
        rx: mpsc::UnboundedReceiver<Rendered>,
    }

    async fn fixture(is_admin: bool) -> Fixture {
        let viewer = Profile {
            id: ProfileId::new(),
            firebase_uid: "uid-viewer".to_string(),
            username: "viewer".to_string(),
            is_admin,
            created_at: Utc::now(),
        };

        let profiles = Arc::new(InMemoryRepository::<Profile>::new());
        profiles.seed(vec![viewer.clone()]).await;

        let state = session::shared();
        state.write().await.profile = Some(viewer.clone());

        let confessions = Arc::new(InMemoryRepository::<Confession>::new());
        let reports = Arc::new(InMemoryRepository::<Report>::new());
        let (pres, rx) = ReturnPresenter::new();

        let ctrl = FeedController {
            state,
            profiles,
            confessions: confessions.clone(),
            comments: Arc::new(InMemoryRepository::<Comment>::new()),
            reports: reports.clone(),
            pres: Arc::new(pres),
            sort: Mutex::new(FeedSort::default()),
        };

        Fixture {
            ctrl,
            viewer,
            confessions,
            reports,
            rx,
        }
    }

    fn confession(content: &str, support: i64, mins_ago: i64, flagged: bool) -> Confession {
        Confession {
            id: ConfessionId::new(),
            user_id: ProfileId::new(),
            username: "someone".to_string(),
            content: content.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            support_count: support,
            is_flagged: flagged,
            created_at: Utc::now() - Duration::minutes(mins_ago),
        }
    }

    fn last_feed(rendered: Vec<Rendered>) -> Vec<FeedRow> {
        rendered
            .into_iter()
            .rev()
            .find_map(|r| match r {
                Rendered::Feed(rows) => Some(rows),
                _ => None,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn sort_orders() {
        let mut f = fixture(false).await;
        f.confessions
            .seed(vec![
                confession("old but loved", 9, 30, false),
                confession("newest one", 1, 1, false),
                confession("middle", 5, 10, false),
                confession("hidden flagged", 100, 0, true),
            ])
            .await;

        f.ctrl.load(FeedSort::Supported).await.unwrap();
        let supported = last_feed(drain(&mut f.rx));
        assert_eq!(
            supported.iter().map(|r| r.support_count).collect::<Vec<_>>(),
            vec![9, 5, 1]
        );

        for sort in [FeedSort::Latest, FeedSort::Trending] {
            f.ctrl.load(sort).await.unwrap();
            let rows = last_feed(drain(&mut f.rx));
            assert_eq!(
                rows.iter().map(|r| r.content.as_str()).collect::<Vec<_>>(),
                vec!["newest one", "middle", "old but loved"]
            );
        }
        assert_eq!(f.ctrl.current_sort().await, FeedSort::Trending);
    }

    #[tokio::test]
    async fn load_failure_keeps_the_previous_list() {
        let mut f = fixture(false).await;
        f.confessions.seed(vec![confession("something here", 0, 1, false)]).await;
        f.ctrl.load(FeedSort::Latest).await.unwrap();
        drain(&mut f.rx);

        f.confessions.set_unavailable(true);
        assert!(f.ctrl.load(FeedSort::Supported).await.is_err());

        assert_eq!(
            drain(&mut f.rx),
            vec![Rendered::Notice(Notice::error("Error loading messages"))]
        );
    }

    #[tokio::test]
    async fn short_posts_never_insert() {
        let mut f = fixture(false).await;

        for content in ["", "   ", "too short", "  123456789  "] {
            assert!(matches!(
                f.ctrl.post(content).await,
                Err(AppError::Validation(_))
            ));
        }
        assert_eq!(f.confessions.writes(), 0);

        f.ctrl.post("  exactly 10  ").await.unwrap();
        let rows = f.confessions.snapshot().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "exactly 10");
        assert_eq!(rows[0].user_id, f.viewer.id);
        assert_eq!(rows[0].category, "general");
        assert!(drain(&mut f.rx).contains(&Rendered::ComposerClosed));
    }

    #[tokio::test]
    async fn reacting_increments_by_one() {
        let f = fixture(false).await;
        let c = confession("support me please", 4, 1, false);
        f.confessions.seed(vec![c.clone()]).await;

        assert_eq!(f.ctrl.react(c.id).await.unwrap(), 5);
        assert_eq!(f.ctrl.react(c.id).await.unwrap(), 6);
        assert_eq!(f.confessions.find(c.id).await.unwrap().support_count, 6);
    }

    #[tokio::test]
    async fn reports_target_confessions() {
        let f = fixture(false).await;
        let c = confession("reported content", 0, 1, false);

        assert!(matches!(
            f.ctrl.report(c.id, "  ").await,
            Err(AppError::Validation(_))
        ));
        f.ctrl.report(c.id, "Spam").await.unwrap();

        let rows = f.reports.snapshot().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].target_id, c.id);
        assert_eq!(rows[0].target_type, "confession");
    }

    #[tokio::test]
    async fn delete_needs_confirmation_and_ownership() {
        let f = fixture(false).await;
        let mine = Confession {
            user_id: f.viewer.id,
            ..confession("my own message", 0, 2, false)
        };
        let theirs = confession("not my message", 0, 1, false);
        f.confessions.seed(vec![mine.clone(), theirs.clone()]).await;

        assert!(!f.ctrl.delete(mine.id, &Preconfirmed(false)).await.unwrap());
        assert_eq!(f.confessions.writes(), 0);

        assert!(matches!(
            f.ctrl.delete(theirs.id, &Preconfirmed(true)).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(f.ctrl.delete(mine.id, &Preconfirmed(true)).await.unwrap());

        let left = f.confessions.snapshot().await;
        assert_eq!(left, vec![theirs]);
    }

    #[tokio::test]
    async fn delete_stands_when_the_reload_fails() {
        let mut f = fixture(false).await;
        let mine = Confession {
            user_id: f.viewer.id,
            ..confession("my own message", 0, 2, false)
        };
        f.confessions.seed(vec![mine.clone()]).await;
        f.confessions.fail_after_next_write();

        assert!(f.ctrl.delete(mine.id, &Preconfirmed(true)).await.unwrap());

        assert!(f.confessions.snapshot().await.is_empty());
        let rendered = drain(&mut f.rx);
        assert!(rendered.contains(&Rendered::Notice(Notice::success("Message deleted successfully"))));
        assert!(rendered.contains(&Rendered::Notice(Notice::error("Error loading messages"))));
    }

    #[tokio::test]
    async fn admins_may_delete_anything() {
        let f = fixture(true).await;
        let theirs = confession("not my message", 0, 1, false);
        f.confessions.seed(vec![theirs.clone()]).await;

        assert!(f.ctrl.delete(theirs.id, &Preconfirmed(true)).await.unwrap());
        assert!(f.confessions.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn comments_round_trip_oldest_first() {
        let mut f = fixture(false).await;
        let c = confession("talk about it", 0, 1, false);

        assert!(f.ctrl.comment(c.id, "   ").await.is_err());
        f.ctrl.comment(c.id, "first").await.unwrap();
        f.ctrl.comment(c.id, "second").await.unwrap();

        let last = drain(&mut f.rx)
            .into_iter()
            .rev()
            .find_map(|r| match r {
                Rendered::Comments(id, rows) if id == c.id => Some(rows),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            last.iter().map(|r| r.comment.as_str()).collect::<Vec<_>>(),
            vec!["first", "second"]
        );
        assert!(last.iter().all(|r| r.username == "viewer"));
    }

    #[tokio::test]
    async fn signed_out_callers_are_refused() {
        let f = fixture(false).await;
        f.ctrl.state.write().await.profile = None;

        assert!(matches!(
            f.ctrl.load(FeedSort::Latest).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            f.ctrl.post("long enough content").await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
