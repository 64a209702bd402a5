use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::Mutex;

use self::helpers::{apply_limit, find_mut, find_ref, remove_one, Stamper};
use super::{
    CommentRepository, ConfessionMutation, ConfessionOrder, ConfessionQuery, ConfessionRepository,
    NewComment, NewConfession, NewProfile, NewReport, ProfileMutation, ProfileQuery,
    ProfileRepository, ReportQuery, ReportRepository, RepositoryError, Result,
};
use crate::entities::{
    Comment, Confession, ConfessionId, Profile, ProfileId, Report, ReportId, Table,
};
use crate::realtime::mock::ChangeHub;
use crate::realtime::ChangeKind;

mod helpers;

/// row store standing in for one backend table.
///
/// mutations are echoed to the attached [`ChangeHub`], like the hosted backend's
/// realtime fan-out.
pub struct InMemoryRepository<T> {
    rows: Mutex<Vec<T>>,
    stamper: Mutex<Stamper>,
    hub: Option<ChangeHub>,
    unavailable: AtomicBool,
    trip_on_write: AtomicBool,
    writes: AtomicUsize,
}

impl<T> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(vec![]),
            stamper: Mutex::new(Stamper::new()),
            hub: None,
            unavailable: AtomicBool::new(false),
            trip_on_write: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn with_hub(hub: ChangeHub) -> Self {
        Self {
            hub: Some(hub),
            ..Self::new()
        }
    }

    /// replaces every row without counting writes or notifying.
    pub async fn seed(&self, rows: Vec<T>) { *self.rows.lock().await = rows; }

    pub async fn snapshot(&self) -> Vec<T>
    where T: Clone {
        self.rows.lock().await.clone()
    }

    /// while set, every call fails with [`RepositoryError::Internal`].
    pub fn set_unavailable(&self, val: bool) { self.unavailable.store(val, Ordering::SeqCst); }

    /// the next successful write goes through, then the repository turns unavailable.
    pub fn fail_after_next_write(&self) { self.trip_on_write.store(true, Ordering::SeqCst); }

    /// number of successful inserts, updates and deletes.
    pub fn writes(&self) -> usize { self.writes.load(Ordering::SeqCst) }

    fn check(&self) -> Result<()> {
        match self.unavailable.load(Ordering::SeqCst) {
            true => Err(RepositoryError::Internal(anyhow!("backend unavailable"))),
            false => Ok(()),
        }
    }

    fn wrote(&self, table: Table, kind: ChangeKind) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.trip_on_write.swap(false, Ordering::SeqCst) {
            self.unavailable.store(true, Ordering::SeqCst);
        }

        if let Some(hub) = &self.hub {
            hub.publish(table, kind);
        }
    }
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository<Profile> {
    async fn insert(&self, item: NewProfile) -> Result<Profile> {
        self.check()?;
        let mut guard = self.rows.lock().await;

        if guard.iter().any(|p| p.firebase_uid == item.firebase_uid) {
            return Err(RepositoryError::Conflict(
                "profile already exists for this identity".to_string(),
            ));
        }
        if guard.iter().any(|p| p.username == item.username) {
            return Err(RepositoryError::Conflict("username already taken".to_string()));
        }

        let NewProfile {
            firebase_uid,
            username,
        } = item;
        let profile = Profile {
            id: ProfileId::new(),
            firebase_uid,
            username,
            is_admin: false,
            created_at: self.stamper.lock().await.next(),
        };

        guard.push(profile.clone());
        drop(guard);

        self.wrote(Table::Profiles, ChangeKind::Insert);
        Ok(profile)
    }

    async fn find(&self, id: ProfileId) -> Result<Profile> {
        self.check()?;
        let guard = self.rows.lock().await;

        Ok(find_ref(&guard, |p| p.id == id)?.clone())
    }

    async fn find_by_uid(&self, firebase_uid: &str) -> Result<Profile> {
        self.check()?;
        let guard = self.rows.lock().await;

        Ok(find_ref(&guard, |p| p.firebase_uid == firebase_uid)?.clone())
    }

    async fn find_by_username(&self, username: &str) -> Result<Profile> {
        self.check()?;
        let guard = self.rows.lock().await;

        Ok(find_ref(&guard, |p| p.username == username)?.clone())
    }

    async fn finds(&self, ProfileQuery { limit }: ProfileQuery) -> Result<Vec<Profile>> {
        self.check()?;

        let mut v = self.rows.lock().await.clone();
        v.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(apply_limit(v, limit))
    }

    async fn count(&self) -> Result<u64> {
        self.check()?;

        Ok(self.rows.lock().await.len() as u64)
    }

    async fn update(&self, id: ProfileId, mutation: ProfileMutation) -> Result<Profile> {
        self.check()?;
        let mut guard = self.rows.lock().await;
        let item = find_mut(&mut guard, |p| p.id == id)?;

        let ProfileMutation { is_admin } = mutation;
        if let Some(val) = is_admin {
            item.is_admin = val;
        }

        let updated = item.clone();
        drop(guard);

        self.wrote(Table::Profiles, ChangeKind::Update);
        Ok(updated)
    }
}

#[async_trait]
impl ConfessionRepository for InMemoryRepository<Confession> {
    async fn insert(&self, item: NewConfession) -> Result<Confession> {
        self.check()?;

        let NewConfession {
            user_id,
            username,
            content,
            category,
        } = item;
        let confession = Confession {
            id: ConfessionId::new(),
            user_id,
            username,
            content,
            category,
            support_count: 0,
            is_flagged: false,
            created_at: self.stamper.lock().await.next(),
        };

        self.rows.lock().await.push(confession.clone());

        self.wrote(Table::Confessions, ChangeKind::Insert);
        Ok(confession)
    }

    async fn find(&self, id: ConfessionId) -> Result<Confession> {
        self.check()?;
        let guard = self.rows.lock().await;

        Ok(find_ref(&guard, |c| c.id == id)?.clone())
    }

    async fn finds(
        &self,
        ConfessionQuery {
            flagged,
            order,
            limit,
        }: ConfessionQuery,
    ) -> Result<Vec<Confession>> {
        self.check()?;

        let mut v = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|c| flagged.map(|f| c.is_flagged == f).unwrap_or(true))
            .cloned()
            .collect::<Vec<_>>();

        match order {
            ConfessionOrder::CreatedAtDesc => v.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ConfessionOrder::SupportCountDesc =>
                v.sort_by(|a, b| b.support_count.cmp(&a.support_count)),
        }

        Ok(apply_limit(v, limit))
    }

    async fn finds_by_ids(&self, ids: &[ConfessionId]) -> Result<Vec<Confession>> {
        self.check()?;

        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        self.check()?;

        Ok(self.rows.lock().await.len() as u64)
    }

    async fn update(&self, id: ConfessionId, mutation: ConfessionMutation) -> Result<Confession> {
        self.check()?;
        let mut guard = self.rows.lock().await;
        let item = find_mut(&mut guard, |c| c.id == id)?;

        let ConfessionMutation {
            support_count,
            is_flagged,
        } = mutation;
        if let Some(val) = support_count {
            item.support_count = val;
        }
        if let Some(val) = is_flagged {
            item.is_flagged = val;
        }

        let updated = item.clone();
        drop(guard);

        self.wrote(Table::Confessions, ChangeKind::Update);
        Ok(updated)
    }

    async fn delete(&self, id: ConfessionId) -> Result<()> {
        self.check()?;

        remove_one(&mut *self.rows.lock().await, |c| c.id == id)?;

        self.wrote(Table::Confessions, ChangeKind::Delete);
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for InMemoryRepository<Comment> {
    async fn insert(&self, item: NewComment) -> Result<Comment> {
        self.check()?;

        let NewComment {
            confession_id,
            user_id,
            username,
            comment,
        } = item;
        let comment = Comment {
            confession_id,
            user_id,
            username,
            comment,
            created_at: self.stamper.lock().await.next(),
        };

        self.rows.lock().await.push(comment.clone());

        self.wrote(Table::Comments, ChangeKind::Insert);
        Ok(comment)
    }

    async fn finds(&self, confession_id: ConfessionId) -> Result<Vec<Comment>> {
        self.check()?;

        let mut v = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|c| c.confession_id == confession_id)
            .cloned()
            .collect::<Vec<_>>();
        v.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(v)
    }
}

#[async_trait]
impl ReportRepository for InMemoryRepository<Report> {
    async fn insert(&self, item: NewReport) -> Result<Report> {
        self.check()?;

        let NewReport {
            target_id,
            target_type,
            reason,
        } = item;
        let report = Report {
            id: ReportId::new(),
            target_id,
            target_type,
            reason,
            created_at: self.stamper.lock().await.next(),
        };

        self.rows.lock().await.push(report.clone());

        self.wrote(Table::Reports, ChangeKind::Insert);
        Ok(report)
    }

    async fn finds(&self, ReportQuery { limit }: ReportQuery) -> Result<Vec<Report>> {
        self.check()?;

        let mut v = self.rows.lock().await.clone();
        v.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(apply_limit(v, limit))
    }

    async fn count(&self) -> Result<u64> {
        self.check()?;

        Ok(self.rows.lock().await.len() as u64)
    }

    async fn delete(&self, id: ReportId) -> Result<()> {
        self.check()?;

        remove_one(&mut *self.rows.lock().await, |r| r.id == id)?;

        self.wrote(Table::Reports, ChangeKind::Delete);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_profile(uid: &str, name: &str) -> NewProfile {
        NewProfile {
            firebase_uid: uid.to_string(),
            username: name.to_string(),
        }
    }

    #[tokio::test]
    async fn profile_username_is_unique() {
        let repo = InMemoryRepository::<Profile>::new();

        repo.insert(new_profile("uid-1", "alice")).await.unwrap();
        let res = repo.insert(new_profile("uid-2", "alice")).await;

        assert!(matches!(res, Err(RepositoryError::Conflict(_))));
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.writes(), 1);
    }

    #[tokio::test]
    async fn point_queries_distinguish_not_found() {
        let repo = InMemoryRepository::<Profile>::new();
        repo.insert(new_profile("uid-1", "alice")).await.unwrap();

        assert_eq!(repo.find_by_uid("uid-1").await.unwrap().username, "alice");
        assert!(matches!(
            repo.find_by_uid("uid-9").await,
            Err(RepositoryError::NotFound)
        ));

        repo.set_unavailable(true);
        assert!(matches!(
            repo.find_by_uid("uid-1").await,
            Err(RepositoryError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn confession_filters_and_limits() {
        let repo = InMemoryRepository::<Confession>::new();
        let author = ProfileId::new();

        for i in 0..5 {
            let c = repo
                .insert(NewConfession {
                    user_id: author,
                    username: "alice".to_string(),
                    content: format!("confession number {}", i),
                    category: "general".to_string(),
                })
                .await
                .unwrap();

            if i == 0 {
                repo.update(c.id, ConfessionMutation {
                    is_flagged: Some(true),
                    ..Default::default()
                })
                .await
                .unwrap();
            }
        }

        let visible = repo
            .finds(ConfessionQuery {
                flagged: Some(false),
                limit: Some(3),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(visible.len(), 3);
        assert!(visible.iter().all(|c| !c.is_flagged));
        assert_eq!(visible[0].content, "confession number 4");
        assert_eq!(repo.finds(ConfessionQuery::default()).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn deleting_missing_rows_is_not_found() {
        let repo = InMemoryRepository::<Report>::new();

        assert!(matches!(
            repo.delete(ReportId::new()).await,
            Err(RepositoryError::NotFound)
        ));
        assert_eq!(repo.writes(), 0);
    }
}
