//! The two client surfaces, each assembled from one [`Backend`].

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::constructors::Backend;
use crate::controllers::feed::{FeedController, FeedSort, ReloadFeed};
use crate::controllers::moderation::{AdminSort, AdminView, ModerationController, Refresh};
use crate::entities::Table;
use crate::presenters::{FeedPresenter, ModerationPresenter, SessionPresenter};
use crate::realtime::Synchronizer;
use crate::session::{self, SessionBootstrapper, SurfacePolicy};

pub const USER_CHANNEL: &str = "public-changes";
pub const ADMIN_CHANNEL: &str = "admin-realtime";

pub struct UserApp {
    pub boot: Arc<SessionBootstrapper>,
    pub feed: Arc<FeedController>,
}

impl UserApp {
    pub fn assemble<P>(backend: &Backend, pres: Arc<P>) -> Self
    where P: SessionPresenter + FeedPresenter + Sync + Send + 'static {
        let state = session::shared();

        let feed = Arc::new(FeedController {
            state: state.clone(),
            profiles: backend.profiles.clone(),
            confessions: backend.confessions.clone(),
            comments: backend.comments.clone(),
            reports: backend.reports.clone(),
            pres: pres.clone(),
            sort: Mutex::new(FeedSort::default()),
        });

        let sync = Synchronizer::new(USER_CHANNEL, backend.changes.clone())
            .on(Table::Confessions, Arc::new(ReloadFeed(feed.clone())));

        let boot = Arc::new(SessionBootstrapper {
            policy: SurfacePolicy::USER_APP,
            state,
            identity: backend.identity.clone(),
            profiles: backend.profiles.clone(),
            pres,
            sync: Arc::new(sync),
            landing: feed.clone(),
        });

        Self { boot, feed }
    }

    /// follows the identity provider until it goes away.
    pub async fn run(&self) { self.boot.run(self.boot.identity.observe()).await }
}

pub struct AdminConsole {
    pub boot: Arc<SessionBootstrapper>,
    pub moderation: Arc<ModerationController>,
}

impl AdminConsole {
    pub fn assemble<P>(backend: &Backend, pres: Arc<P>) -> Self
    where P: SessionPresenter + ModerationPresenter + Sync + Send + 'static {
        let state = session::shared();

        let moderation = Arc::new(ModerationController {
            state: state.clone(),
            profiles: backend.profiles.clone(),
            confessions: backend.confessions.clone(),
            reports: backend.reports.clone(),
            pres: pres.clone(),
            sort: Mutex::new(AdminSort::default()),
        });

        let refresh = |view| {
            Arc::new(Refresh {
                ctrl: moderation.clone(),
                view,
            })
        };

        // counters follow every table that feeds a list
        let sync = Synchronizer::new(ADMIN_CHANNEL, backend.changes.clone())
            .on(Table::Reports, refresh(AdminView::Stats))
            .on(Table::Reports, refresh(AdminView::Reports))
            .on(Table::Reports, refresh(AdminView::Incidents))
            .on(Table::Confessions, refresh(AdminView::Stats))
            .on(Table::Confessions, refresh(AdminView::Messages))
            .on(Table::Profiles, refresh(AdminView::Stats))
            .on(Table::Profiles, refresh(AdminView::Users));

        let boot = Arc::new(SessionBootstrapper {
            policy: SurfacePolicy::ADMIN_CONSOLE,
            state,
            identity: backend.identity.clone(),
            profiles: backend.profiles.clone(),
            pres,
            sync: Arc::new(sync),
            landing: moderation.clone(),
        });

        Self { boot, moderation }
    }

    pub async fn run(&self) { self.boot.run(self.boot.identity.observe()).await }
}
