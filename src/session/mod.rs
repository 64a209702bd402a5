//! Session bootstrap shared by both surfaces.
//!
//! Every identity transition published by the provider lands in
//! [`SessionBootstrapper::on_session_change`], which resolves the profile, applies
//! the surface's [`SurfacePolicy`] and decides which screen is visible. Only after
//! a profile is resolved does the surface run its initial load and subscribe to
//! realtime changes.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::{watch, RwLock};

use crate::entities::{Identity, Profile};
use crate::error::{AppError, AppResult};
use crate::identity::{Credentials, IdentityProvider};
use crate::presenters::views::{Notice, Screen};
use crate::presenters::{shown, SessionPresenter};
use crate::realtime::Synchronizer;
use crate::repositories::{NewProfile, ProfileRepository};

::lazy_static::lazy_static! {
    static ref USERNAME: Regex = Regex::new(r"^[A-Za-z0-9_]{3,20}$").unwrap();
}

pub const MIN_PASSWORD_LEN: usize = 6;

const USERNAME_RULE: &str = "Username must be 3-20 characters, alphanumeric and underscore only";
const USERNAME_TAKEN: &str = "Username already taken. Please choose another.";
const USERNAME_CHOSEN: &str = "You have already chosen a username.";
const ACCESS_DENIED: &str = "Access Denied: You do not have administrator permissions.";

pub fn is_valid_username(candidate: &str) -> bool { USERNAME.is_match(candidate) }

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub screen: Screen,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            identity: None,
            profile: None,
            screen: Screen::Loading,
        }
    }
}

pub type SharedSession = Arc<RwLock<SessionState>>;

pub fn shared() -> SharedSession { Arc::new(RwLock::new(SessionState::default())) }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedOutAction {
    ShowAuth,
    Redirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfacePolicy {
    pub require_admin: bool,
    pub signed_out: SignedOutAction,
}

impl SurfacePolicy {
    pub const USER_APP: SurfacePolicy = SurfacePolicy {
        require_admin: false,
        signed_out: SignedOutAction::ShowAuth,
    };

    pub const ADMIN_CONSOLE: SurfacePolicy = SurfacePolicy {
        require_admin: true,
        signed_out: SignedOutAction::Redirect,
    };
}

/// the surface's initial load, run once a profile is resolved.
#[async_trait]
pub trait Landing {
    async fn land(&self);
}

pub struct SessionBootstrapper {
    pub policy: SurfacePolicy,
    pub state: SharedSession,
    pub identity: Arc<dyn IdentityProvider + Sync + Send>,
    pub profiles: Arc<dyn ProfileRepository + Sync + Send>,
    pub pres: Arc<dyn SessionPresenter + Sync + Send>,
    pub sync: Arc<Synchronizer>,
    pub landing: Arc<dyn Landing + Sync + Send>,
}

impl SessionBootstrapper {
    /// follows `rx` until the provider goes away, starting with its current value.
    pub async fn run(&self, mut rx: watch::Receiver<Option<Identity>>) {
        loop {
            let current = rx.borrow_and_update().clone();

            if let Err(e) = self.on_session_change(current).await {
                tracing::debug!("session change ended with - {}", e);
            }
            if rx.changed().await.is_err() {
                break tracing::debug!("identity provider closed");
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn on_session_change(&self, identity: Option<Identity>) -> AppResult<()> {
        let identity = match identity {
            Some(i) => i,
            None => return self.signed_out().await,
        };

        let previous = self.state.write().await.identity.replace(identity.clone());
        if previous.map_or(false, |p| p.subject != identity.subject) {
            tracing::info!("identity switched, dropping the previous session");
            self.sync.stop().await;
            self.state.write().await.profile = None;
            shown(self.pres.show_profile(None).await);
        }

        let res = self
            .profiles
            .find_by_uid(&identity.subject)
            .await
            .map_err(AppError::from);
        tracing::trace!("profile - {:?}", res);

        match res {
            Ok(profile) => self.enter(profile).await,
            Err(AppError::NotFound) if self.policy.require_admin => self.deny().await,
            Err(AppError::NotFound) => {
                self.set_screen(Screen::UsernameClaim).await;
                Ok(())
            },
            Err(e) => {
                tracing::error!("cannot load profile: {}", e);
                shown(self.pres.notify(Notice::error("Error loading profile")).await);
                Err(e)
            },
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn claim_username(&self, candidate: &str) -> AppResult<Profile> {
        let username = candidate.trim();

        if !is_valid_username(username) {
            shown(self.pres.notify(Notice::error(USERNAME_RULE)).await);
            return Err(AppError::validation(USERNAME_RULE));
        }
        if self.policy.require_admin {
            return Err(AppError::unauthorized("profiles are claimed from the user app"));
        }

        let (identity, claimed) = {
            let guard = self.state.read().await;
            (guard.identity.clone(), guard.profile.is_some())
        };
        let identity = identity.ok_or_else(|| AppError::unauthorized("sign in first"))?;

        if claimed {
            shown(self.pres.notify(Notice::error(USERNAME_CHOSEN)).await);
            return Err(AppError::Conflict(USERNAME_CHOSEN.to_string()));
        }

        match self.profiles.find_by_username(username).await.map_err(AppError::from) {
            Ok(_) => return self.taken().await,
            Err(AppError::NotFound) => {},
            Err(e) => return self.claim_failed(e).await,
        }

        let inserted = self
            .profiles
            .insert(NewProfile {
                firebase_uid: identity.subject,
                username: username.to_string(),
            })
            .await
            .map_err(AppError::from);

        let profile = match inserted {
            Ok(p) => p,
            Err(AppError::Conflict(m)) => {
                tracing::debug!("insert conflict - {}", m);
                return self.taken().await;
            },
            Err(e) => return self.claim_failed(e).await,
        };

        shown(self.pres.notify(Notice::success("Username set successfully!")).await);
        self.enter(profile.clone()).await?;

        Ok(profile)
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<()> {
        let credentials = self.credentials(email, password).await?;

        match self.identity.sign_in(credentials).await {
            Ok(_) => {
                shown(self.pres.notify(Notice::success("Login successful!")).await);
                Ok(())
            },
            Err(e) => {
                shown(self.pres.notify(Notice::error(e.to_string())).await);
                Err(e.into())
            },
        }
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> AppResult<()> {
        let credentials = self.credentials(email, password).await?;

        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            let msg = format!("Password must be at least {} characters", MIN_PASSWORD_LEN);
            shown(self.pres.notify(Notice::error(msg.clone())).await);
            return Err(AppError::Validation(msg));
        }

        match self.identity.sign_up(credentials).await {
            Ok(_) => {
                shown(self.pres.notify(Notice::success("Account created successfully!")).await);
                Ok(())
            },
            Err(e) => {
                shown(self.pres.notify(Notice::error(e.to_string())).await);
                Err(e.into())
            },
        }
    }

    /// stops realtime before the provider publishes the signed-out session.
    #[tracing::instrument(skip(self))]
    pub async fn sign_out(&self) -> AppResult<()> {
        self.sync.stop().await;

        if let Err(e) = self.identity.sign_out().await {
            shown(self.pres.notify(Notice::error(e.to_string())).await);
            return Err(e.into());
        }

        let mut guard = self.state.write().await;
        guard.identity = None;
        guard.profile = None;
        drop(guard);

        shown(self.pres.notify(Notice::success("Logged out successfully")).await);
        Ok(())
    }

    async fn signed_out(&self) -> AppResult<()> {
        self.sync.stop().await;

        let mut guard = self.state.write().await;
        guard.identity = None;
        guard.profile = None;
        drop(guard);

        shown(self.pres.show_profile(None).await);

        match self.policy.signed_out {
            SignedOutAction::ShowAuth => self.set_screen(Screen::Auth).await,
            SignedOutAction::Redirect => {
                shown(self.pres.redirect().await);
                self.set_screen(Screen::Redirected).await;
            },
        }

        Ok(())
    }

    async fn enter(&self, profile: Profile) -> AppResult<()> {
        if self.policy.require_admin && !profile.is_admin {
            return self.deny().await;
        }

        tracing::info!(
            "profile loaded - @{}{}",
            profile.username,
            if profile.is_admin { " (admin)" } else { "" }
        );

        self.state.write().await.profile = Some(profile.clone());
        shown(self.pres.show_profile(Some(profile)).await);
        self.set_screen(Screen::Main).await;

        self.landing.land().await;

        if let Err(e) = self.sync.start().await {
            tracing::warn!("realtime unavailable: {}", e);
            shown(self.pres.notify(Notice::error("Live updates unavailable")).await);
        }

        Ok(())
    }

    async fn deny(&self) -> AppResult<()> {
        tracing::warn!("unauthorized access denied");
        self.sync.stop().await;

        let mut guard = self.state.write().await;
        guard.identity = None;
        guard.profile = None;
        drop(guard);

        shown(self.pres.notify(Notice::alert(ACCESS_DENIED)).await);
        shown(self.pres.redirect().await);
        self.set_screen(Screen::Redirected).await;

        Err(AppError::unauthorized(ACCESS_DENIED))
    }

    async fn taken(&self) -> AppResult<Profile> {
        shown(self.pres.notify(Notice::error(USERNAME_TAKEN)).await);
        Err(AppError::Conflict(USERNAME_TAKEN.to_string()))
    }

    async fn claim_failed(&self, e: AppError) -> AppResult<Profile> {
        tracing::error!("cannot set username: {}", e);
        shown(
            self.pres
                .notify(Notice::error("Error setting username. Please try again."))
                .await,
        );
        Err(e)
    }

    async fn credentials(&self, email: &str, password: &str) -> AppResult<Credentials> {
        if email.is_empty() || password.is_empty() {
            shown(self.pres.notify(Notice::error("Please fill in all fields")).await);
            return Err(AppError::validation("Please fill in all fields"));
        }

        Ok(Credentials {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    async fn set_screen(&self, screen: Screen) {
        self.state.write().await.screen = screen;
        shown(self.pres.show_screen(screen).await);
    }
}
