use chrono::Utc;

use crate::entities::Profile;
use crate::error::{AppError, AppResult};
use crate::presenters::views::Notice;
use crate::presenters::{shown, Notifier};
use crate::session::SharedSession;
use crate::utils::time_ago;

pub mod feed;
pub mod moderation;

/// the resolved profile of the current session.
pub(crate) async fn signed_in(state: &SharedSession) -> AppResult<Profile> {
    state
        .read()
        .await
        .profile
        .clone()
        .ok_or_else(|| AppError::unauthorized("sign in and choose a username first"))
}

/// logs `e`, shows `msg` to the user and hands `e` back.
pub(crate) async fn failed<T, P>(pres: &P, msg: &str, e: AppError) -> AppResult<T>
where P: Notifier + Sync + ?Sized {
    match &e {
        AppError::Backend(_) | AppError::NotFound => tracing::error!("{}: {}", msg, e),
        _ => tracing::debug!("{}: {}", msg, e),
    }
    shown(pres.notify(Notice::error(msg)).await);

    Err(e)
}

pub(crate) fn age(at: chrono::DateTime<Utc>) -> String { time_ago(at, Utc::now()) }
