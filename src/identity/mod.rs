use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::entities::Identity;

pub mod firebase;
pub mod mock;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    /// provider refused the credentials (wrong password, unknown email, weak password...).
    #[error("{0}")]
    Rejected(String),

    #[error("an account already exists for this email")]
    EmailExists,

    #[error("identity provider error: {0}")]
    Provider(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// remote authentication service.
///
/// every session transition is published on [`IdentityProvider::observe`];
/// callers never infer session state from the return values.
#[async_trait]
pub trait IdentityProvider {
    async fn sign_in(&self, credentials: Credentials) -> Result<Identity, IdentityError>;
    async fn sign_up(&self, credentials: Credentials) -> Result<Identity, IdentityError>;
    async fn sign_out(&self) -> Result<(), IdentityError>;

    fn observe(&self) -> watch::Receiver<Option<Identity>>;
}
