use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use super::{Credentials, IdentityError, IdentityProvider};
use crate::entities::Identity;

/// accounts kept in memory; subjects are random uuids.
pub struct InMemoryIdentityProvider {
    accounts: Mutex<HashMap<String, (String, Identity)>>,
    session: watch::Sender<Option<Identity>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);

        Self {
            accounts: Mutex::new(HashMap::new()),
            session,
        }
    }

    /// publishes `identity` as if a session had been restored.
    pub fn restore(&self, identity: Option<Identity>) { self.session.send_replace(identity); }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_in(
        &self,
        Credentials { email, password }: Credentials,
    ) -> Result<Identity, IdentityError> {
        let identity = match self.accounts.lock().await.get(&email) {
            Some((p, identity)) if *p == password => identity.clone(),
            _ => return Err(IdentityError::Rejected("invalid email or password".to_string())),
        };

        self.session.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(
        &self,
        Credentials { email, password }: Credentials,
    ) -> Result<Identity, IdentityError> {
        let mut guard = self.accounts.lock().await;
        if guard.contains_key(&email) {
            return Err(IdentityError::EmailExists);
        }

        let identity = Identity {
            subject: Uuid::new_v4().simple().to_string(),
            email: Some(email.clone()),
        };
        guard.insert(email, (password, identity.clone()));
        drop(guard);

        self.session.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.session.send_replace(None);
        Ok(())
    }

    fn observe(&self) -> watch::Receiver<Option<Identity>> { self.session.subscribe() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn observer_follows_the_session() {
        let p = InMemoryIdentityProvider::new();
        let rx = p.observe();
        assert!(rx.borrow().is_none());

        let id = p.sign_up(creds("a@example.com", "secret1")).await.unwrap();
        assert_eq!(rx.borrow().as_ref(), Some(&id));

        p.sign_out().await.unwrap();
        assert!(rx.borrow().is_none());

        let again = p.sign_in(creds("a@example.com", "secret1")).await.unwrap();
        assert_eq!(again.subject, id.subject);
    }

    #[tokio::test]
    async fn bad_credentials_and_duplicates() {
        let p = InMemoryIdentityProvider::new();
        p.sign_up(creds("a@example.com", "secret1")).await.unwrap();

        assert!(matches!(
            p.sign_in(creds("a@example.com", "nope")).await,
            Err(IdentityError::Rejected(_))
        ));
        assert!(matches!(
            p.sign_up(creds("a@example.com", "other12")).await,
            Err(IdentityError::EmailExists)
        ));
    }
}
