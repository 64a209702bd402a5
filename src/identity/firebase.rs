//! Firebase email/password accounts through the Identity Toolkit REST api.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::{Credentials, IdentityError, IdentityProvider};
use crate::entities::Identity;

const DEFAULT_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// maps an Identity Toolkit error code (e.g. `WEAK_PASSWORD : Password should be ...`)
/// to an [`IdentityError`].
pub fn classify(message: &str) -> IdentityError {
    let code = message.split(':').next().unwrap_or_default().trim();

    match code {
        "EMAIL_EXISTS" => IdentityError::EmailExists,
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            IdentityError::Rejected("invalid email or password".to_string())
        },
        "USER_DISABLED" => IdentityError::Rejected("this account has been disabled".to_string()),
        "WEAK_PASSWORD" => {
            IdentityError::Rejected("password should be at least 6 characters".to_string())
        },
        "INVALID_EMAIL" | "MISSING_EMAIL" => {
            IdentityError::Rejected("the email address is badly formatted".to_string())
        },
        "MISSING_PASSWORD" => IdentityError::Rejected("a password is required".to_string()),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => {
            IdentityError::Rejected("too many attempts, try again later".to_string())
        },
        _ => IdentityError::Provider(message.to_string()),
    }
}

pub struct FirebaseIdentityProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    session: watch::Sender<Option<Identity>>,
}

impl FirebaseIdentityProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let (session, _) = watch::channel(None);

        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            session,
        }
    }

    fn url(&self, action: &str) -> String {
        format!("{}/accounts:{}?key={}", self.endpoint, action, self.api_key)
    }

    #[tracing::instrument(skip(self, password))]
    async fn password_call(
        &self,
        action: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, IdentityError> {
        let res = self
            .http
            .post(self.url(action))
            .json(&PasswordRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();

            return Err(match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(e) => classify(&e.error.message),
                Err(_) => IdentityError::Provider(format!("{}: {}", status, body)),
            });
        }

        let account: AccountResponse = res.json().await?;
        tracing::debug!("signed in as {}", account.local_id);

        Ok(Identity {
            subject: account.local_id,
            email: account.email,
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn sign_in(&self, credentials: Credentials) -> Result<Identity, IdentityError> {
        let identity = self
            .password_call("signInWithPassword", &credentials.email, &credentials.password)
            .await?;

        self.session.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, credentials: Credentials) -> Result<Identity, IdentityError> {
        let identity = self
            .password_call("signUp", &credentials.email, &credentials.password)
            .await?;

        self.session.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.session.send_replace(None);
        Ok(())
    }

    fn observe(&self) -> watch::Receiver<Option<Identity>> { self.session.subscribe() }
}

impl std::fmt::Debug for FirebaseIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseIdentityProvider")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_codes() {
        assert!(matches!(classify("EMAIL_EXISTS"), IdentityError::EmailExists));
        assert!(matches!(
            classify("WEAK_PASSWORD : Password should be at least 6 characters"),
            IdentityError::Rejected(m) if m.contains("6 characters")
        ));
        assert!(matches!(
            classify("INVALID_LOGIN_CREDENTIALS"),
            IdentityError::Rejected(_)
        ));
        assert!(matches!(
            classify("OPERATION_NOT_ALLOWED"),
            IdentityError::Provider(_)
        ));
    }

    #[test]
    fn action_urls() {
        let p = FirebaseIdentityProvider::with_endpoint("http://localhost:9099/v1/", "k");
        assert_eq!(
            p.url("signUp"),
            "http://localhost:9099/v1/accounts:signUp?key=k"
        );
    }

    #[test]
    fn account_payload() {
        let a: AccountResponse = serde_json::from_str(
            r#"{"kind":"identitytoolkit#SignupNewUserResponse","localId":"abc","email":"a@b.c","idToken":"t"}"#,
        )
        .unwrap();
        assert_eq!(a.local_id, "abc");
        assert_eq!(a.email.as_deref(), Some("a@b.c"));
    }
}
