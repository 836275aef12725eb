//! Access and password reset tokens.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{Email, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A bearer token returned on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

impl AccessToken {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: token.into(),
            token_type: "bearer".to_string(),
        }
    }
}

/// Trait for issuing and verifying tokens.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Issues an access token for a user.
    async fn issue_access_token(&self, subject: UserId, expires_in: Duration) -> AccessToken;

    /// Returns the user an unexpired access token was issued for.
    async fn verify_access_token(&self, token: &str) -> Option<UserId>;

    /// Issues a password reset token for an email address.
    async fn issue_reset_token(&self, email: &Email, expires_in: Duration) -> String;

    /// Returns the email an unexpired reset token was issued for.
    ///
    /// A reset token verifies once; it is invalid afterwards.
    async fn verify_reset_token(&self, token: &str) -> Option<Email>;
}

#[derive(Debug, Default)]
struct IssuedTokens {
    access: HashMap<String, (UserId, DateTime<Utc>)>,
    reset: HashMap<String, (Email, DateTime<Utc>)>,
}

/// In-memory token issuer producing opaque random tokens.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenIssuer {
    tokens: Arc<RwLock<IssuedTokens>>,
}

impl InMemoryTokenIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_token() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Returns when a token issued now expires, saturating at the latest
    /// representable instant.
    fn expires_at(expires_in: Duration) -> DateTime<Utc> {
        Utc::now()
            .checked_add_signed(expires_in)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns the number of tokens currently held, expired or not.
    pub async fn issued_count(&self) -> usize {
        let tokens = self.tokens.read().await;
        tokens.access.len() + tokens.reset.len()
    }
}

impl IssuedTokens {
    fn prune_expired(&mut self, now: DateTime<Utc>) {
        self.access.retain(|_, (_, expires_at)| *expires_at > now);
        self.reset.retain(|_, (_, expires_at)| *expires_at > now);
    }
}

#[async_trait]
impl TokenIssuer for InMemoryTokenIssuer {
    async fn issue_access_token(&self, subject: UserId, expires_in: Duration) -> AccessToken {
        let token = Self::new_token();
        let mut tokens = self.tokens.write().await;
        tokens.prune_expired(Utc::now());
        tokens
            .access
            .insert(token.clone(), (subject, Self::expires_at(expires_in)));
        AccessToken::bearer(token)
    }

    async fn verify_access_token(&self, token: &str) -> Option<UserId> {
        let tokens = self.tokens.read().await;
        let &(subject, expires_at) = tokens.access.get(token)?;
        (Utc::now() < expires_at).then_some(subject)
    }

    async fn issue_reset_token(&self, email: &Email, expires_in: Duration) -> String {
        let token = Self::new_token();
        let mut tokens = self.tokens.write().await;
        tokens.prune_expired(Utc::now());
        tokens
            .reset
            .insert(token.clone(), (email.clone(), Self::expires_at(expires_in)));
        token
    }

    async fn verify_reset_token(&self, token: &str) -> Option<Email> {
        let (email, expires_at) = self.tokens.write().await.reset.remove(token)?;
        (Utc::now() < expires_at).then_some(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn access_token_resolves_to_subject() {
        let issuer = InMemoryTokenIssuer::new();
        let subject = UserId::new();

        let token = issuer
            .issue_access_token(subject, Duration::minutes(5))
            .await;

        assert_eq!(token.token_type, "bearer");
        assert_eq!(
            issuer.verify_access_token(&token.access_token).await,
            Some(subject)
        );
        assert_eq!(issuer.verify_access_token("unknown").await, None);
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() {
        let issuer = InMemoryTokenIssuer::new();
        let email = Email::parse("a@b.com").unwrap();

        let token = issuer.issue_reset_token(&email, Duration::hours(-1)).await;
        assert_eq!(issuer.verify_reset_token(&token).await, None);

        let token = issuer.issue_reset_token(&email, Duration::hours(1)).await;
        assert_eq!(issuer.verify_reset_token(&token).await, Some(email));
    }

    #[tokio::test]
    async fn token_kinds_are_not_interchangeable() {
        let issuer = InMemoryTokenIssuer::new();
        let email = Email::parse("a@b.com").unwrap();

        let reset = issuer.issue_reset_token(&email, Duration::hours(1)).await;
        assert_eq!(issuer.verify_access_token(&reset).await, None);
    }

    #[tokio::test]
    async fn reset_token_verifies_once() {
        let issuer = InMemoryTokenIssuer::new();
        let email = Email::parse("a@b.com").unwrap();

        let token = issuer.issue_reset_token(&email, Duration::hours(1)).await;

        assert_eq!(issuer.verify_reset_token(&token).await, Some(email));
        assert_eq!(issuer.verify_reset_token(&token).await, None);
    }

    #[tokio::test]
    async fn expired_tokens_are_pruned_on_issue() {
        let issuer = InMemoryTokenIssuer::new();
        let email = Email::parse("a@b.com").unwrap();

        issuer.issue_reset_token(&email, Duration::hours(-1)).await;
        issuer
            .issue_access_token(UserId::new(), Duration::minutes(-1))
            .await;
        issuer
            .issue_access_token(UserId::new(), Duration::minutes(5))
            .await;

        assert_eq!(issuer.issued_count().await, 1);
    }

    #[tokio::test]
    async fn huge_lifetime_saturates_instead_of_overflowing() {
        let issuer = InMemoryTokenIssuer::new();
        let subject = UserId::new();

        let token = issuer
            .issue_access_token(subject, Duration::MAX)
            .await;

        assert_eq!(
            issuer.verify_access_token(&token.access_token).await,
            Some(subject)
        );
    }
}
