//! Ports to the hosted backend: authentication and the profile table.
//!
//! The session machine only talks to these traits. Adapters (the hosted
//! service client, the in-memory doubles in `rinkside-infra`) live elsewhere.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use rinkside_core::{DomainError, UserId};
use rinkside_events::Subscription;

use crate::{AuthChange, Identity, ProfilePatch, ProfileRecord, Session, SignupMetadata};

/// Failure reported by the auth backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account already exists for this email")]
    EmailTaken,

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("auth backend unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by the profile store.
///
/// "Row missing" is not an error: [`ProfileStore::find_by_key`] returns
/// `Ok(None)` for it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// `update` targeted a row that does not exist.
    #[error("profile not found")]
    NotFound,

    /// `insert` hit an existing row with the same key.
    #[error("profile already exists: {0}")]
    Conflict(String),

    /// The submitted data failed domain validation.
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// Result of a sign-up call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub identity: Identity,
    /// `None` while the backend waits for the user to confirm their email.
    pub session: Option<Session>,
}

/// Authentication backend client.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// One-shot lookup of the currently persisted session, if any.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Push subscription to session changes.
    ///
    /// The subscription yields changes in emission order until it is
    /// unsubscribed or the backend goes away.
    fn subscribe(&self) -> Subscription<AuthChange>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignupMetadata,
    ) -> Result<SignUpOutcome, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Keyed store of profile rows (one per user).
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_key(&self, id: UserId) -> Result<Option<ProfileRecord>, StoreError>;

    async fn insert(&self, record: ProfileRecord) -> Result<(), StoreError>;

    /// Apply `patch` to an existing row and return the stored result.
    async fn update(&self, id: UserId, patch: &ProfilePatch) -> Result<ProfileRecord, StoreError>;
}

#[async_trait]
impl<T> AuthBackend for Arc<T>
where
    T: AuthBackend + ?Sized,
{
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        (**self).current_session().await
    }

    fn subscribe(&self) -> Subscription<AuthChange> {
        (**self).subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        (**self).sign_in(email, password).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignupMetadata,
    ) -> Result<SignUpOutcome, AuthError> {
        (**self).sign_up(email, password, metadata).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        (**self).sign_out().await
    }
}

#[async_trait]
impl<T> ProfileStore for Arc<T>
where
    T: ProfileStore + ?Sized,
{
    async fn find_by_key(&self, id: UserId) -> Result<Option<ProfileRecord>, StoreError> {
        (**self).find_by_key(id).await
    }

    async fn insert(&self, record: ProfileRecord) -> Result<(), StoreError> {
        (**self).insert(record).await
    }

    async fn update(&self, id: UserId, patch: &ProfilePatch) -> Result<ProfileRecord, StoreError> {
        (**self).update(id, patch).await
    }
}
