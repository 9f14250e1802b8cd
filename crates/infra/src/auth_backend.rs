//! In-process stand-in for the hosted auth service.
//!
//! Accounts live in a map keyed by normalised email; passwords are kept in
//! clear because nothing here ever leaves the process. Every session change
//! is pushed through an [`InMemoryEventBus`] in the order it happened.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use rinkside_auth::{
    AccessToken, AuthBackend, AuthChange, AuthError, Identity, Session, SignUpOutcome, SignupMetadata,
};
use rinkside_core::{Email, UserId};
use rinkside_events::{EventBus, InMemoryEventBus, Subscription};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    identity: Identity,
    password: String,
    confirmed: bool,
}

#[derive(Debug)]
pub struct InMemoryAuthBackend {
    accounts: RwLock<HashMap<Email, Account>>,
    current: Mutex<Option<Session>>,
    changes: InMemoryEventBus<AuthChange>,
    auto_confirm: bool,
    session_ttl: Duration,
    outage: RwLock<Option<String>>,
}

impl InMemoryAuthBackend {
    /// Backend that confirms new accounts immediately and issues one-hour
    /// sessions.
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            current: Mutex::new(None),
            changes: InMemoryEventBus::new(),
            auto_confirm: true,
            session_ttl: Duration::hours(1),
            outage: RwLock::new(None),
        }
    }

    /// New accounts must be confirmed with [`Self::confirm_email`] before
    /// they can sign in; `sign_up` then returns no session.
    pub fn with_email_confirmation(mut self) -> Self {
        self.auto_confirm = false;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Create a confirmed account without signing it in.
    pub fn register(&self, email: &str, password: &str, metadata: SignupMetadata) -> Result<Identity, AuthError> {
        let email = parse_email(email)?;
        let identity = Identity::new(UserId::new(), email.clone()).with_metadata(metadata);
        self.add_account(email, password, identity.clone(), true)?;
        Ok(identity)
    }

    pub fn confirm_email(&self, email: &str) -> Result<(), AuthError> {
        let email = parse_email(email)?;
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        let account = accounts.get_mut(&email).ok_or(AuthError::InvalidCredentials)?;
        account.confirmed = true;
        Ok(())
    }

    /// Pretend a session was persisted by an earlier visit.
    ///
    /// Nothing is published; the session is only visible through
    /// `current_session`.
    pub fn restore_session(&self, session: Session) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(session);
        }
    }

    /// Issue a fresh session for `identity` using the configured lifetime.
    pub fn issue_session(&self, identity: &Identity) -> Session {
        let now = Utc::now();
        Session {
            access_token: AccessToken::new(format!("rk_{}", Uuid::now_v7().simple())),
            identity: identity.clone(),
            issued_at: now,
            expires_at: now + self.session_ttl,
        }
    }

    /// Record and push a session change, as the hosted service would.
    pub fn emit(&self, change: AuthChange) {
        if let Ok(mut current) = self.current.lock() {
            current.clone_from(&change.session);
        }
        if let Err(err) = self.changes.publish(change) {
            tracing::warn!(error = ?err, "failed to publish session change");
        }
    }

    /// Number of listeners still subscribed to session changes.
    pub fn subscriber_count(&self) -> usize {
        self.changes.subscriber_count()
    }

    /// Toggle a simulated outage. Every call except `subscribe` fails while
    /// the backend is unavailable.
    pub fn set_available(&self, available: bool) {
        if let Ok(mut outage) = self.outage.write() {
            *outage = (!available).then(|| "simulated outage".to_string());
        }
    }

    fn check_available(&self) -> Result<(), AuthError> {
        let outage = self.outage.read().map_err(|_| poisoned())?;
        match outage.as_ref() {
            Some(reason) => Err(AuthError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn add_account(&self, email: Email, password: &str, identity: Identity, confirmed: bool) -> Result<(), AuthError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Rejected(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailTaken);
        }
        accounts.insert(
            email,
            Account {
                identity,
                password: password.to_string(),
                confirmed,
            },
        );
        Ok(())
    }
}

impl Default for InMemoryAuthBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_email(raw: &str) -> Result<Email, AuthError> {
    Email::parse(raw).map_err(|e| AuthError::Rejected(e.to_string()))
}

fn poisoned() -> AuthError {
    AuthError::Unavailable("lock poisoned".into())
}

#[async_trait]
impl AuthBackend for InMemoryAuthBackend {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        self.check_available()?;
        let current = self.current.lock().map_err(|_| poisoned())?;
        Ok(current.clone())
    }

    fn subscribe(&self) -> Subscription<AuthChange> {
        self.changes.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.check_available()?;
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let identity = {
            let accounts = self.accounts.read().map_err(|_| poisoned())?;
            let account = accounts
                .get(&email)
                .filter(|account| account.password == password)
                .ok_or(AuthError::InvalidCredentials)?;
            if !account.confirmed {
                return Err(AuthError::Rejected("email not confirmed".into()));
            }
            account.identity.clone()
        };

        let session = self.issue_session(&identity);
        self.emit(AuthChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignupMetadata,
    ) -> Result<SignUpOutcome, AuthError> {
        self.check_available()?;
        let email = parse_email(email)?;
        let identity = Identity::new(UserId::new(), email.clone()).with_metadata(metadata);
        self.add_account(email, password, identity.clone(), self.auto_confirm)?;

        let session = self.auto_confirm.then(|| self.issue_session(&identity));
        if let Some(session) = &session {
            self.emit(AuthChange::signed_in(session.clone()));
        }
        Ok(SignUpOutcome { identity, session })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.check_available()?;
        self.emit(AuthChange::signed_out());
        Ok(())
    }
}
