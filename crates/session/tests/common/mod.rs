#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use rinkside_auth::{
    AccessToken, AuthBackend, AuthChange, AuthError, Identity, ProfilePatch, ProfileRecord, ProfileStore,
    Session, SignUpOutcome, SignupMetadata, StoreError,
};
use rinkside_core::{Email, UserId};
use rinkside_events::{EventBus, InMemoryEventBus, Subscription};
use rinkside_infra::{InMemoryAuthBackend, InMemoryProfileStore};
use rinkside_session::{ReadinessSnapshot, SessionConfig, SessionMachine};

pub type Machine = SessionMachine<Arc<InMemoryAuthBackend>, Arc<InMemoryProfileStore>>;

pub fn identity(email: &str) -> Identity {
    Identity::new(UserId::new(), Email::parse(email).unwrap())
}

pub fn session_for(identity: &Identity) -> Session {
    let now = Utc::now();
    Session {
        access_token: AccessToken::new(format!("test-{}", identity.id)),
        identity: identity.clone(),
        issued_at: now - chrono::Duration::minutes(1),
        expires_at: now + chrono::Duration::hours(1),
    }
}

pub fn complete_patch() -> ProfilePatch {
    ProfilePatch::new()
        .first_name("Marie-Philip")
        .last_name("Poulin")
        .phone("+1 514 555 0129")
}

/// Machine over the in-memory adapters, plus handles on both.
pub fn in_memory() -> (Machine, Arc<InMemoryAuthBackend>, Arc<InMemoryProfileStore>) {
    rinkside_observability::init_for_tests();
    let auth = Arc::new(InMemoryAuthBackend::new());
    let store = Arc::new(InMemoryProfileStore::new());
    let machine = SessionMachine::new(auth.clone(), store.clone(), SessionConfig::default());
    (machine, auth, store)
}

/// Wait until `predicate` holds for the published snapshot.
pub async fn wait_for<A, P>(
    machine: &SessionMachine<A, P>,
    predicate: impl FnMut(&ReadinessSnapshot) -> bool,
) -> ReadinessSnapshot
where
    A: AuthBackend + 'static,
    P: ProfileStore + 'static,
{
    let mut rx = machine.watch();
    let snapshot = rx.wait_for(predicate).await.unwrap().clone();
    snapshot
}

/// Profile store whose lookups take a configurable (virtual) time per user.
#[derive(Default)]
pub struct SlowProfileStore {
    inner: InMemoryProfileStore,
    delays: Mutex<HashMap<UserId, Duration>>,
}

impl SlowProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(&self, id: UserId, delay: Duration) {
        self.delays.lock().unwrap().insert(id, delay);
    }

    pub fn rows(&self) -> &InMemoryProfileStore {
        &self.inner
    }
}

#[async_trait]
impl ProfileStore for SlowProfileStore {
    async fn find_by_key(&self, id: UserId) -> Result<Option<ProfileRecord>, StoreError> {
        let delay = self.delays.lock().unwrap().get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.find_by_key(id).await
    }

    async fn insert(&self, record: ProfileRecord) -> Result<(), StoreError> {
        self.inner.insert(record).await
    }

    async fn update(&self, id: UserId, patch: &ProfilePatch) -> Result<ProfileRecord, StoreError> {
        self.inner.update(id, patch).await
    }
}

/// Auth backend that never answers the initial session lookup.
#[derive(Default)]
pub struct SilentBackend {
    changes: InMemoryEventBus<AuthChange>,
}

impl SilentBackend {
    pub fn push(&self, change: AuthChange) {
        self.changes.publish(change).unwrap();
    }
}

#[async_trait]
impl AuthBackend for SilentBackend {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        std::future::pending().await
    }

    fn subscribe(&self) -> Subscription<AuthChange> {
        self.changes.subscribe()
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session, AuthError> {
        std::future::pending().await
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        _metadata: SignupMetadata,
    ) -> Result<SignUpOutcome, AuthError> {
        std::future::pending().await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        std::future::pending().await
    }
}
