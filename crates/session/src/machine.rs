//! The session state machine.
//!
//! ```text
//! Uninitialized ──bootstrap──▶ Resolving ──profile resolved──▶ Ready(Authenticated | Anonymous)
//!                                  │
//!                                  └──────timeout──────────▶ Ready(Degraded)
//! ```
//!
//! The timeout belongs to a resolving episode: it is armed when the machine
//! leaves a settled state, and further changes while still resolving (token
//! refreshes, another identity, `refresh()`) do not push it back.
//!
//! All methods that start background work (`bootstrap`, `on_session_changed`)
//! must run inside a Tokio runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use rinkside_auth::{
    Action, AuthBackend, AuthError, Identity, ProfilePatch, ProfileRecord, ProfileStore, Role,
    RouteGuard, RouteTable, Session, SignUpOutcome, SignupMetadata, StoreError, paths,
};

use crate::{ReadinessSnapshot, SessionConfig, SessionError};

/// Where a resolved profile status came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    /// The row already existed.
    Existing,
    /// The row was missing and has just been created.
    Created,
    /// The store could not be read; the status is a safe default.
    Unavailable,
}

/// Outcome of reading (or creating) a user's profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileStatus {
    pub completed: bool,
    pub role: Option<Role>,
    pub source: ProfileSource,
}

impl ProfileStatus {
    fn existing(record: &ProfileRecord) -> Self {
        Self {
            completed: record.is_complete(),
            role: Some(record.role),
            source: ProfileSource::Existing,
        }
    }

    fn created(role: Role) -> Self {
        Self {
            completed: false,
            role: Some(role),
            source: ProfileSource::Created,
        }
    }

    fn unavailable() -> Self {
        Self {
            completed: false,
            role: None,
            source: ProfileSource::Unavailable,
        }
    }
}

/// Result of [`SessionMachine::sign_out`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOut {
    /// Page the presentation layer should navigate to.
    pub redirect_to: &'static str,
    /// Backend failure, if any. Local state is cleared either way.
    pub backend_error: Option<AuthError>,
}

struct Inner<A, P> {
    auth: A,
    profiles: P,
    config: SessionConfig,
    guard: RouteGuard,
    snapshot: watch::Sender<ReadinessSnapshot>,
    bootstrapped: AtomicBool,
}

/// Owner of the [`ReadinessSnapshot`].
///
/// Cheap to clone; clones share the same snapshot. Build one per process
/// (or per test) and hand clones to whoever needs it.
pub struct SessionMachine<A, P> {
    inner: Arc<Inner<A, P>>,
}

impl<A, P> Clone for SessionMachine<A, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, P> SessionMachine<A, P>
where
    A: AuthBackend + 'static,
    P: ProfileStore + 'static,
{
    /// Machine guarding the registration site's routes.
    pub fn new(auth: A, profiles: P, config: SessionConfig) -> Self {
        Self::with_route_table(auth, profiles, config, RouteTable::registration_site())
    }

    pub fn with_route_table(auth: A, profiles: P, config: SessionConfig, table: RouteTable) -> Self {
        let guard = RouteGuard::new(table, config.completion_redirect);
        let (snapshot, _) = watch::channel(ReadinessSnapshot::uninitialized());
        Self {
            inner: Arc::new(Inner {
                auth,
                profiles,
                config,
                guard,
                snapshot,
                bootstrapped: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.inner.guard
    }

    /// Current snapshot (cloned).
    pub fn snapshot(&self) -> ReadinessSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Reactive view of the snapshot; changes whenever the machine commits.
    pub fn watch(&self) -> watch::Receiver<ReadinessSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Wait until the snapshot is ready and return it.
    pub async fn wait_until_ready(&self) -> ReadinessSnapshot {
        let mut rx = self.watch();
        let ready = rx.wait_for(|snapshot| snapshot.ready).await.map(|s| s.clone());
        // The sender lives in `self`, so the channel cannot close here.
        ready.unwrap_or_else(|_| self.snapshot())
    }

    /// Route guard decision for `path` against the current snapshot.
    pub fn decide(&self, path: &str) -> Action {
        let snapshot = self.inner.snapshot.borrow();
        let verdict = self.inner.guard.explain(&*snapshot, path);
        tracing::debug!(
            path,
            rule = verdict.rule.as_str(),
            generation = snapshot.generation(),
            "route guard decision"
        );
        verdict.action
    }

    /// Start the machine.
    ///
    /// Subscribes to session changes, asks the backend for the persisted
    /// session and arms the resolution watchdog. Returns immediately; watch
    /// the snapshot (or [`Self::wait_until_ready`]) for the outcome.
    ///
    /// A machine bootstraps once; later calls fail with
    /// [`SessionError::AlreadyBootstrapped`].
    pub fn bootstrap(&self) -> Result<SessionListener, SessionError> {
        if self.inner.bootstrapped.swap(true, Ordering::AcqRel) {
            tracing::warn!("bootstrap called twice; ignoring");
            return Err(SessionError::AlreadyBootstrapped);
        }

        let mut subscription = self.inner.auth.subscribe();

        let mut stamp = 0;
        let mut episode = None;
        self.inner.snapshot.send_modify(|snapshot| {
            stamp = snapshot.bump_generation();
            episode = snapshot.enter_resolving();
        });
        tracing::info!(generation = stamp, "bootstrapping session");
        if let Some(episode) = episode {
            self.arm_watchdog(episode);
        }

        let machine = self.clone();
        let initial = tokio::spawn(async move {
            let session = match machine.inner.auth.current_session().await {
                Ok(session) => session,
                Err(err) => {
                    tracing::warn!(error = %err, "session lookup failed; continuing signed out");
                    None
                }
            };
            machine.apply_initial_session(stamp, session).await;
        });

        let machine = self.clone();
        let listener = tokio::spawn(async move {
            while let Some(change) = subscription.recv().await {
                tracing::debug!(kind = ?change.kind, "session change received");
                let resolution = machine.on_session_changed(change.session);
                tokio::spawn(resolution.run());
            }
            tracing::debug!("session change stream ended");
        });

        Ok(SessionListener {
            initial: Some(initial),
            listener: Some(listener),
        })
    }

    /// Record a pushed session change.
    ///
    /// The change is stamped immediately, in delivery order; profile
    /// resolution happens when the returned [`Resolution`] is run. A
    /// signed-out change needs no resolution and is applied right away.
    pub fn on_session_changed(&self, session: Option<Session>) -> Resolution<A, P> {
        let Some(session) = session else {
            let mut stamp = 0;
            self.inner.snapshot.send_modify(|snapshot| {
                stamp = snapshot.bump_generation();
                snapshot.clear_to_anonymous();
            });
            tracing::info!(generation = stamp, "signed out");
            return Resolution::done(self.clone(), stamp);
        };

        let identity = session.identity.clone();
        let mut stamp = 0;
        let mut episode = None;
        self.inner.snapshot.send_modify(|snapshot| {
            stamp = snapshot.bump_generation();
            if snapshot.user_id() != Some(identity.id) {
                episode = snapshot.enter_resolving();
            }
            snapshot.identity = Some(identity.clone());
            snapshot.session = Some(session);
        });
        if let Some(episode) = episode {
            self.arm_watchdog(episode);
        }
        tracing::info!(user_id = %identity.id, generation = stamp, "session changed");

        Resolution::pending(self.clone(), stamp, identity)
    }

    /// Read the profile row for `identity`, creating it if missing.
    ///
    /// Does not touch the snapshot. Store failures are logged and reported
    /// as an incomplete profile with an unknown role.
    pub async fn resolve_profile(&self, identity: &Identity) -> ProfileStatus {
        match self.inner.profiles.find_by_key(identity.id).await {
            Ok(Some(record)) => ProfileStatus::existing(&record),
            Ok(None) => self.create_profile(identity).await,
            Err(err) => {
                tracing::warn!(
                    user_id = %identity.id,
                    error = %err,
                    "profile lookup failed; treating profile as incomplete"
                );
                ProfileStatus::unavailable()
            }
        }
    }

    async fn create_profile(&self, identity: &Identity) -> ProfileStatus {
        let record = ProfileRecord::from_identity(identity, self.inner.config.default_role, Utc::now());
        let role = record.role;

        match self.inner.profiles.insert(record).await {
            Ok(()) => {
                tracing::info!(user_id = %identity.id, role = %role, "created profile");
                ProfileStatus::created(role)
            }
            Err(StoreError::Conflict(_)) => {
                tracing::debug!(user_id = %identity.id, "profile created concurrently; re-reading");
                match self.inner.profiles.find_by_key(identity.id).await {
                    Ok(Some(record)) => ProfileStatus::existing(&record),
                    Ok(None) => ProfileStatus::unavailable(),
                    Err(err) => {
                        tracing::warn!(user_id = %identity.id, error = %err, "profile re-read failed");
                        ProfileStatus::unavailable()
                    }
                }
            }
            Err(err) => {
                tracing::warn!(
                    user_id = %identity.id,
                    error = %err,
                    "profile creation failed; treating profile as incomplete"
                );
                ProfileStatus::unavailable()
            }
        }
    }

    /// Re-resolve the current user's profile and commit the result.
    ///
    /// Used after a profile write so the snapshot does not wait for a push
    /// notification. Returns the snapshot after the attempt; it is unchanged
    /// when nobody is signed in. Readiness is left alone, so a refresh during
    /// resolution keeps the running deadline.
    pub async fn refresh(&self) -> ReadinessSnapshot {
        let mut pending = None;
        self.inner.snapshot.send_if_modified(|snapshot| {
            let Some(identity) = snapshot.identity.clone() else {
                return false;
            };
            pending = Some((snapshot.bump_generation(), identity));
            true
        });

        let Some((stamp, identity)) = pending else {
            tracing::debug!("refresh skipped: no user signed in");
            return self.snapshot();
        };

        self.resolve_and_commit(stamp, &identity).await;
        self.snapshot()
    }

    /// Sign in with email and password.
    ///
    /// The snapshot follows through the backend's session-change push.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        match self.inner.auth.sign_in(email, password).await {
            Ok(session) => {
                tracing::info!(user_id = %session.user_id(), "signed in");
                Ok(session)
            }
            Err(err) => {
                tracing::warn!(error = %err, "sign-in failed");
                Err(err)
            }
        }
    }

    /// Create an account and its profile row.
    ///
    /// The profile takes its role and names from `metadata`. A row that
    /// already exists is left alone.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignupMetadata,
    ) -> Result<SignUpOutcome, SessionError> {
        let outcome = self.inner.auth.sign_up(email, password, metadata).await?;
        let record = ProfileRecord::from_identity(&outcome.identity, self.inner.config.default_role, Utc::now());

        match self.inner.profiles.insert(record).await {
            Ok(()) | Err(StoreError::Conflict(_)) => {}
            Err(err) => {
                tracing::error!(user_id = %outcome.identity.id, error = %err, "profile creation during sign-up failed");
                return Err(err.into());
            }
        }

        tracing::info!(
            user_id = %outcome.identity.id,
            awaiting_confirmation = outcome.session.is_none(),
            "signed up"
        );
        Ok(outcome)
    }

    /// Save a profile patch for the signed-in user, then refresh.
    pub async fn submit_profile(&self, patch: &ProfilePatch) -> Result<ProfileRecord, SessionError> {
        let identity = self.snapshot().identity.ok_or(SessionError::NotSignedIn)?;

        let record = match self.inner.profiles.update(identity.id, patch).await {
            Err(StoreError::NotFound) => {
                self.create_profile(&identity).await;
                self.inner.profiles.update(identity.id, patch).await?
            }
            other => other?,
        };

        self.refresh().await;
        Ok(record)
    }

    /// Sign out.
    ///
    /// Local state is cleared to anonymous whatever the backend says, so the
    /// UI never keeps showing a session the user asked to end.
    pub async fn sign_out(&self) -> SignOut {
        let backend_error = match self.inner.auth.sign_out().await {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(error = %err, "backend sign-out failed; clearing local session anyway");
                Some(err)
            }
        };

        let mut stamp = 0;
        self.inner.snapshot.send_modify(|snapshot| {
            stamp = snapshot.bump_generation();
            snapshot.clear_to_anonymous();
        });
        tracing::info!(generation = stamp, "local session cleared");

        SignOut {
            redirect_to: paths::ENTRY,
            backend_error,
        }
    }

    async fn apply_initial_session(&self, stamp: u64, session: Option<Session>) {
        let session = session.filter(|session| match session.validate(Utc::now()) {
            Ok(()) => true,
            Err(err) => {
                tracing::info!(user_id = %session.user_id(), error = %err, "ignoring persisted session");
                false
            }
        });

        let Some(session) = session else {
            if self.commit_if_current(stamp, ReadinessSnapshot::clear_to_anonymous) {
                tracing::info!(generation = stamp, "no persisted session; ready as anonymous");
            }
            return;
        };

        let identity = session.identity.clone();
        let current = self.commit_if_current(stamp, |snapshot| {
            snapshot.identity = Some(identity.clone());
            snapshot.session = Some(session);
        });
        if current {
            self.resolve_and_commit(stamp, &identity).await;
        } else {
            tracing::debug!(generation = stamp, "persisted session superseded by a newer change");
        }
    }

    async fn resolve_and_commit(&self, stamp: u64, identity: &Identity) {
        let status = self.resolve_profile(identity).await;

        let committed = self.inner.snapshot.send_if_modified(|snapshot| {
            if snapshot.generation() != stamp || snapshot.user_id() != Some(identity.id) {
                return false;
            }
            snapshot.profile_completed = Some(status.completed);
            snapshot.role = status.role;
            snapshot.loading = false;
            snapshot.ready = true;
            snapshot.degraded = false;
            true
        });

        if committed {
            tracing::info!(
                user_id = %identity.id,
                generation = stamp,
                profile_completed = status.completed,
                source = ?status.source,
                "session ready"
            );
        } else {
            tracing::debug!(user_id = %identity.id, generation = stamp, "discarding stale profile resolution");
        }
    }

    fn commit_if_current<F>(&self, stamp: u64, apply: F) -> bool
    where
        F: FnOnce(&mut ReadinessSnapshot),
    {
        self.inner.snapshot.send_if_modified(|snapshot| {
            if snapshot.generation() != stamp {
                return false;
            }
            apply(snapshot);
            true
        })
    }

    fn arm_watchdog(&self, episode: u64) {
        let machine = self.clone();
        let timeout = self.inner.config.resolve_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            machine.force_ready(episode);
        });
    }

    /// Force `Ready(Degraded)` if resolving episode `episode` is still running,
    /// whatever generation it has reached.
    fn force_ready(&self, episode: u64) -> bool {
        let mut generation = 0;
        let forced = self.inner.snapshot.send_if_modified(|snapshot| {
            if snapshot.episode() != episode || snapshot.ready {
                return false;
            }
            generation = snapshot.generation();
            snapshot.profile_completed.get_or_insert(false);
            snapshot.loading = false;
            snapshot.ready = true;
            snapshot.degraded = true;
            true
        });
        if forced {
            tracing::warn!(
                episode,
                generation,
                timeout = ?self.inner.config.resolve_timeout,
                "session resolution timed out; forcing ready state"
            );
        }
        forced
    }
}

/// Profile resolution for one stamped session change.
///
/// Run it (usually via `tokio::spawn`) to resolve the profile and commit the
/// result if the stamp is still current by then.
#[must_use = "a resolution does nothing unless run"]
pub struct Resolution<A, P> {
    machine: SessionMachine<A, P>,
    stamp: u64,
    identity: Option<Identity>,
}

impl<A, P> Resolution<A, P>
where
    A: AuthBackend + 'static,
    P: ProfileStore + 'static,
{
    fn done(machine: SessionMachine<A, P>, stamp: u64) -> Self {
        Self {
            machine,
            stamp,
            identity: None,
        }
    }

    fn pending(machine: SessionMachine<A, P>, stamp: u64, identity: Identity) -> Self {
        Self {
            machine,
            stamp,
            identity: Some(identity),
        }
    }

    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub async fn run(self) {
        if let Some(identity) = self.identity {
            self.machine.resolve_and_commit(self.stamp, &identity).await;
        }
    }
}

/// Handle on the background work started by [`SessionMachine::bootstrap`].
///
/// Dropping it unsubscribes from session changes and abandons the initial
/// session lookup.
#[derive(Debug)]
pub struct SessionListener {
    initial: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
}

impl SessionListener {
    /// Unsubscribe from session changes and wait for the listener to stop.
    pub async fn shutdown(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            let _ = listener.await;
        }
        if let Some(initial) = self.initial.take() {
            initial.abort();
            let _ = initial.await;
        }
        tracing::debug!("session listener stopped");
    }

    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for SessionListener {
    fn drop(&mut self) {
        for handle in [self.listener.take(), self.initial.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}
