//! The read model published by the session machine.

use serde::Serialize;

use rinkside_auth::{GuardSubject, Identity, Role, Session};
use rinkside_core::UserId;

/// How a `Ready` snapshot was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Authenticated,
    Anonymous,
    /// Forced by the resolution timeout; profile data may be stale.
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "readiness", rename_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    Resolving,
    Ready(Readiness),
}

/// Snapshot of the session state.
///
/// # Invariants
/// - `ready` implies `profile_completed.is_some()`.
/// - A snapshot forced ready by the timeout has `degraded` set and, if its
///   profile was never resolved, `profile_completed == Some(false)`.
/// - `loading` and `ready` are independent flags: a degraded snapshot has
///   stopped loading without finishing resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessSnapshot {
    pub identity: Option<Identity>,
    #[serde(skip_serializing)]
    pub session: Option<Session>,
    pub loading: bool,
    pub ready: bool,
    pub profile_completed: Option<bool>,
    /// Read together with the profile so route checks need no extra lookup.
    pub role: Option<Role>,
    pub degraded: bool,
    generation: u64,
    /// Counts entries into `Resolving` from a settled state; the timeout
    /// deadline belongs to one episode, not to one generation.
    #[serde(skip)]
    episode: u64,
}

impl ReadinessSnapshot {
    /// State before `bootstrap()` ran.
    pub fn uninitialized() -> Self {
        Self {
            identity: None,
            session: None,
            loading: true,
            ready: false,
            profile_completed: None,
            role: None,
            degraded: false,
            generation: 0,
            episode: 0,
        }
    }

    /// Stamp of the session change this snapshot reflects (0 before bootstrap).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        if self.ready {
            let readiness = if self.degraded {
                Readiness::Degraded
            } else if self.identity.is_some() {
                Readiness::Authenticated
            } else {
                Readiness::Anonymous
            };
            Phase::Ready(readiness)
        } else if self.generation == 0 {
            Phase::Uninitialized
        } else {
            Phase::Resolving
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.identity.as_ref().map(|identity| identity.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Whether to show admin navigation.
    pub fn is_admin(&self) -> bool {
        self.ready && self.role.is_some_and(|role| role.is_admin())
    }

    /// Current resolving episode (0 before the first one).
    pub(crate) fn episode(&self) -> u64 {
        self.episode
    }

    pub(crate) fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub(crate) fn clear_to_anonymous(&mut self) {
        self.identity = None;
        self.session = None;
        self.profile_completed = Some(false);
        self.role = None;
        self.loading = false;
        self.ready = true;
        self.degraded = false;
    }

    /// Drop profile facts and go back to resolving.
    ///
    /// Returns the new episode when this leaves a settled state (or is the
    /// first resolution ever); `None` when an episode is already running,
    /// whose deadline then still applies.
    pub(crate) fn enter_resolving(&mut self) -> Option<u64> {
        let starts_episode = self.ready || self.episode == 0;
        self.profile_completed = None;
        self.role = None;
        self.loading = true;
        self.ready = false;
        self.degraded = false;
        if starts_episode {
            self.episode += 1;
            Some(self.episode)
        } else {
            None
        }
    }
}

impl Default for ReadinessSnapshot {
    fn default() -> Self {
        Self::uninitialized()
    }
}

impl GuardSubject for ReadinessSnapshot {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    fn profile_completed(&self) -> Option<bool> {
        self.profile_completed
    }

    fn role(&self) -> Option<Role> {
        self.role
    }
}

#[cfg(test)]
mod tests {
    use rinkside_core::Email;

    use super::*;

    fn identity() -> Identity {
        Identity::new(UserId::new(), Email::parse("goalie@example.ca").unwrap())
    }

    #[test]
    fn starts_uninitialized() {
        let snapshot = ReadinessSnapshot::default();
        assert_eq!(snapshot.phase(), Phase::Uninitialized);
        assert!(snapshot.loading);
        assert!(!snapshot.ready);
    }

    #[test]
    fn bumping_moves_to_resolving() {
        let mut snapshot = ReadinessSnapshot::default();
        assert_eq!(snapshot.bump_generation(), 1);
        assert_eq!(snapshot.phase(), Phase::Resolving);
    }

    #[test]
    fn anonymous_ready_has_resolved_completion() {
        let mut snapshot = ReadinessSnapshot::default();
        snapshot.bump_generation();
        snapshot.clear_to_anonymous();
        assert_eq!(snapshot.phase(), Phase::Ready(Readiness::Anonymous));
        assert_eq!(snapshot.profile_completed, Some(false));
        assert!(!snapshot.loading);
    }

    #[test]
    fn degraded_takes_precedence_in_phase() {
        let mut snapshot = ReadinessSnapshot::default();
        snapshot.identity = Some(identity());
        snapshot.ready = true;
        snapshot.degraded = true;
        snapshot.profile_completed = Some(false);
        assert_eq!(snapshot.phase(), Phase::Ready(Readiness::Degraded));
    }

    #[test]
    fn admin_flag_requires_ready_admin_role() {
        let mut snapshot = ReadinessSnapshot::default();
        snapshot.identity = Some(identity());
        snapshot.role = Some(Role::Admin);
        assert!(!snapshot.is_admin());
        snapshot.ready = true;
        snapshot.profile_completed = Some(true);
        assert!(snapshot.is_admin());
    }

    #[test]
    fn resolving_clears_previous_profile_facts() {
        let mut snapshot = ReadinessSnapshot::default();
        snapshot.ready = true;
        snapshot.profile_completed = Some(true);
        snapshot.role = Some(Role::Coach);
        assert!(snapshot.enter_resolving().is_some());
        assert_eq!(snapshot.profile_completed, None);
        assert_eq!(snapshot.role, None);
        assert!(!snapshot.ready);
    }

    #[test]
    fn resolving_episode_only_starts_from_a_settled_state() {
        let mut snapshot = ReadinessSnapshot::default();
        assert_eq!(snapshot.enter_resolving(), Some(1));
        assert_eq!(snapshot.enter_resolving(), None);
        assert_eq!(snapshot.episode(), 1);

        snapshot.clear_to_anonymous();
        assert_eq!(snapshot.enter_resolving(), Some(2));
    }
}
