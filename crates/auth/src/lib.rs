//! `rinkside-auth`: identity, profile and access rules (no IO).
//!
//! Holds the domain types shared by the session machine and its
//! collaborators, the ports to the hosted backend, and the route guard.

pub mod guard;
pub mod identity;
pub mod ports;
pub mod profile;
pub mod roles;
pub mod routes;
pub mod session;

pub use guard::{Action, CompletionRedirect, GuardRule, GuardSubject, GuardVerdict, GuardView, RouteGuard};
pub use identity::{Identity, SignupMetadata};
pub use ports::{AuthBackend, AuthError, ProfileStore, SignUpOutcome, StoreError};
pub use profile::{ProfileField, ProfilePatch, ProfileRecord};
pub use roles::Role;
pub use routes::{RouteKind, RouteSpec, RouteTable, paths};
pub use session::{AccessToken, AuthChange, AuthChangeKind, Session, SessionValidationError};
