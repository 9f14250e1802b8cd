use thiserror::Error;

use rinkside_auth::{AuthError, StoreError};

/// Errors surfaced by the session machine's user-initiated operations
/// (sign-up, profile submission).
///
/// Background resolution never returns errors; it degrades the snapshot
/// instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no user is signed in")]
    NotSignedIn,

    #[error("session machine already bootstrapped")]
    AlreadyBootstrapped,
}
