use serde::{Deserialize, Serialize};

use rinkside_core::{Email, UserId};

use crate::Role;

/// Optional details captured on the sign-up form and carried by the auth
/// backend alongside the identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupMetadata {
    /// Role the user picked when signing up (a hint, not a grant).
    pub role: Option<Role>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SignupMetadata {
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self.last_name = Some(last_name.into());
        self
    }
}

/// Identity of an authenticated user as issued by the auth backend.
///
/// Immutable once issued; profile data that users edit lives on the
/// [`ProfileRecord`](crate::ProfileRecord) instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: Email,
    #[serde(default)]
    pub metadata: SignupMetadata,
}

impl Identity {
    pub fn new(id: UserId, email: Email) -> Self {
        Self {
            id,
            email,
            metadata: SignupMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: SignupMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Role hint from sign-up, ignoring anything that cannot be self-assigned.
    pub fn role_hint(&self) -> Option<Role> {
        self.metadata.role.filter(Role::is_self_assignable)
    }
}
