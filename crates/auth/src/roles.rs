use core::str::FromStr;

use serde::{Deserialize, Serialize};

use rinkside_core::DomainError;

/// Role of a registered user.
///
/// Stored on the profile row and used by the route guard for admin-only
/// screens. Everyone except `Admin` sees the same member area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Participant,
    /// Older sign-up forms stored this as `guardian`.
    #[serde(alias = "guardian")]
    ParentGuardian,
    Coach,
    Volunteer,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Participant,
        Role::ParentGuardian,
        Role::Coach,
        Role::Volunteer,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Participant => "participant",
            Role::ParentGuardian => "parent_guardian",
            Role::Coach => "coach",
            Role::Volunteer => "volunteer",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Whether a user may pick this role for themselves (sign-up metadata,
    /// profile-completion form). Admin is granted out of band.
    pub fn is_self_assignable(&self) -> bool {
        !self.is_admin()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "participant" => Ok(Role::Participant),
            "parent_guardian" | "guardian" => Ok(Role::ParentGuardian),
            "coach" => Ok(Role::Coach),
            "volunteer" => Ok(Role::Volunteer),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}
