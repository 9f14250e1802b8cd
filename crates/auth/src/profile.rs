//! Profile rows and the profile-completion rule.
//!
//! There is exactly one profile row per user, keyed by the auth backend's
//! user id. Whether a user has "completed their profile" is decided here and
//! nowhere else: pages and the route guard read the result through the
//! session snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rinkside_core::{DomainError, DomainResult, Email, PhoneNumber, UserId};

use crate::{Identity, Role};

/// A field the completion rule requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    FirstName,
    LastName,
    Phone,
}

impl ProfileField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::FirstName => "first_name",
            ProfileField::LastName => "last_name",
            ProfileField::Phone => "phone",
        }
    }
}

impl core::fmt::Display for ProfileField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's profile row.
///
/// # Invariants
/// - `id` equals the owning identity's id and never changes.
/// - `role` is never self-assigned to `Admin` (see [`ProfileRecord::apply_patch`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<PhoneNumber>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRecord {
    /// Minimal row built from what the auth backend knows about a user.
    ///
    /// The role comes from the sign-up hint when there is one, otherwise
    /// `default_role`. A freshly built row is never complete: there is no
    /// phone number yet.
    pub fn from_identity(identity: &Identity, default_role: Role, now: DateTime<Utc>) -> Self {
        let role = identity
            .role_hint()
            .or_else(|| Some(default_role).filter(Role::is_self_assignable))
            .unwrap_or_default();

        Self {
            id: identity.id,
            email: identity.email.clone(),
            first_name: clean(identity.metadata.first_name.as_deref()),
            last_name: clean(identity.metadata.last_name.as_deref()),
            phone: None,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    /// Required fields that are still blank, in form order.
    pub fn missing_fields(&self) -> Vec<ProfileField> {
        let mut missing = Vec::new();
        if self.first_name.trim().is_empty() {
            missing.push(ProfileField::FirstName);
        }
        if self.last_name.trim().is_empty() {
            missing.push(ProfileField::LastName);
        }
        if self.phone.is_none() {
            missing.push(ProfileField::Phone);
        }
        missing
    }

    /// The profile-completion predicate.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Apply a user-submitted patch.
    ///
    /// All fields are validated before anything is written, so a rejected
    /// patch leaves the row untouched.
    pub fn apply_patch(&mut self, patch: &ProfilePatch, now: DateTime<Utc>) -> DomainResult<()> {
        let phone = match patch.phone.as_deref() {
            None => None,
            Some(raw) if raw.trim().is_empty() => Some(None),
            Some(raw) => Some(Some(PhoneNumber::parse(raw)?)),
        };

        if let Some(role) = patch.role {
            if !role.is_self_assignable() && role != self.role {
                return Err(DomainError::validation(format!("role '{role}' cannot be self-assigned")));
            }
        }

        if let Some(first_name) = patch.first_name.as_deref() {
            self.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = patch.last_name.as_deref() {
            self.last_name = last_name.trim().to_string();
        }
        if let Some(phone) = phone {
            self.phone = phone;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        self.updated_at = now;
        Ok(())
    }
}

fn clean(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

/// Partial update of a profile row, as submitted by the profile forms.
///
/// `None` leaves a field alone. An empty `phone` clears the number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
}

impl ProfilePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_name(mut self, value: impl Into<String>) -> Self {
        self.first_name = Some(value.into());
        self
    }

    pub fn last_name(mut self, value: impl Into<String>) -> Self {
        self.last_name = Some(value.into());
        self
    }

    pub fn phone(mut self, value: impl Into<String>) -> Self {
        self.phone = Some(value.into());
        self
    }

    pub fn role(mut self, value: Role) -> Self {
        self.role = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
