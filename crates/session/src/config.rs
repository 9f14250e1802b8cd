//! Session machine configuration.

use std::time::Duration;

use thiserror::Error;

use rinkside_auth::{CompletionRedirect, Role};

pub const RESOLVE_TIMEOUT_ENV: &str = "RINKSIDE_RESOLVE_TIMEOUT_MS";
pub const DEFAULT_ROLE_ENV: &str = "RINKSIDE_DEFAULT_ROLE";
pub const COMPLETION_REDIRECT_ENV: &str = "RINKSIDE_COMPLETION_REDIRECT";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on how long the snapshot may stay in `Resolving`.
    pub resolve_timeout: Duration,
    /// Role given to lazily created profiles without a sign-up hint.
    pub default_role: Role,
    /// Where the route guard sends users with an unfinished profile.
    pub completion_redirect: CompletionRedirect,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(8),
            default_role: Role::Participant,
            completion_redirect: CompletionRedirect::CompletionPage,
        }
    }
}

impl SessionConfig {
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn with_default_role(mut self, role: Role) -> Self {
        self.default_role = role;
        self
    }

    pub fn with_completion_redirect(mut self, redirect: CompletionRedirect) -> Self {
        self.completion_redirect = redirect;
        self
    }

    /// Load from `RINKSIDE_*` environment variables.
    ///
    /// Unset variables keep their defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(RESOLVE_TIMEOUT_ENV) {
            let millis: u64 = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(RESOLVE_TIMEOUT_ENV, format!("{e}")))?;
            if millis == 0 {
                return Err(ConfigError::invalid(RESOLVE_TIMEOUT_ENV, "must be greater than zero"));
            }
            config.resolve_timeout = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup(DEFAULT_ROLE_ENV) {
            let role: Role = raw
                .parse()
                .map_err(|e| ConfigError::invalid(DEFAULT_ROLE_ENV, format!("{e}")))?;
            if !role.is_self_assignable() {
                return Err(ConfigError::invalid(DEFAULT_ROLE_ENV, format!("'{role}' cannot be a default role")));
            }
            config.default_role = role;
        }

        if let Some(raw) = lookup(COMPLETION_REDIRECT_ENV) {
            config.completion_redirect = raw
                .parse()
                .map_err(|e| ConfigError::invalid(COMPLETION_REDIRECT_ENV, format!("{e}")))?;
        }

        tracing::debug!(
            resolve_timeout = ?config.resolve_timeout,
            default_role = %config.default_role,
            completion_redirect = ?config.completion_redirect,
            "session config loaded"
        );

        Ok(config)
    }
}
