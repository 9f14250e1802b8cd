//! Route guard: what to do with a navigation, given the session state.
//!
//! - No IO
//! - No panics
//! - Same input, same answer

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use rinkside_core::DomainError;

use crate::routes::{normalize_path, paths};
use crate::{Role, RouteSpec, RouteTable};

/// Session state the guard needs to decide.
///
/// Implemented by the session snapshot; [`GuardView`] is a plain stand-in
/// for tests and callers that carry the fields themselves.
pub trait GuardSubject {
    fn is_ready(&self) -> bool;
    fn is_authenticated(&self) -> bool;
    /// `None` while not yet resolved.
    fn profile_completed(&self) -> Option<bool>;
    /// Role resolved together with the profile; `None` if unknown.
    fn role(&self) -> Option<Role>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardView {
    pub ready: bool,
    pub authenticated: bool,
    pub profile_completed: Option<bool>,
    pub role: Option<Role>,
}

impl GuardView {
    pub fn loading() -> Self {
        Self::default()
    }

    pub fn anonymous() -> Self {
        Self {
            ready: true,
            authenticated: false,
            profile_completed: Some(false),
            role: None,
        }
    }

    pub fn signed_in(role: Role, profile_completed: bool) -> Self {
        Self {
            ready: true,
            authenticated: true,
            profile_completed: Some(profile_completed),
            role: Some(role),
        }
    }
}

impl GuardSubject for GuardView {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn profile_completed(&self) -> Option<bool> {
        self.profile_completed
    }

    fn role(&self) -> Option<Role> {
        self.role
    }
}

/// Where an unfinished profile is sent.
///
/// The registration site has shipped both behaviours; which one is live is
/// a product decision, so it is configuration rather than code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionRedirect {
    /// Dedicated `/complete-profile` wizard.
    #[default]
    CompletionPage,
    /// The dashboard shows the completion form inline.
    DashboardInline,
}

impl CompletionRedirect {
    pub fn target(&self) -> &'static str {
        match self {
            CompletionRedirect::CompletionPage => paths::COMPLETE_PROFILE,
            CompletionRedirect::DashboardInline => paths::DASHBOARD,
        }
    }

    fn action(&self) -> Action {
        match self {
            CompletionRedirect::CompletionPage => Action::RedirectCompleteProfile,
            CompletionRedirect::DashboardInline => Action::RedirectDashboard,
        }
    }
}

impl FromStr for CompletionRedirect {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "page" | "completion_page" => Ok(CompletionRedirect::CompletionPage),
            "dashboard" | "dashboard_inline" => Ok(CompletionRedirect::DashboardInline),
            other => Err(DomainError::validation(format!("unknown completion redirect '{other}'"))),
        }
    }
}

/// Outcome of a navigation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Render,
    ShowLoading,
    /// Sign in first; `from` is replayed afterwards.
    RedirectLogin { from: String },
    RedirectCompleteProfile,
    RedirectDashboard,
}

impl Action {
    /// Path to navigate to, for redirect actions.
    pub fn redirect_path(&self) -> Option<&'static str> {
        match self {
            Action::RedirectLogin { .. } => Some(paths::LOGIN),
            Action::RedirectCompleteProfile => Some(paths::COMPLETE_PROFILE),
            Action::RedirectDashboard => Some(paths::DASHBOARD),
            Action::Render | Action::ShowLoading => None,
        }
    }
}

/// Which check produced the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardRule {
    NotReady,
    PublicRoute,
    Anonymous,
    ProfileIncomplete,
    ProfileAlreadyComplete,
    RoleNotAllowed,
    Allowed,
}

impl GuardRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardRule::NotReady => "not_ready",
            GuardRule::PublicRoute => "public_route",
            GuardRule::Anonymous => "anonymous",
            GuardRule::ProfileIncomplete => "profile_incomplete",
            GuardRule::ProfileAlreadyComplete => "profile_already_complete",
            GuardRule::RoleNotAllowed => "role_not_allowed",
            GuardRule::Allowed => "allowed",
        }
    }
}

/// An action together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardVerdict {
    pub action: Action,
    pub rule: GuardRule,
}

impl GuardVerdict {
    fn new(action: Action, rule: GuardRule) -> Self {
        Self { action, rule }
    }
}

/// Pure navigation policy over a [`RouteTable`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGuard {
    table: RouteTable,
    completion_redirect: CompletionRedirect,
}

impl RouteGuard {
    pub fn new(table: RouteTable, completion_redirect: CompletionRedirect) -> Self {
        Self {
            table,
            completion_redirect,
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn completion_redirect(&self) -> CompletionRedirect {
        self.completion_redirect
    }

    /// Decide what to do with a navigation to `path`.
    pub fn decide<S>(&self, subject: &S, path: &str) -> Action
    where
        S: GuardSubject + ?Sized,
    {
        self.explain(subject, path).action
    }

    /// Like [`Self::decide`], also reporting which rule fired.
    ///
    /// Rules, first match wins:
    /// 1. state not resolved → loading
    /// 2. public route → render
    /// 3. no user → login (remembering `path`)
    /// 4. route needs a finished profile and it is not → completion redirect
    /// 5. completion page with a finished profile → dashboard
    /// 6. role not allowed (or unknown) → dashboard
    /// 7. render
    pub fn explain<S>(&self, subject: &S, path: &str) -> GuardVerdict
    where
        S: GuardSubject + ?Sized,
    {
        let authenticated = subject.is_authenticated();
        let completed = subject.profile_completed();

        if !subject.is_ready() || (authenticated && completed.is_none()) {
            return GuardVerdict::new(Action::ShowLoading, GuardRule::NotReady);
        }

        let route = self.table.resolve(path);
        if route.is_public() {
            return GuardVerdict::new(Action::Render, GuardRule::PublicRoute);
        }

        if !authenticated {
            return GuardVerdict::new(
                Action::RedirectLogin { from: path.to_string() },
                GuardRule::Anonymous,
            );
        }

        let completed = completed == Some(true);
        if route.requires_profile_completion()
            && !completed
            && normalize_path(path) != self.completion_redirect.target()
        {
            return GuardVerdict::new(self.completion_redirect.action(), GuardRule::ProfileIncomplete);
        }

        if route.is_completion_page() && completed {
            return GuardVerdict::new(Action::RedirectDashboard, GuardRule::ProfileAlreadyComplete);
        }

        if !role_allowed(route, subject.role()) {
            return GuardVerdict::new(Action::RedirectDashboard, GuardRule::RoleNotAllowed);
        }

        GuardVerdict::new(Action::Render, GuardRule::Allowed)
    }

    /// Where to go after a successful sign-in.
    ///
    /// Replays the path remembered by [`Action::RedirectLogin`] unless it is
    /// missing or points back at the sign-in pages.
    pub fn post_login_target(from: Option<&str>) -> &str {
        match from {
            Some(path)
                if path.starts_with('/')
                    && !path.starts_with("//")
                    && !matches!(normalize_path(path), paths::LOGIN | paths::SIGNUP) =>
            {
                path
            }
            _ => paths::DASHBOARD,
        }
    }
}

fn role_allowed(route: &RouteSpec, role: Option<Role>) -> bool {
    match route.allowed_roles() {
        None => true,
        Some(allowed) => role.is_some_and(|role| allowed.contains(&role)),
    }
}
