//! Route table: which paths are public, which need a finished profile, and
//! which are limited to certain roles.

use std::borrow::Cow;

use serde::Serialize;

use crate::Role;

/// Well-known paths the guard redirects to.
pub mod paths {
    /// Landing page; where sign-out sends the user.
    pub const ENTRY: &str = "/";
    pub const LOGIN: &str = "/login";
    pub const SIGNUP: &str = "/signup";
    pub const DASHBOARD: &str = "/dashboard";
    pub const COMPLETE_PROFILE: &str = "/complete-profile";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Reachable without signing in.
    Public,
    /// Needs an authenticated user.
    Protected,
    /// The profile-completion wizard (protected, and closed once finished).
    CompletionPage,
}

/// Access rules for one route pattern.
///
/// Patterns are `/`-separated; a segment starting with `:` matches any
/// single non-empty segment (`/programs/:programId/register`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSpec {
    pattern: Cow<'static, str>,
    kind: RouteKind,
    requires_profile_completion: bool,
    allowed_roles: Option<Vec<Role>>,
}

impl RouteSpec {
    pub fn public(pattern: impl Into<Cow<'static, str>>) -> Self {
        Self::with_kind(pattern, RouteKind::Public)
    }

    /// Protected route that also needs a completed profile (the common case).
    pub fn protected(pattern: impl Into<Cow<'static, str>>) -> Self {
        Self::with_kind(pattern, RouteKind::Protected).requiring_completion()
    }

    pub fn completion_page(pattern: impl Into<Cow<'static, str>>) -> Self {
        Self::with_kind(pattern, RouteKind::CompletionPage)
    }

    fn with_kind(pattern: impl Into<Cow<'static, str>>, kind: RouteKind) -> Self {
        Self {
            pattern: pattern.into(),
            kind,
            requires_profile_completion: false,
            allowed_roles: None,
        }
    }

    pub fn requiring_completion(mut self) -> Self {
        self.requires_profile_completion = true;
        self
    }

    pub fn without_completion(mut self) -> Self {
        self.requires_profile_completion = false;
        self
    }

    pub fn allow_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.allowed_roles = Some(roles.into_iter().collect());
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn is_public(&self) -> bool {
        self.kind == RouteKind::Public
    }

    pub fn is_completion_page(&self) -> bool {
        self.kind == RouteKind::CompletionPage
    }

    pub fn requires_profile_completion(&self) -> bool {
        self.requires_profile_completion
    }

    pub fn allowed_roles(&self) -> Option<&[Role]> {
        self.allowed_roles.as_deref()
    }

    /// Number of literal segments if `path` matches, `None` otherwise.
    fn match_score(&self, path: &str) -> Option<usize> {
        let mut pattern = segments(&self.pattern);
        let mut candidate = segments(path);
        let mut literals = 0;
        loop {
            match (pattern.next(), candidate.next()) {
                (None, None) => return Some(literals),
                (Some(p), Some(_)) if p.starts_with(':') => {}
                (Some(p), Some(c)) if p == c => literals += 1,
                _ => return None,
            }
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Strip query string, fragment and trailing slashes: `/a/b/?x=1#y` → `/a/b`.
pub fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() { paths::ENTRY } else { trimmed }
}

/// Ordered set of routes plus the rules applied to unknown paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteTable {
    routes: Vec<RouteSpec>,
    fallback: RouteSpec,
}

impl RouteTable {
    /// Empty table; unknown paths are protected and need a finished profile.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            fallback: RouteSpec::protected("*"),
        }
    }

    pub fn route(mut self, spec: RouteSpec) -> Self {
        self.routes.push(spec);
        self
    }

    pub fn with_fallback(mut self, fallback: RouteSpec) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn routes(&self) -> &[RouteSpec] {
        &self.routes
    }

    /// Route rules for `path`.
    ///
    /// When several patterns match, the one with the most literal segments
    /// wins (`/programs/new` beats `/programs/:programId`); unknown paths get
    /// the fallback.
    pub fn resolve(&self, path: &str) -> &RouteSpec {
        let path = normalize_path(path);
        self.routes
            .iter()
            .filter_map(|spec| spec.match_score(path).map(|score| (score, spec)))
            .fold(None, |best: Option<(usize, &RouteSpec)>, (score, spec)| match best {
                Some((best_score, _)) if best_score >= score => best,
                _ => Some((score, spec)),
            })
            .map(|(_, spec)| spec)
            .unwrap_or(&self.fallback)
    }

    /// The registration site's routes.
    pub fn registration_site() -> Self {
        let admin = [Role::Admin];
        Self::new()
            .route(RouteSpec::public(paths::ENTRY))
            .route(RouteSpec::public(paths::LOGIN))
            .route(RouteSpec::public(paths::SIGNUP))
            .route(RouteSpec::public("/programs"))
            .route(RouteSpec::completion_page(paths::COMPLETE_PROFILE))
            .route(RouteSpec::protected(paths::DASHBOARD))
            .route(RouteSpec::protected("/participants"))
            .route(RouteSpec::protected("/participants/new"))
            .route(RouteSpec::protected("/programs/:programId/register"))
            .route(RouteSpec::protected("/profile"))
            .route(RouteSpec::protected("/registrations"))
            .route(RouteSpec::protected("/admin").allow_roles(admin))
            .route(RouteSpec::protected("/admin/programs").allow_roles(admin))
            .route(RouteSpec::protected("/admin/programs/new").allow_roles(admin))
            .route(RouteSpec::protected("/admin/programs/:programId/edit").allow_roles(admin))
            .route(RouteSpec::protected("/admin/programs/:programId/registrations").allow_roles(admin))
            .route(RouteSpec::protected("/admin/registrations").allow_roles(admin))
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::registration_site()
    }
}
