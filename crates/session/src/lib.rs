//! `rinkside-session`: who is signed in, and may they proceed.
//!
//! The [`SessionMachine`] owns the process-wide [`ReadinessSnapshot`]: it
//! listens to the auth backend's session changes, resolves the user's
//! profile (creating it on first sight), and publishes one consistent read
//! model that pages and the route guard consume.
//!
//! The machine is the only writer of the snapshot. Every session change gets
//! a generation stamp; profile resolutions commit only while their stamp is
//! still current, so slow lookups can never overwrite newer state. A
//! watchdog forces the snapshot ready if resolution takes longer than
//! [`SessionConfig::resolve_timeout`].

pub mod config;
pub mod error;
pub mod machine;
pub mod snapshot;

pub use config::{ConfigError, SessionConfig};
pub use error::SessionError;
pub use machine::{ProfileSource, ProfileStatus, Resolution, SessionListener, SessionMachine, SignOut};
pub use snapshot::{Phase, Readiness, ReadinessSnapshot};
