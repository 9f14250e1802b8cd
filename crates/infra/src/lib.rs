//! Infrastructure adapters for the session machine's ports.
//!
//! Only in-memory implementations live here: they back local development
//! and the test suites. The hosted-service client is wired in by the
//! application shell.

pub mod auth_backend;
pub mod profile_store;

pub use auth_backend::InMemoryAuthBackend;
pub use profile_store::InMemoryProfileStore;
