//! `rinkside-events`: change-notification plumbing.
//!
//! Push-based pub/sub used by the auth backend to tell the session machine
//! about sign-in, sign-out and token refresh. Transport-agnostic; the
//! in-memory bus is enough for a single client process.

pub mod bus;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
