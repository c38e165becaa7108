//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build bindings → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server drains, consumer leaves its loop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then backends, then listeners
//! - A batch in progress finishes before the consumer stops

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{bind_listener, build_bindings, StartupError};
