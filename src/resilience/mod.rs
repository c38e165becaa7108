//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Backend call from an adapter:
//!     → timeouts.rs (detached task + deadline)
//!
//! Message processing failure in the consumer:
//!     → backoff.rs (redelivery delay from attempt count)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - Adapters never retry; retries happen only per queue message
//! - Jittered backoff prevents redelivery storms

pub mod backoff;
pub mod timeouts;

pub use backoff::calculate_backoff;
pub use timeouts::run_detached;
