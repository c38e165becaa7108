//! Aggregated health reporting.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → http::health handler
//!     → aggregate.rs: spawn database / storage / queue probes
//!     → join all three (settle-all, no short-circuit)
//!     → report.rs: CompositeHealthReport
//! ```
//!
//! # Design Decisions
//! - One probe's failure or hang never delays another's result
//! - A probe task that panics is reported `unhealthy`, not propagated
//! - Reports are built fresh per check; nothing is cached

pub mod aggregate;
pub mod report;

pub use aggregate::check_all;
pub use report::{CompositeHealthReport, ServiceStatuses};
