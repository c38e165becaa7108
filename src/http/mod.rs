//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → context::middleware (correlation id, start/completion logs)
//!     → health.rs or fallback (404)
//!     → error.rs (ApiError stashed on the response)
//!     → response.rs (uniform body, X-Request-ID)
//!     → Send to client
//! ```

pub mod error;
pub mod health;
pub mod request;
pub mod response;
pub mod server;

pub use error::{ApiError, ValidationIssue};
pub use request::X_REQUEST_ID;
pub use server::{build_router, with_middleware, HttpServer};
