//! Deadline enforcement for backend calls.
//!
//! Calls run on their own task. The caller waits at most `limit`; when the
//! deadline passes, or the caller itself is dropped, the task keeps running to
//! completion so a half-applied write is never torn down mid-flight.

use std::future::Future;
use std::time::Duration;

use tracing::Instrument;

use crate::services::ServiceError;

/// Run `call` on a detached task and wait up to `limit` for its result.
pub async fn run_detached<T, F>(
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(call.in_current_span());
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ServiceError::Aborted {
            operation,
            reason: join_error.to_string(),
        }),
        Err(_) => Err(ServiceError::Timeout {
            operation,
            after: limit,
        }),
    }
}
