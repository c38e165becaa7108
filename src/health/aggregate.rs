//! Settle-all fan-out over the service probes.

use tokio::task::JoinError;

use super::report::{CompositeHealthReport, ServiceStatuses};
use crate::context::RequestContext;
use crate::log_event;
use crate::observability::{metrics, RequestLogger};
use crate::services::ServiceHealth;

/// Probe every service concurrently and compose the report.
pub async fn check_all(ctx: &RequestContext, version: &str) -> CompositeHealthReport {
    log_event!(ctx.logger(), DEBUG, "Running health checks");

    let database = ctx.db().clone();
    let storage = ctx.storage().clone();
    let queue = ctx.queue().clone();

    let (database, storage, queue) = tokio::join!(
        tokio::spawn(async move { database.health_check().await }),
        tokio::spawn(async move { storage.health_check().await }),
        tokio::spawn(async move { queue.health_check().await }),
    );

    let services = ServiceStatuses {
        database: settle(ctx.logger(), "database", database),
        storage: settle(ctx.logger(), "storage", storage),
        queue: settle(ctx.logger(), "queue", queue),
    };
    for (service, health) in services.iter() {
        metrics::record_service_health(service, health);
    }

    log_event!(
        ctx.logger(),
        INFO,
        database = %services.database,
        storage = %services.storage,
        queue = %services.queue,
        "Health check completed"
    );
    CompositeHealthReport::new(services, version)
}

fn settle(
    logger: &RequestLogger,
    service: &'static str,
    outcome: Result<ServiceHealth, JoinError>,
) -> ServiceHealth {
    outcome.unwrap_or_else(|e| {
        log_event!(logger, ERROR, service, error = %e, "Health probe task failed");
        ServiceHealth::Unhealthy
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[tokio::test]
    async fn test_panicked_probe_is_unhealthy() {
        let logger = RequestLogger::new("settle", LevelFilter::OFF);
        let explode = true;
        let join_error = tokio::spawn(async move {
            if explode {
                panic!("probe exploded");
            }
            ServiceHealth::Healthy
        })
        .await
        .unwrap_err();

        assert_eq!(settle(&logger, "queue", Err(join_error)), ServiceHealth::Unhealthy);
        assert_eq!(
            settle(&logger, "queue", Ok(ServiceHealth::Degraded)),
            ServiceHealth::Degraded
        );
    }
}
