//! Database capability and its per-request adapter.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{probe_health, CallTimeouts, ServiceError, ServiceHealth};
use crate::log_event;
use crate::observability::RequestLogger;
use crate::resilience::run_detached;

/// A result row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Parameterized statement execution against a managed database.
#[async_trait]
pub trait DatabaseBackend: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    async fn query(&self, statement: String, params: Vec<Value>) -> Result<Vec<Row>, ServiceError>;

    async fn query_one(
        &self,
        statement: String,
        params: Vec<Value>,
    ) -> Result<Option<Row>, ServiceError>;

    async fn execute(&self, statement: String, params: Vec<Value>) -> Result<(), ServiceError>;

    /// Cheapest possible liveness check (a trivial read).
    async fn probe(&self) -> Result<(), ServiceError>;
}

/// Database handle bound to one request.
#[derive(Clone)]
pub struct DatabaseService {
    backend: Arc<dyn DatabaseBackend>,
    logger: RequestLogger,
    timeouts: CallTimeouts,
}

impl DatabaseService {
    pub fn new(
        backend: Arc<dyn DatabaseBackend>,
        logger: RequestLogger,
        timeouts: CallTimeouts,
    ) -> Self {
        Self {
            backend,
            logger,
            timeouts,
        }
    }

    pub async fn query(&self, statement: &str, params: &[Value]) -> Result<Vec<Row>, ServiceError> {
        self.log_start("Executing database query", statement, params);
        let backend = Arc::clone(&self.backend);
        let (owned_statement, owned_params) = (statement.to_owned(), params.to_vec());
        run_detached("database.query", self.timeouts.call, async move {
            backend.query(owned_statement, owned_params).await
        })
        .await
        .inspect_err(|e| self.log_failure("Database query failed", statement, params, e))
    }

    pub async fn query_one(
        &self,
        statement: &str,
        params: &[Value],
    ) -> Result<Option<Row>, ServiceError> {
        self.log_start("Executing database query (single)", statement, params);
        let backend = Arc::clone(&self.backend);
        let (owned_statement, owned_params) = (statement.to_owned(), params.to_vec());
        run_detached("database.query_one", self.timeouts.call, async move {
            backend.query_one(owned_statement, owned_params).await
        })
        .await
        .inspect_err(|e| self.log_failure("Database query failed", statement, params, e))
    }

    pub async fn execute(&self, statement: &str, params: &[Value]) -> Result<(), ServiceError> {
        self.log_start("Executing database command", statement, params);
        let backend = Arc::clone(&self.backend);
        let (owned_statement, owned_params) = (statement.to_owned(), params.to_vec());
        run_detached("database.execute", self.timeouts.call, async move {
            backend.execute(owned_statement, owned_params).await
        })
        .await
        .inspect_err(|e| self.log_failure("Database command failed", statement, params, e))
    }

    pub async fn health_check(&self) -> ServiceHealth {
        let backend = Arc::clone(&self.backend);
        probe_health("database", &self.logger, self.timeouts, async move {
            backend.probe().await
        })
        .await
    }

    fn log_start(&self, message: &str, statement: &str, params: &[Value]) {
        log_event!(
            self.logger,
            DEBUG,
            backend = self.backend.backend_tag(),
            sql = statement,
            params = %params_json(params),
            "{message}"
        );
    }

    fn log_failure(&self, message: &str, statement: &str, params: &[Value], error: &ServiceError) {
        log_event!(
            self.logger,
            ERROR,
            backend = self.backend.backend_tag(),
            sql = statement,
            params = %params_json(params),
            error = %error,
            "{message}"
        );
    }
}

fn params_json(params: &[Value]) -> Value {
    Value::Array(params.to_vec())
}
