//! Composite health report.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::services::ServiceHealth;

/// Per-service states, keyed by capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStatuses {
    pub database: ServiceHealth,
    pub storage: ServiceHealth,
    pub queue: ServiceHealth,
}

impl ServiceStatuses {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, ServiceHealth)> {
        [
            ("database", self.database),
            ("storage", self.storage),
            ("queue", self.queue),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositeHealthReport {
    /// `healthy` whenever the report could be composed; per-service states
    /// live in `services`.
    pub status: &'static str,
    #[serde(serialize_with = "rfc3339_millis")]
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub services: ServiceStatuses,
}

impl CompositeHealthReport {
    pub fn new(services: ServiceStatuses, version: impl Into<String>) -> Self {
        Self {
            status: "healthy",
            timestamp: Utc::now(),
            version: version.into(),
            services,
        }
    }
}

fn rfc3339_millis<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}
