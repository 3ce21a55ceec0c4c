use async_trait::async_trait;
use tracing::{debug, warn};

pub mod cloudwatch;

pub const RECORDS_PROCESSED: &str = "RecordsProcessed";
pub const RECORDS_FAILED: &str = "RecordsFailed";
pub const PROCESSING_TIME_MS: &str = "ProcessingTimeMs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Count,
    Milliseconds,
}

#[derive(thiserror::Error, Debug)]
pub enum MetricsError {
    #[error("failed to publish metric {name} - {reason}")]
    Publish { name: String, reason: String },
}

/// Destination for aggregate batch metrics.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn put_metric(&self, name: &str, value: f64, unit: MetricUnit)
        -> Result<(), MetricsError>;
}

/// Publishes one metric, logging and dropping any failure.
pub async fn publish(sink: &dyn MetricsSink, name: &str, value: f64, unit: MetricUnit) {
    match sink.put_metric(name, value, unit).await {
        Ok(()) => debug!("published metric {} = {} {:?}", name, value, unit),
        Err(error) => warn!(%error, "Failed to publish metric"),
    }
}
