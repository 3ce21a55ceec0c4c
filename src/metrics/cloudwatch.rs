use crate::metrics::{MetricUnit, MetricsError, MetricsSink};
use async_trait::async_trait;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{MetricDatum, StandardUnit};
use aws_sdk_cloudwatch::Client as CloudWatchClient;
use std::time::SystemTime;

/// Sends each metric as its own PutMetricData call under a fixed namespace.
pub struct CloudWatchSink {
    client: CloudWatchClient,
    namespace: String,
}

impl CloudWatchSink {
    pub fn new(client: CloudWatchClient, namespace: impl Into<String>) -> Self {
        CloudWatchSink {
            client,
            namespace: namespace.into(),
        }
    }
}

impl From<MetricUnit> for StandardUnit {
    fn from(unit: MetricUnit) -> Self {
        match unit {
            MetricUnit::Count => StandardUnit::Count,
            MetricUnit::Milliseconds => StandardUnit::Milliseconds,
        }
    }
}

fn datum(name: &str, value: f64, unit: MetricUnit, at: SystemTime) -> MetricDatum {
    MetricDatum::builder()
        .metric_name(name)
        .value(value)
        .unit(unit.into())
        .timestamp(DateTime::from(at))
        .build()
}

#[async_trait]
impl MetricsSink for CloudWatchSink {
    async fn put_metric(
        &self,
        name: &str,
        value: f64,
        unit: MetricUnit,
    ) -> Result<(), MetricsError> {
        self.client
            .put_metric_data()
            .namespace(&self.namespace)
            .metric_data(datum(name, value, unit, SystemTime::now()))
            .send()
            .await
            .map_err(|e| MetricsError::Publish {
                name: name.to_string(),
                reason: e.into_service_error().to_string(),
            })?;
        Ok(())
    }
}
