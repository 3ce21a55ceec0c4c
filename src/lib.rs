use lambda_runtime::{Error, LambdaEvent};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::batch::BatchResponse;
use crate::config::Config;
use crate::events::StreamEvent;
use crate::metrics::MetricsSink;
use crate::process::RecordProcessor;
use crate::storage::ObjectStore;
use std::sync::Arc;

pub mod batch;
pub mod clients;
pub mod config;
pub mod events;
pub mod metrics;
pub mod process;
pub mod storage;

/// `RUST_LOG` wins over `LOG_LEVEL`; without either only info and above is shown.
pub fn set_up_logging(log_level: Option<&str>) {
    let default_directive = log_level
        .and_then(|level| level.to_lowercase().parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_directive.into())
                .from_env_lossy(),
        )
        .init();
}

// lambda handler
pub async fn handler(
    store: Arc<dyn ObjectStore>,
    metrics_sink: &dyn MetricsSink,
    config: &Config,
    evt: LambdaEvent<StreamEvent>,
) -> Result<BatchResponse, Error> {
    info!("Handling lambda invocation");
    debug!("Handling event payload: {:?}", evt.payload);

    // configuration problems fail the whole invocation before any record is read
    let processor = RecordProcessor::new(store, config)?;

    let response = batch::handle(
        &processor,
        metrics_sink,
        &evt.payload.records,
        config.record_concurrency,
    )
    .await;

    Ok(response)
}
