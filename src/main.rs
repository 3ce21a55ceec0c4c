use aws_config::BehaviorVersion;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;
use stream_lake_ingest::clients::AwsClients;
use stream_lake_ingest::config::Config;
use stream_lake_ingest::events::StreamEvent;
use stream_lake_ingest::metrics::cloudwatch::CloudWatchSink;
use stream_lake_ingest::storage::{ObjectStore, S3ObjectStore};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // a missing bucket must stop the function before it accepts any batch
    let config = Config::load_from_env()?;
    stream_lake_ingest::set_up_logging(config.log_level.as_deref());

    info!(
        "Initializing {} version {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let clients = AwsClients::new(&aws_config);
    let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(clients.s3.clone()));
    let metrics_sink = CloudWatchSink::new(clients.cloudwatch.clone(), &config.metrics_namespace);

    run(service_fn(|request: LambdaEvent<StreamEvent>| {
        stream_lake_ingest::handler(store.clone(), &metrics_sink, &config, request)
    }))
    .await
}
