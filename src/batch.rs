use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::events::IncomingRecord;
use crate::metrics::{self, MetricUnit, MetricsSink};
use crate::process::{ProcessingResult, RecordProcessor};

pub const STATUS_OK: u16 = 200;
pub const COMPLETE_MESSAGE: &str = "Batch processing complete";

/// Per-invocation counters. Each invocation starts from zero.
#[derive(Debug)]
pub struct ProcessorState {
    records_processed: usize,
    records_failed: usize,
    started: Instant,
}

impl Default for ProcessorState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorState {
    pub fn new() -> Self {
        ProcessorState {
            records_processed: 0,
            records_failed: 0,
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, result: &ProcessingResult) {
        if result.success {
            self.records_processed += 1;
        } else {
            self.records_failed += 1;
        }
    }

    pub fn records_processed(&self) -> usize {
        self.records_processed
    }

    pub fn records_failed(&self) -> usize {
        self.records_failed
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary::new(
            self.records_processed,
            self.records_failed,
            self.started.elapsed(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub records_processed: usize,
    pub records_failed: usize,
    pub success_rate: f64,
    pub processing_rate_per_second: f64,
    pub elapsed_time_seconds: f64,
}

impl BatchSummary {
    pub fn new(records_processed: usize, records_failed: usize, elapsed: Duration) -> Self {
        let total = records_processed + records_failed;
        let elapsed_time_seconds = elapsed.as_secs_f64();
        BatchSummary {
            records_processed,
            records_failed,
            success_rate: if total > 0 {
                records_processed as f64 / total as f64 * 100.0
            } else {
                100.0
            },
            processing_rate_per_second: if elapsed_time_seconds > 0.0 {
                records_processed as f64 / elapsed_time_seconds
            } else {
                0.0
            },
            elapsed_time_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReport {
    pub sequence_number: String,
    pub success: bool,
    pub error: Option<String>,
}

impl From<ProcessingResult> for RecordReport {
    fn from(result: ProcessingResult) -> Self {
        RecordReport {
            sequence_number: result.record_id,
            success: result.success,
            error: result.error_message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    pub message: String,
    pub records_processed: usize,
    pub records_failed: usize,
    pub results: Vec<RecordReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub status_code: u16,
    pub body: ResponseBody,
}

/// Runs every record of one batch through `processor` and reports the outcome.
///
/// At most `concurrency` records are in flight at once; the reports keep the
/// input order either way. Metric publication is best effort and cannot fail
/// the batch.
pub async fn handle(
    processor: &RecordProcessor,
    metrics_sink: &dyn MetricsSink,
    records: &[IncomingRecord],
    concurrency: usize,
) -> BatchResponse {
    info!("Received {} records from Kinesis", records.len());

    let mut state = ProcessorState::new();
    let outcomes: Vec<ProcessingResult> = stream::iter(records)
        .map(|record| processor.process(record))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut results = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        debug!(
            record_id = %outcome.record_id,
            partition_key = %outcome.partition_key,
            output_path = ?outcome.output_path,
            processing_time_ms = outcome.processing_time_ms,
            "record handled"
        );
        state.record(&outcome);
        results.push(RecordReport::from(outcome));
    }

    let summary = state.summary();
    publish_summary(metrics_sink, &summary).await;
    info!(?summary, "Processing complete");

    BatchResponse {
        status_code: STATUS_OK,
        body: ResponseBody {
            message: COMPLETE_MESSAGE.to_string(),
            records_processed: summary.records_processed,
            records_failed: summary.records_failed,
            results,
        },
    }
}

async fn publish_summary(sink: &dyn MetricsSink, summary: &BatchSummary) {
    metrics::publish(
        sink,
        metrics::RECORDS_PROCESSED,
        summary.records_processed as f64,
        MetricUnit::Count,
    )
    .await;
    metrics::publish(
        sink,
        metrics::RECORDS_FAILED,
        summary.records_failed as f64,
        MetricUnit::Count,
    )
    .await;
    metrics::publish(
        sink,
        metrics::PROCESSING_TIME_MS,
        summary.elapsed_time_seconds * 1000.0,
        MetricUnit::Milliseconds,
    )
    .await;
}
