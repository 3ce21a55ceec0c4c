use base64::prelude::*;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::string::FromUtf8Error;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::{Config, ConfigError};
use crate::events::IncomingRecord;
use crate::storage::{ObjectStore, PutObject, StorageError};

pub const PIPELINE_VERSION: &str = "1.0.0";
pub const UNKNOWN_PARTITION_KEY: &str = "unknown";

#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("payload is not valid JSON: {0}")]
    Parse(serde_json::Error),
    #[error("failed to serialize envelope: {0}")]
    Serialize(serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of handling a single record.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    pub record_id: String,
    pub success: bool,
    pub partition_key: String,
    pub output_path: Option<String>,
    pub error_message: Option<String>,
    pub processing_time_ms: f64,
}

impl ProcessingResult {
    fn succeeded(
        record_id: String,
        partition_key: String,
        output_path: String,
        started: Instant,
    ) -> Self {
        ProcessingResult {
            record_id,
            success: true,
            partition_key,
            output_path: Some(output_path),
            error_message: None,
            processing_time_ms: elapsed_ms(started),
        }
    }

    fn failed(
        record_id: String,
        partition_key: String,
        error: &ProcessError,
        started: Instant,
    ) -> Self {
        ProcessingResult {
            record_id,
            success: false,
            partition_key,
            output_path: None,
            error_message: Some(error.to_string()),
            processing_time_ms: elapsed_ms(started),
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Decodes, enriches and persists single stream records.
///
/// Holds no per-batch state; counters live in [`crate::batch::ProcessorState`].
#[derive(Clone)]
pub struct RecordProcessor {
    store: Arc<dyn ObjectStore>,
    bucket_name: String,
    prefix: String,
}

impl RecordProcessor {
    pub fn new(store: Arc<dyn ObjectStore>, config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(RecordProcessor {
            store,
            bucket_name: config.bucket_name.clone(),
            prefix: config.output_prefix.clone(),
        })
    }

    /// Handles one record. Never fails: any decode, parse or storage error is
    /// captured in the returned result.
    pub async fn process(&self, record: &IncomingRecord) -> ProcessingResult {
        let started = Instant::now();
        let record_id = record
            .sequence_number
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let partition_key = record
            .partition_key
            .clone()
            .unwrap_or_else(|| UNKNOWN_PARTITION_KEY.to_string());

        match self.persist(record, &record_id, &partition_key).await {
            Ok(output_path) => {
                info!("Successfully processed record {}", record_id);
                ProcessingResult::succeeded(record_id, partition_key, output_path, started)
            }
            Err(error) => {
                error!("Failed to process record {}: {}", record_id, error);
                ProcessingResult::failed(record_id, partition_key, &error, started)
            }
        }
    }

    async fn persist(
        &self,
        record: &IncomingRecord,
        record_id: &str,
        partition_key: &str,
    ) -> Result<String, ProcessError> {
        let data = decode_payload(&record.data)?;

        let now = Utc::now();
        let body =
            serde_json::to_vec_pretty(&envelope(data, now)).map_err(ProcessError::Serialize)?;
        let object = PutObject {
            bucket: self.bucket_name.clone(),
            key: object_key(&self.prefix, now, &unique_suffix()),
            body,
            content_type: "application/json".to_string(),
            metadata: HashMap::from([
                ("partition_key".to_string(), partition_key.to_string()),
                ("sequence_number".to_string(), record_id.to_string()),
            ]),
        };
        let location = object.location();

        self.store.put(object).await?;
        Ok(location)
    }
}

/// base64 -> UTF-8 -> JSON
pub fn decode_payload(data: &str) -> Result<Value, ProcessError> {
    let bytes = BASE64_STANDARD.decode(data.trim())?;
    let text = String::from_utf8(bytes)?;
    serde_json::from_str(&text).map_err(ProcessError::Parse)
}

pub fn envelope(data: Value, ingested_at: DateTime<Utc>) -> Value {
    json!({
        "data": data,
        "metadata": {
            "ingestion_timestamp": ingested_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            "pipeline_version": PIPELINE_VERSION
        }
    })
}

/// `<prefix>/year=YYYY/month=MM/day=DD/hour=HH/`
pub fn partition_path(prefix: &str, timestamp: DateTime<Utc>) -> String {
    let partitions = timestamp
        .format("year=%Y/month=%m/day=%d/hour=%H/")
        .to_string();
    if prefix.is_empty() {
        partitions
    } else {
        format!("{}/{}", prefix, partitions)
    }
}

pub fn object_key(prefix: &str, timestamp: DateTime<Utc>, suffix: &str) -> String {
    format!(
        "{}data_{}_{}.json",
        partition_path(prefix, timestamp),
        timestamp.format("%Y%m%d_%H%M%S"),
        suffix
    )
}

// keeps keys written within the same second apart
fn unique_suffix() -> String {
    let mut suffix = Uuid::new_v4().simple().to_string();
    suffix.truncate(8);
    suffix
}
