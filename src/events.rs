use serde::de::{self, Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

/// A batch of stream records as delivered by the event source mapping.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StreamEvent {
    pub records: Vec<IncomingRecord>,
}

/// One stream record. The payload is kept in its encoded form so that a bad
/// payload fails only its own record and not the whole batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IncomingRecord {
    pub data: String,
    pub partition_key: Option<String>,
    pub sequence_number: Option<String>,
}

impl IncomingRecord {
    pub fn new(data: impl Into<String>) -> Self {
        IncomingRecord {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    pub fn with_sequence_number(mut self, sequence_number: impl Into<String>) -> Self {
        self.sequence_number = Some(sequence_number.into());
        self
    }
}

impl<'de> Deserialize<'de> for StreamEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw_value: Value = Deserialize::deserialize(deserializer)?;
        let Some(object) = raw_value.as_object() else {
            return Err(de::Error::custom(format!(
                "unsupported event type: {raw_value}"
            )));
        };

        let records = match object.get("Records") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(IncomingRecord::deserialize)
                .collect::<Result<Vec<_>, _>>()
                .map_err(de::Error::custom)?,
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "Records must be a list, got: {other}"
                )))
            }
        };

        debug!("stream event with {} records", records.len());
        Ok(StreamEvent { records })
    }
}

impl<'de> Deserialize<'de> for IncomingRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw_value: Value = Deserialize::deserialize(deserializer)?;
        let Some(object) = raw_value.as_object() else {
            return Err(de::Error::custom(format!(
                "unsupported record type: {raw_value}"
            )));
        };

        // native kinesis records nest the payload under "kinesis", local test
        // events carry the same fields at the top level
        let fields = match object.get("kinesis").and_then(Value::as_object) {
            Some(kinesis) => kinesis,
            None => object,
        };

        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_owned);

        Ok(IncomingRecord {
            data: text("data").unwrap_or_default(),
            partition_key: text("partitionKey"),
            sequence_number: text("sequenceNumber"),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_native_kinesis_event() {
        let evt: StreamEvent = serde_json::from_str(
            r#"{
                "Records": [
                    {
                        "kinesis": {
                            "kinesisSchemaVersion": "1.0",
                            "partitionKey": "k1",
                            "sequenceNumber": "49590338271490256608559692538361571095921575989136588898",
                            "data": "eyJ0ZXN0IjoiZGF0YSJ9",
                            "approximateArrivalTimestamp": 1545084650.987
                        },
                        "eventSource": "aws:kinesis",
                        "eventVersion": "1.0",
                        "eventID": "shardId-000000000006:49590338271490256608559692538361571095921575989136588898",
                        "eventName": "aws:kinesis:record",
                        "awsRegion": "us-east-2",
                        "eventSourceARN": "arn:aws:kinesis:us-east-2:123456789012:stream/real-time-stream"
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            evt.records,
            vec![IncomingRecord::new("eyJ0ZXN0IjoiZGF0YSJ9")
                .with_partition_key("k1")
                .with_sequence_number(
                    "49590338271490256608559692538361571095921575989136588898"
                )]
        );
    }

    #[test]
    fn test_flat_record_without_sequence_number() {
        let evt: StreamEvent = serde_json::from_str(
            r#"{"Records": [{"partitionKey": "test-key", "data": "eyJ0ZXN0IjoiZGF0YSJ9"}]}"#,
        )
        .unwrap();

        assert_eq!(evt.records.len(), 1);
        assert_eq!(evt.records[0].partition_key.as_deref(), Some("test-key"));
        assert_eq!(evt.records[0].sequence_number, None);
    }

    #[test]
    fn test_garbage_payload_still_deserializes() {
        let evt: StreamEvent = serde_json::from_str(
            r#"{"Records": [{"data": "not base64 at all!"}, {"data": 42}, {}]}"#,
        )
        .unwrap();

        assert_eq!(evt.records.len(), 3);
        assert_eq!(evt.records[0].data, "not base64 at all!");
        assert_eq!(evt.records[1].data, "");
        assert_eq!(evt.records[2], IncomingRecord::default());
    }

    #[test]
    fn test_missing_records_is_empty_batch() {
        let evt: StreamEvent = serde_json::from_str("{}").unwrap();
        assert!(evt.records.is_empty());
    }

    #[test]
    fn test_unsupported_shapes() {
        assert!(serde_json::from_str::<StreamEvent>("[]").is_err());
        assert!(serde_json::from_str::<StreamEvent>(r#"{"Records": "nope"}"#).is_err());
        assert!(serde_json::from_str::<StreamEvent>(r#"{"Records": ["nope"]}"#).is_err());
    }
}
