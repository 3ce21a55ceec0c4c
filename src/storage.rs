use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_smithy_types::body::SdkBody;
use aws_smithy_types::byte_stream::ByteStream;
use std::collections::HashMap;
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("failed uploading object to s3://{bucket}/{key} - {reason}")]
    Upload {
        bucket: String,
        key: String,
        reason: String,
    },
}

/// A complete object to be written in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

impl PutObject {
    pub fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// Durable, append-only object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, object: PutObject) -> Result<(), StorageError>;
}

pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    pub fn new(client: S3Client) -> Self {
        S3ObjectStore { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, object: PutObject) -> Result<(), StorageError> {
        let PutObject {
            bucket,
            key,
            body,
            content_type,
            metadata,
        } = object;

        debug!("uploading object to S3: s3://{}/{}", bucket, key);
        self.client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .content_type(content_type)
            .set_metadata(Some(metadata))
            .body(ByteStream::new(SdkBody::from(body)))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                bucket,
                key,
                reason: e.into_service_error().to_string(),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use aws_config::BehaviorVersion;
    use aws_smithy_runtime::client::http::test_util::{ReplayEvent, StaticReplayClient};

    fn mock_s3client(status: u16) -> (S3Client, StaticReplayClient) {
        let replay_client = StaticReplayClient::new(vec![ReplayEvent::new(
            http::Request::builder()
                .body(SdkBody::from(""))
                .unwrap(),
            http::Response::builder()
                .status(status)
                .body(SdkBody::from(""))
                .unwrap(),
        )]);

        let conf = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                "SOMETESTKEYID",
                "somesecretkey",
                Some("somesessiontoken".to_string()),
                None,
                "",
            ))
            .region(aws_sdk_s3::config::Region::new("eu-central-1"))
            .retry_config(aws_sdk_s3::config::retry::RetryConfig::disabled())
            .http_client(replay_client.clone())
            .build();

        (S3Client::from_conf(conf), replay_client)
    }

    fn object() -> PutObject {
        PutObject {
            bucket: "test-bucket".to_string(),
            key: "raw/year=2024/month=03/day=07/hour=09/data_20240307_090512_0a1b2c3d.json"
                .to_string(),
            body: br#"{"data":{}}"#.to_vec(),
            content_type: "application/json".to_string(),
            metadata: HashMap::from([
                ("partition_key".to_string(), "k1".to_string()),
                ("sequence_number".to_string(), "seq-1".to_string()),
            ]),
        }
    }

    #[tokio::test]
    async fn test_put_sends_key_and_metadata() {
        let (client, replay_client) = mock_s3client(200);
        let store = S3ObjectStore::new(client);

        store.put(object()).await.unwrap();

        let requests: Vec<_> = replay_client.actual_requests().collect();
        assert_eq!(requests.len(), 1);
        let request = requests[0];
        // labels are percent-encoded on the wire, so "=" may arrive as "%3D"
        let uri = request.uri().replace("%3D", "=");
        assert!(
            uri.contains("/raw/year=2024/month=03/day=07/hour=09/data_20240307_090512_0a1b2c3d.json"),
            "got uri: {}",
            request.uri()
        );
        assert_eq!(
            request.headers().get("x-amz-meta-partition_key"),
            Some("k1")
        );
        assert_eq!(
            request.headers().get("x-amz-meta-sequence_number"),
            Some("seq-1")
        );
        assert_eq!(
            request.headers().get("content-type"),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_put_failure_is_reported() {
        let (client, _) = mock_s3client(500);
        let store = S3ObjectStore::new(client);

        let err = store.put(object()).await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("failed uploading object to s3://test-bucket/raw/year=2024"));
    }

    #[test]
    fn test_location() {
        assert_eq!(
            object().location(),
            "s3://test-bucket/raw/year=2024/month=03/day=07/hour=09/data_20240307_090512_0a1b2c3d.json"
        );
    }
}
