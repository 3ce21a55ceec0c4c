use std::env;
use std::string::String;

pub const DEFAULT_OUTPUT_PREFIX: &str = "raw";
pub const DEFAULT_METRICS_NAMESPACE: &str = "StreamingPipeline";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bucket_name: String,
    // stored without leading or trailing slashes
    pub output_prefix: String,
    pub metrics_namespace: String,
    pub record_concurrency: usize,
    pub log_level: Option<String>,
}

impl Config {
    pub fn load_from_env() -> Result<Config, ConfigError> {
        let bucket_name = env::var("DATA_BUCKET_NAME")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("DATA_BUCKET_NAME"))?;

        let record_concurrency = env::var("RECORD_CONCURRENCY")
            .unwrap_or("1".to_string())
            .parse::<usize>()
            .map_err(|e| ConfigError::Invalid {
                name: "RECORD_CONCURRENCY",
                reason: e.to_string(),
            })?;
        if record_concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "RECORD_CONCURRENCY",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Config {
            bucket_name,
            output_prefix: normalize_prefix(
                &env::var("OUTPUT_PREFIX").unwrap_or(DEFAULT_OUTPUT_PREFIX.to_string()),
            ),
            metrics_namespace: env::var("METRICS_NAMESPACE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(DEFAULT_METRICS_NAMESPACE.to_string()),
            record_concurrency,
            log_level: env::var("LOG_LEVEL").ok().filter(|s| !s.trim().is_empty()),
        })
    }

    /// Fails when the destination bucket is blank. The handler calls this
    /// before touching any record so a misconfigured invocation does no
    /// partial work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_name.trim().is_empty() {
            return Err(ConfigError::Missing("DATA_BUCKET_NAME"));
        }
        if self.record_concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "RECORD_CONCURRENCY",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().trim_matches('/').to_string()
}
