//! Run Configuration
//!
//! Everything the pipeline needs is read once at startup into an immutable
//! `LakeConfig` and passed by reference to each component. The storage
//! location used by the uploader and by the catalog table is derived here,
//! from the same bucket and prefix, so the two always agree.

use crate::error::{LakeError, Result};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_REGION: &str = "ap-southeast-2";
pub const DEFAULT_BUCKET: &str = "sports-analytics-data-lake";
pub const DEFAULT_DATABASE: &str = "glue_nba_data_lake";
pub const DEFAULT_TABLE: &str = "nba_players";
pub const DEFAULT_SETUP_DATABASE: &str = "nba_analytics";

const RAW_PREFIX: &str = "raw-data/";
const OBJECT_NAME: &str = "nba_player_data.jsonl";
const RESULTS_PREFIX: &str = "athena-results/";

#[derive(Clone, PartialEq, Eq)]
pub struct LakeConfig {
    pub region: String,
    pub bucket: String,
    pub database: String,
    pub table: String,
    /// Database named by the query-service setup statement
    pub setup_database: String,
    pub endpoint: String,
    pub api_key: String,
    pub poll_interval: Duration,
    /// None keeps polling until the query reaches a terminal state
    pub max_wait: Option<Duration>,
    pub bucket_settle_delay: Duration,
}

impl LakeConfig {
    /// Build from process environment variables.
    ///
    /// Call `dotenv::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, test map, ...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let poll_interval_ms = parse_u64(&lookup, "ATHENA_POLL_INTERVAL_MS")?.unwrap_or(1000);
        let max_wait_secs = parse_u64(&lookup, "ATHENA_MAX_WAIT_SECS")?;
        let settle_secs = parse_u64(&lookup, "BUCKET_SETTLE_SECS")?.unwrap_or(5);

        Ok(Self {
            region: get("AWS_DEFAULT_REGION", DEFAULT_REGION),
            bucket: get("LAKE_BUCKET_NAME", DEFAULT_BUCKET),
            database: get("GLUE_DATABASE_NAME", DEFAULT_DATABASE),
            table: get("GLUE_TABLE_NAME", DEFAULT_TABLE),
            setup_database: get("ATHENA_SETUP_DATABASE", DEFAULT_SETUP_DATABASE),
            endpoint: lookup("NBA_ENDPOINT").unwrap_or_default(),
            api_key: lookup("SPORTS_DATA_API_KEY").unwrap_or_default(),
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_wait: max_wait_secs.map(Duration::from_secs),
            bucket_settle_delay: Duration::from_secs(settle_secs),
        })
    }

    /// Fails before any remote call is made
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(LakeError::Configuration(
                "SPORTS_DATA_API_KEY is not set".to_string(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(LakeError::Configuration(
                "NBA_ENDPOINT is not set".to_string(),
            ));
        }

        for (name, value) in [
            ("region", &self.region),
            ("bucket", &self.bucket),
            ("database", &self.database),
            ("table", &self.table),
        ] {
            if value.trim().is_empty() {
                return Err(LakeError::Configuration(format!("{} must not be empty", name)));
            }
        }

        Ok(())
    }

    pub fn raw_prefix(&self) -> &'static str {
        RAW_PREFIX
    }

    /// Key of the single object written per run
    pub fn object_key(&self) -> String {
        format!("{}{}", RAW_PREFIX, OBJECT_NAME)
    }

    /// Location the catalog table points at (the prefix holding `object_key`)
    pub fn table_location(&self) -> String {
        format!("s3://{}/{}", self.bucket, RAW_PREFIX)
    }

    pub fn query_output_location(&self) -> String {
        format!("s3://{}/{}", self.bucket, RESULTS_PREFIX)
    }
}

impl fmt::Debug for LakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LakeConfig")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("database", &self.database)
            .field("table", &self.table)
            .field("setup_database", &self.setup_database)
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("poll_interval", &self.poll_interval)
            .field("max_wait", &self.max_wait)
            .field("bucket_settle_delay", &self.bucket_settle_delay)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| LakeError::Configuration(format!("{} must be a non-negative integer, got '{}'", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<LakeConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LakeConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_applied() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.table, DEFAULT_TABLE);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_wait, None);
        assert_eq!(config.bucket_settle_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_credentials_fail_validation() {
        let config = config_from(&[("NBA_ENDPOINT", "https://example.test/players")]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LakeError::Configuration(ref msg) if msg.contains("SPORTS_DATA_API_KEY")));

        let config = config_from(&[("SPORTS_DATA_API_KEY", "k")]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LakeError::Configuration(ref msg) if msg.contains("NBA_ENDPOINT")));
    }

    #[test]
    fn test_storage_location_derived_from_bucket() {
        let config = config_from(&[
            ("LAKE_BUCKET_NAME", "demo-lake"),
            ("SPORTS_DATA_API_KEY", "k"),
            ("NBA_ENDPOINT", "https://example.test/players"),
        ])
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.object_key(), "raw-data/nba_player_data.jsonl");
        assert_eq!(config.table_location(), "s3://demo-lake/raw-data/");
        assert!(config.object_key().starts_with(config.raw_prefix()));
        assert_eq!(config.query_output_location(), "s3://demo-lake/athena-results/");
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = config_from(&[("ATHENA_POLL_INTERVAL_MS", "soon")]).unwrap_err();
        assert!(matches!(err, LakeError::Configuration(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = config_from(&[("SPORTS_DATA_API_KEY", "super-secret")]).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
