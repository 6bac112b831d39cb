use std::env;
use std::time::Duration;

use camino::Utf8PathBuf;

use crate::domain::normalize_prefix;
use crate::error::BrowserError;

pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_BUCKET: &str = "RNASEQ_S3_BUCKET";
pub const ENV_BASE_PREFIX: &str = "RNASEQ_BASE_PREFIX";
pub const ENV_MAX_OBJECTS: &str = "RNASEQ_MAX_OBJECTS";

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BUCKET: &str = "rnaseqdatabase";
pub const DEFAULT_BASE_PREFIX: &str = "vendor-data/";
pub const DEFAULT_MAX_OBJECTS: usize = 5000;
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 256 * 1024 * 1024;
pub const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub region: String,
    pub bucket: String,
    pub base_prefix: String,
    pub max_objects: usize,
    pub max_archive_bytes: u64,
    pub presign_ttl: Duration,
    pub poll_interval: Duration,
    pub web_root: Utf8PathBuf,
    pub download_dir: Utf8PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            base_prefix: DEFAULT_BASE_PREFIX.to_string(),
            max_objects: DEFAULT_MAX_OBJECTS,
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
            presign_ttl: DEFAULT_PRESIGN_TTL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            web_root: Utf8PathBuf::from("www"),
            download_dir: Utf8PathBuf::from("downloads"),
        }
    }
}

impl BrowserConfig {
    pub fn from_env() -> Result<Self, BrowserError> {
        Self::resolve(
            env::var(ENV_REGION).ok(),
            env::var(ENV_BUCKET).ok(),
            env::var(ENV_BASE_PREFIX).ok(),
            env::var(ENV_MAX_OBJECTS).ok(),
        )
    }

    pub fn resolve(
        region: Option<String>,
        bucket: Option<String>,
        base_prefix: Option<String>,
        max_objects: Option<String>,
    ) -> Result<Self, BrowserError> {
        let max_objects = match max_objects {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                BrowserError::InvalidConfig(format!("{ENV_MAX_OBJECTS} must be a number: {raw}"))
            })?,
            None => DEFAULT_MAX_OBJECTS,
        };
        if max_objects == 0 {
            return Err(BrowserError::InvalidConfig(format!(
                "{ENV_MAX_OBJECTS} must be positive"
            )));
        }

        Ok(Self {
            region: region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket: bucket.unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            base_prefix: normalize_prefix(
                base_prefix.as_deref().unwrap_or(DEFAULT_BASE_PREFIX),
            ),
            max_objects,
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn resolve_defaults() {
        let config = BrowserConfig::resolve(None, None, None, None).unwrap();
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.bucket, DEFAULT_BUCKET);
        assert_eq!(config.base_prefix, DEFAULT_BASE_PREFIX);
        assert_eq!(config.max_objects, DEFAULT_MAX_OBJECTS);
    }

    #[test]
    fn resolve_normalizes_prefix() {
        let config = BrowserConfig::resolve(
            Some("eu-west-1".to_string()),
            Some("mybucket".to_string()),
            Some("/runs".to_string()),
            Some("100".to_string()),
        )
        .unwrap();
        assert_eq!(config.base_prefix, "runs/");
        assert_eq!(config.max_objects, 100);
    }

    #[test]
    fn resolve_rejects_bad_cap() {
        let err =
            BrowserConfig::resolve(None, None, None, Some("many".to_string())).unwrap_err();
        assert_matches!(err, BrowserError::InvalidConfig(_));

        let err = BrowserConfig::resolve(None, None, None, Some("0".to_string())).unwrap_err();
        assert_matches!(err, BrowserError::InvalidConfig(_));
    }
}
