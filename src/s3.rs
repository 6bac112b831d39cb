use std::time::Duration;

use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use chrono::{DateTime, Utc};

use crate::error::BrowserError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;

/// One raw entry from a listing page, before catalog normalization.
#[derive(Debug, Clone)]
pub struct RawObject {
    pub key: String,
    pub size: Option<i64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<RawObject>,
    pub common_prefixes: Vec<String>,
    pub next_token: Option<String>,
}

pub trait ObjectStoreClient: Send + Sync {
    fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        page_size: i32,
        token: Option<&str>,
    ) -> Result<ListPage, BrowserError>;

    /// Fetches one object fully into memory. When `max_bytes` is set the
    /// download fails fast with `ArchiveTooLarge` instead of buffering past
    /// the ceiling.
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        max_bytes: Option<u64>,
    ) -> Result<Vec<u8>, BrowserError>;

    fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, BrowserError>;
}

impl<T: ObjectStoreClient + ?Sized> ObjectStoreClient for std::sync::Arc<T> {
    fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        page_size: i32,
        token: Option<&str>,
    ) -> Result<ListPage, BrowserError> {
        (**self).list_page(bucket, prefix, delimiter, page_size, token)
    }

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        max_bytes: Option<u64>,
    ) -> Result<Vec<u8>, BrowserError> {
        (**self).get_object(bucket, key, max_bytes)
    }

    fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, BrowserError> {
        (**self).presign_get(bucket, key, ttl)
    }
}

pub struct S3Client {
    runtime: tokio::runtime::Runtime,
    client: Client,
}

impl S3Client {
    pub fn new(region: &str) -> Result<Self, BrowserError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| BrowserError::Runtime(err.to_string()))?;

        let config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS))
                .timeout_config(
                    TimeoutConfig::builder()
                        .connect_timeout(CONNECT_TIMEOUT)
                        .read_timeout(READ_TIMEOUT)
                        .build(),
                )
                .load(),
        );

        Ok(Self {
            runtime,
            client: Client::new(&config),
        })
    }
}

impl ObjectStoreClient for S3Client {
    fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        page_size: i32,
        token: Option<&str>,
    ) -> Result<ListPage, BrowserError> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(page_size);
        if let Some(delimiter) = delimiter {
            request = request.delimiter(delimiter);
        }
        if let Some(token) = token {
            request = request.continuation_token(token);
        }

        let response = self.runtime.block_on(request.send()).map_err(store_error)?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|object| {
                Some(RawObject {
                    key: object.key()?.to_string(),
                    size: object.size(),
                    last_modified: object.last_modified().and_then(to_chrono),
                    storage_class: object
                        .storage_class()
                        .map(|class| class.as_str().to_string()),
                })
            })
            .collect();

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|entry| entry.prefix().map(str::to_string))
            .collect();

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            common_prefixes,
            next_token,
        })
    }

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        max_bytes: Option<u64>,
    ) -> Result<Vec<u8>, BrowserError> {
        self.runtime.block_on(async {
            let output = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(store_error)?;

            if let (Some(limit), Some(length)) = (max_bytes, output.content_length()) {
                if length > 0 && length as u64 > limit {
                    return Err(BrowserError::ArchiveTooLarge {
                        key: key.to_string(),
                        size: length as u64,
                        limit,
                    });
                }
            }

            let mut body = output.body;
            let mut buffer = Vec::new();
            while let Some(chunk) = body.try_next().await.map_err(|err| BrowserError::Store {
                code: "BodyRead".to_string(),
                message: err.to_string(),
            })? {
                if let Some(limit) = max_bytes {
                    if (buffer.len() + chunk.len()) as u64 > limit {
                        return Err(BrowserError::ArchiveTooLarge {
                            key: key.to_string(),
                            size: (buffer.len() + chunk.len()) as u64,
                            limit,
                        });
                    }
                }
                buffer.extend_from_slice(&chunk);
            }
            Ok(buffer)
        })
    }

    fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, BrowserError> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(|err| BrowserError::Store {
            code: "Presign".to_string(),
            message: err.to_string(),
        })?;

        let request = self
            .runtime
            .block_on(
                self.client
                    .get_object()
                    .bucket(bucket)
                    .key(key)
                    .presigned(presigning),
            )
            .map_err(store_error)?;

        Ok(request.uri().to_string())
    }
}

fn store_error<E>(err: SdkError<E>) -> BrowserError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err.code().unwrap_or("ClientError").to_string();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());
    BrowserError::Store { code, message }
}

fn to_chrono(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}
