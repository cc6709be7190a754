use std::env;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use aws_sdk_s3::Client;
use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};

use crate::{
    BlobError, BlobResult, BlobStore, BlobWriter, ContainerStatus, ObjectKey, PutResult,
};

const TRACING_TARGET: &str = "fineup_blob::s3";

/// Smallest part S3 accepts for every part but the last
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for an S3-compatible backend
#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint (MinIO, RustFS, ...). `None` talks to AWS.
    pub endpoint_url: Option<String>,
    /// Static credentials. When absent the default provider chain is used.
    pub credentials: Option<(String, String)>,
    pub force_path_style: bool,
    /// Buffered bytes per uploaded part
    pub part_size: usize,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            credentials: None,
            force_path_style: false,
            part_size: MIN_PART_SIZE,
        }
    }
}

impl S3Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint_url: S) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_credentials<A: Into<String>, S: Into<String>>(mut self, access_key_id: A, secret_access_key: S) -> Self {
        self.credentials = Some((access_key_id.into(), secret_access_key.into()));
        self
    }

    pub fn with_path_style(mut self, force: bool) -> Self {
        self.force_path_style = force;
        self
    }

    /// Set the part size; values below the S3 minimum are raised to it
    pub fn with_part_size(mut self, bytes: usize) -> Self {
        self.part_size = bytes.max(MIN_PART_SIZE);
        self
    }

    /// Parse a `key=value;key=value` connection string.
    ///
    /// Recognized keys: `endpoint`, `region`, `access_key_id`,
    /// `secret_access_key`, `path_style`, `part_size`.
    pub fn from_connection_string(conn: &str) -> BlobResult<Self> {
        let mut config = Self::default();
        let mut access_key_id = None;
        let mut secret_access_key = None;

        for segment in conn.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| BlobError::invalid(format!("Malformed connection string segment '{}'", segment)))?;
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" | "endpoint_url" => config.endpoint_url = Some(value.to_string()),
                "region" => config.region = value.to_string(),
                "access_key_id" => access_key_id = Some(value.to_string()),
                "secret_access_key" => secret_access_key = Some(value.to_string()),
                "path_style" | "force_path_style" => {
                    config.force_path_style = value
                        .parse()
                        .map_err(|_| BlobError::invalid(format!("path_style must be true or false, got '{}'", value)))?
                }
                "part_size" => {
                    let bytes: usize = value
                        .parse()
                        .map_err(|_| BlobError::invalid(format!("part_size must be a byte count, got '{}'", value)))?;
                    config = config.with_part_size(bytes);
                }
                other => {
                    return Err(BlobError::invalid(format!("Unknown connection string key '{}'", other)));
                }
            }
        }

        match (access_key_id, secret_access_key) {
            (Some(id), Some(secret)) => config.credentials = Some((id, secret)),
            (None, None) => {}
            _ => {
                return Err(BlobError::invalid(
                    "access_key_id and secret_access_key must be given together",
                ))
            }
        }

        Ok(config)
    }

    /// Load from `FINEUP_STORAGE_CONNECTION_STRING`, or from the individual
    /// `FINEUP_S3_*` variables when no connection string is set.
    pub fn from_env() -> BlobResult<Self> {
        if let Ok(conn) = env::var("FINEUP_STORAGE_CONNECTION_STRING") {
            return Self::from_connection_string(&conn);
        }

        let mut config = Self::default();
        if let Ok(region) = env::var("FINEUP_S3_REGION") {
            config.region = region;
        }
        if let Ok(endpoint) = env::var("FINEUP_S3_ENDPOINT_URL") {
            config.endpoint_url = Some(endpoint);
            // Self-hosted S3 implementations rarely support virtual-hosted buckets
            config.force_path_style = true;
        }
        if let (Ok(id), Ok(secret)) = (
            env::var("FINEUP_S3_ACCESS_KEY_ID"),
            env::var("FINEUP_S3_SECRET_ACCESS_KEY"),
        ) {
            config.credentials = Some((id, secret));
        }
        Ok(config)
    }
}

/// S3-compatible store streaming uploads through multipart uploads
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    region: String,
    part_size: usize,
}

impl S3CompatibleStore {
    pub async fn new(config: S3Config) -> Self {
        let region = config.region.clone();
        let part_size = config.part_size;
        let client = Self::create_client(config).await;
        Self {
            client,
            region,
            part_size,
        }
    }

    /// Build from environment variables, see `S3Config::from_env`
    pub async fn from_env() -> BlobResult<Self> {
        Ok(Self::new(S3Config::from_env()?).await)
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client, region: String, part_size: usize) -> Self {
        Self {
            client,
            region,
            part_size: part_size.max(MIN_PART_SIZE),
        }
    }

    async fn create_client(config: S3Config) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region));

        if let Some((access_key_id, secret_access_key)) = config.credentials {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "fineup",
            ));
        }
        if let Some(endpoint_url) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        let aws_config = loader.load().await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.force_path_style)
                .build(),
        )
    }

    fn bucket_configuration(&self) -> Option<CreateBucketConfiguration> {
        // us-east-1 rejects an explicit location constraint
        if self.region == DEFAULT_REGION {
            return None;
        }
        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build(),
        )
    }
}

fn describe<E: std::error::Error>(err: E) -> String {
    DisplayErrorContext(err).to_string()
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn ensure_container(&self, container: &str) -> BlobResult<ContainerStatus> {
        let result = self
            .client
            .create_bucket()
            .bucket(container)
            .set_create_bucket_configuration(self.bucket_configuration())
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(target: TRACING_TARGET, bucket = %container, "bucket created");
                Ok(ContainerStatus::Created)
            }
            Err(err) => {
                let exists = err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists())
                    .unwrap_or(false);
                if exists {
                    debug!(target: TRACING_TARGET, bucket = %container, "bucket already exists");
                    Ok(ContainerStatus::Existing)
                } else {
                    Err(BlobError::container_unavailable(container, describe(err)))
                }
            }
        }
    }

    async fn open_write(
        &self,
        container: &str,
        key: &ObjectKey,
        content_type: Option<&str>,
    ) -> BlobResult<Box<dyn BlobWriter>> {
        Ok(Box::new(S3Writer {
            client: self.client.clone(),
            bucket: container.to_string(),
            key: key.clone(),
            content_type: content_type.map(str::to_string),
            part_size: self.part_size,
            buffer: BytesMut::new(),
            upload_id: None,
            parts: Vec::new(),
            size_bytes: 0,
        }))
    }
}

/// Buffers up to one part in memory; larger objects go out as a multipart upload.
struct S3Writer {
    client: Client,
    bucket: String,
    key: ObjectKey,
    content_type: Option<String>,
    part_size: usize,
    buffer: BytesMut,
    /// Set once the first full part is flushed
    upload_id: Option<String>,
    parts: Vec<CompletedPart>,
    size_bytes: u64,
}

impl S3Writer {
    async fn start_multipart(&mut self) -> BlobResult<String> {
        if let Some(id) = &self.upload_id {
            return Ok(id.clone());
        }
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(self.key.as_str())
            .set_content_type(self.content_type.clone())
            .send()
            .await
            .map_err(|e| BlobError::write_failed(self.key.as_str(), describe(e)))?;
        let id = output
            .upload_id()
            .ok_or_else(|| BlobError::write_failed(self.key.as_str(), "backend returned no upload id"))?
            .to_string();
        debug!(target: TRACING_TARGET, key = %self.key, upload_id = %id, "multipart upload started");
        self.upload_id = Some(id.clone());
        Ok(id)
    }

    async fn upload_part(&mut self, data: Bytes) -> BlobResult<()> {
        let upload_id = self.start_multipart().await?;
        let part_number = self.parts.len() as i32 + 1;
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(self.key.as_str())
            .upload_id(upload_id)
            .part_number(part_number)
            .body(AwsByteStream::from(data))
            .send()
            .await
            .map_err(|e| BlobError::write_failed(self.key.as_str(), describe(e)))?;
        self.parts.push(
            CompletedPart::builder()
                .part_number(part_number)
                .set_e_tag(output.e_tag().map(str::to_string))
                .build(),
        );
        Ok(())
    }
}

#[async_trait]
impl BlobWriter for S3Writer {
    async fn write(&mut self, chunk: Bytes) -> BlobResult<()> {
        self.size_bytes += chunk.len() as u64;
        self.buffer.extend_from_slice(&chunk);
        while self.buffer.len() >= self.part_size {
            let part = self.buffer.split_to(self.part_size).freeze();
            self.upload_part(part).await?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> BlobResult<PutResult> {
        let mut this = self;
        let Some(upload_id) = this.upload_id.clone() else {
            // Whole object fits in one part: a single PutObject is enough
            let body = std::mem::take(&mut this.buffer).freeze();
            let output = this
                .client
                .put_object()
                .bucket(&this.bucket)
                .key(this.key.as_str())
                .set_content_type(this.content_type.clone())
                .body(AwsByteStream::from(body))
                .send()
                .await
                .map_err(|e| BlobError::write_failed(this.key.as_str(), describe(e)))?;
            return Ok(PutResult {
                etag: output.e_tag().map(str::to_string),
                size_bytes: this.size_bytes,
            });
        };

        if !this.buffer.is_empty() {
            let last = std::mem::take(&mut this.buffer).freeze();
            this.upload_part(last).await?;
        }

        let parts = std::mem::take(&mut this.parts);
        let output = this
            .client
            .complete_multipart_upload()
            .bucket(&this.bucket)
            .key(this.key.as_str())
            .upload_id(&upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
            .send()
            .await
            .map_err(|e| BlobError::write_failed(this.key.as_str(), describe(e)))?;

        // Completed: nothing left for Drop to abort
        this.upload_id = None;
        Ok(PutResult {
            etag: output.e_tag().map(str::to_string),
            size_bytes: this.size_bytes,
        })
    }

    async fn abort(self: Box<Self>) -> BlobResult<()> {
        let mut this = self;
        let Some(upload_id) = this.upload_id.take() else {
            return Ok(());
        };
        this.client
            .abort_multipart_upload()
            .bucket(&this.bucket)
            .key(this.key.as_str())
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| BlobError::write_failed(this.key.as_str(), describe(e)))?;
        debug!(target: TRACING_TARGET, key = %this.key, "multipart upload aborted");
        Ok(())
    }
}

impl Drop for S3Writer {
    fn drop(&mut self) {
        // Dropped mid-transfer (request cancelled, commit failed): release the
        // server-side parts in the background
        let Some(upload_id) = self.upload_id.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(target: TRACING_TARGET, key = %self.key, upload_id = %upload_id, "no runtime to abort dangling multipart upload");
            return;
        };
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let key = self.key.clone();
        handle.spawn(async move {
            if let Err(e) = client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key.as_str())
                .upload_id(upload_id)
                .send()
                .await
            {
                warn!(target: TRACING_TARGET, key = %key, error = %describe(e), "failed to abort dangling multipart upload");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_connection_string() {
        let config = S3Config::from_connection_string(
            "endpoint=http://localhost:9000; region=eu-west-1;access_key_id=minio;secret_access_key=secret;path_style=true",
        )
        .unwrap();

        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.credentials, Some(("minio".to_string(), "secret".to_string())));
        assert!(config.force_path_style);
        assert_eq!(config.part_size, MIN_PART_SIZE);
    }

    #[test]
    fn keys_are_case_insensitive_and_empty_segments_ignored() {
        let config = S3Config::from_connection_string("Region=ap-south-1;;").unwrap();
        assert_eq!(config.region, "ap-south-1");
        assert!(config.credentials.is_none());
    }

    #[test]
    fn half_credentials_are_rejected() {
        let err = S3Config::from_connection_string("access_key_id=only").unwrap_err();
        assert!(matches!(err, BlobError::Invalid { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = S3Config::from_connection_string("AccountName=devstoreaccount1").unwrap_err();
        assert!(err.to_string().contains("accountname"));
    }

    #[test]
    fn part_size_never_drops_below_minimum() {
        let config = S3Config::from_connection_string("part_size=1024").unwrap();
        assert_eq!(config.part_size, MIN_PART_SIZE);

        let config = S3Config::new().with_part_size(16 * 1024 * 1024);
        assert_eq!(config.part_size, 16 * 1024 * 1024);
    }
}
