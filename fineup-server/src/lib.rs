//! Wiring for the fineup upload server: environment configuration, the S3
//! backed blob adapter and the upload router.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fineup_axum::{IngestConfig, UploadApp, UploadPipeline, UploadState};
use fineup_blob::{BlobAdapter, BlobConfig, BlobStore, S3CompatibleStore, DEFAULT_CONTAINER};
use tracing::info;

const TRACING_TARGET: &str = "fineup_server";

pub struct ServerDefaults;

impl ServerDefaults {
    pub const HOST: &'static str = "127.0.0.1";
    pub const PORT: u16 = 3030;
    pub const MAX_FILE_SIZE_MB: u64 = 100;
    pub const TRANSFER_TIMEOUT_SECS: u64 = 300;
}

/// Headroom on top of the file limit for multipart framing and small fields
const BODY_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Process-wide settings read once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub container: String,
    pub temp_dir: PathBuf,
    pub max_file_bytes: u64,
    /// `None` disables the transfer timeout
    pub transfer_timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable values fall back to
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: String| lookup(key).unwrap_or(default);

        let max_file_mb = parse_or(lookup("FINEUP_MAX_FILE_SIZE_MB"), ServerDefaults::MAX_FILE_SIZE_MB);
        let timeout_secs = parse_or(
            lookup("FINEUP_TRANSFER_TIMEOUT_SECS"),
            ServerDefaults::TRANSFER_TIMEOUT_SECS,
        );

        Self {
            host: var_or("HTTP_HOST", ServerDefaults::HOST.to_string()),
            port: parse_or(lookup("HTTP_PORT"), ServerDefaults::PORT),
            container: var_or("FINEUP_PHOTO_CONTAINER", DEFAULT_CONTAINER.to_string()),
            temp_dir: lookup("FINEUP_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            max_file_bytes: max_file_mb.saturating_mul(1024 * 1024),
            transfer_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn blob_config(&self) -> BlobConfig {
        BlobConfig::default()
            .with_container(self.container.clone())
            .with_max_blob_bytes(self.max_file_bytes)
            .with_transfer_timeout(self.transfer_timeout)
            // Keys always end in .jpg
            .with_fallback_content_type("image/jpeg")
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig::new()
            .temp_dir(self.temp_dir.clone())
            .max_part_bytes(self.max_file_bytes)
    }

    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_file_bytes.saturating_add(BODY_OVERHEAD_BYTES)).unwrap_or(usize::MAX)
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Build the upload app over `store`, creating the photo container first
pub async fn build_with_store(config: &ServerConfig, store: Arc<dyn BlobStore>) -> anyhow::Result<UploadApp> {
    let blobs = BlobAdapter::from_arc(store, config.blob_config());

    let status = blobs.ensure_container().await?;
    info!(
        target: TRACING_TARGET,
        container = %config.container,
        created = status.was_created(),
        "photo container ready"
    );

    let pipeline = UploadPipeline::new(blobs, config.ingest_config());
    let state = UploadState::new(pipeline).with_body_limit(config.body_limit());
    Ok(UploadApp::from_state(state))
}

/// Build the upload app against the S3 compatible store configured in the environment
pub async fn build(config: &ServerConfig) -> anyhow::Result<UploadApp> {
    let store = S3CompatibleStore::from_env().await?;
    build_with_store(config, Arc::new(store)).await
}
