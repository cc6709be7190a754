use std::time::Duration;

/// Default container holding uploaded photos
pub const DEFAULT_CONTAINER: &str = "photos";

/// Configuration for blob operations
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Container (bucket) every upload is written into
    pub container: String,

    /// Absolute max size allowed for a single blob (safety guard)
    pub max_blob_bytes: u64,

    /// Content type stored when the upload does not declare one
    pub fallback_content_type: Option<String>,

    /// Upper bound for streaming one object; the write is aborted when it elapses
    pub transfer_timeout: Option<Duration>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            container: DEFAULT_CONTAINER.to_string(),
            max_blob_bytes: 100 * 1024 * 1024, // 100MB
            fallback_content_type: None,
            transfer_timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl BlobConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target container
    pub fn with_container<S: Into<String>>(mut self, container: S) -> Self {
        self.container = container.into();
        self
    }

    /// Set max blob size
    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }

    pub fn with_fallback_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.fallback_content_type = Some(content_type.into());
        self
    }

    /// Set the transfer timeout (`None` waits forever)
    pub fn with_transfer_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transfer_timeout = timeout;
        self
    }
}
