use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::{
    BlobConfig, BlobError, BlobKeyStrategy, BlobReceipt, BlobResult, BlobStore, BlobWriter,
    ByteStream, ContainerStatus, JpegSuffixKeys, ObjectKey,
};

const TRACING_TARGET: &str = "fineup_blob::adapter";

/// The blob adapter embedded by the upload pipeline.
///
/// Owns the store handle, the key strategy and the target container, and turns
/// a `ByteStream` into one committed object.
#[derive(Clone)]
pub struct BlobAdapter {
    store: Arc<dyn BlobStore>,
    keys: Arc<dyn BlobKeyStrategy>,
    config: BlobConfig,
}

impl BlobAdapter {
    /// Create a new blob adapter
    pub fn new<S: BlobStore + 'static>(store: S, config: BlobConfig) -> Self {
        Self::from_arc(Arc::new(store), config)
    }

    /// Create from a shared store handle
    pub fn from_arc(store: Arc<dyn BlobStore>, config: BlobConfig) -> Self {
        Self {
            store,
            keys: Arc::new(JpegSuffixKeys),
            config,
        }
    }

    /// Replace the key strategy
    pub fn with_key_strategy<K: BlobKeyStrategy + 'static>(mut self, keys: K) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    /// Create the configured container if it is absent
    pub async fn ensure_container(&self) -> BlobResult<ContainerStatus> {
        let status = self.store.ensure_container(&self.config.container).await?;
        debug!(
            target: TRACING_TARGET,
            container = %self.config.container,
            created = status.was_created(),
            "container ready"
        );
        Ok(status)
    }

    /// Derive the object key for a client supplied file name
    pub fn object_key(&self, client_file_name: &str) -> ObjectKey {
        self.keys.object_key(client_file_name)
    }

    /// Stream `body` into the configured container under `key` and commit it.
    ///
    /// Any failure while streaming aborts the open write before returning, so the
    /// backend never exposes a half written object under `key`.
    pub async fn put(
        &self,
        key: &ObjectKey,
        content_type: Option<&str>,
        body: ByteStream,
    ) -> BlobResult<BlobReceipt> {
        let content_type = content_type
            .map(str::to_string)
            .or_else(|| self.config.fallback_content_type.clone());

        let mut writer = self
            .store
            .open_write(&self.config.container, key, content_type.as_deref())
            .await?;

        let copied = match self.config.transfer_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.copy(writer.as_mut(), key, body)).await {
                Ok(copied) => copied,
                Err(_) => Err(BlobError::TimedOut {
                    key: key.to_string(),
                    after: limit,
                }),
            },
            None => self.copy(writer.as_mut(), key, body).await,
        };

        if let Err(e) = copied {
            if let Err(abort_err) = writer.abort().await {
                warn!(target: TRACING_TARGET, key = %key, error = %abort_err, "failed to abort write");
            }
            return Err(e);
        }

        let put = writer.commit().await?;
        let receipt = BlobReceipt::committed(&self.config.container, key.clone(), content_type, put);

        debug!(
            target: TRACING_TARGET,
            key = %key,
            size_bytes = receipt.size_bytes,
            "object committed"
        );
        Ok(receipt)
    }

    async fn copy(
        &self,
        writer: &mut dyn BlobWriter,
        key: &ObjectKey,
        mut body: ByteStream,
    ) -> BlobResult<u64> {
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.config.max_blob_bytes {
                return Err(BlobError::invalid(format!(
                    "Blob '{}' exceeds maximum size of {} bytes",
                    key, self.config.max_blob_bytes
                )));
            }
            writer.write(chunk).await?;
        }
        Ok(written)
    }

    /// Get configuration
    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    pub fn container(&self) -> &str {
        &self.config.container
    }
}
