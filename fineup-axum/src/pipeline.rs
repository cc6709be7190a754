use bytes::Bytes;
use fineup_blob::BlobAdapter;
use futures::Stream;
use tracing::{debug, info, warn};

use crate::multipart::{
    boundary_from_content_type, IngestConfig, IngestedPart, IngestedParts, MultipartIngestor, PartKind,
};
use crate::response::UploadResult;
use crate::UploadError;

const TRACING_TARGET: &str = "fineup_axum::pipeline";

/// Orchestrates one upload request end to end.
///
/// Shared across requests behind an `Arc`; holds no per-request state.
#[derive(Clone)]
pub struct UploadPipeline {
    blobs: BlobAdapter,
    ingestor: MultipartIngestor,
}

impl UploadPipeline {
    pub fn new(blobs: BlobAdapter, ingest: IngestConfig) -> Self {
        Self {
            blobs,
            ingestor: MultipartIngestor::new(ingest),
        }
    }

    pub fn blobs(&self) -> &BlobAdapter {
        &self.blobs
    }

    pub fn ingestor(&self) -> &MultipartIngestor {
        &self.ingestor
    }

    /// Process one multipart body. Never fails: errors end up in the result.
    #[tracing::instrument(skip_all, fields(container = %self.blobs.container()))]
    pub async fn process<S, O, E>(&self, content_type: Option<&str>, body: S) -> UploadResult
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let mut result = UploadResult::new();
        match self.run(&mut result, content_type, body).await {
            Ok(()) => {
                result.success = true;
                info!(
                    target: TRACING_TARGET,
                    file_name = result.file_name.as_deref().unwrap_or(""),
                    "upload processed"
                );
            }
            Err(e) => {
                warn!(target: TRACING_TARGET, kind = e.kind(), error = %e, "upload failed");
                result = result.failed(e.to_string());
            }
        }
        result
    }

    async fn run<S, O, E>(
        &self,
        result: &mut UploadResult,
        content_type: Option<&str>,
        body: S,
    ) -> Result<(), UploadError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let boundary = boundary_from_content_type(content_type)?;
        let mut parts = self.ingestor.parse(body, &boundary).await?;
        debug!(target: TRACING_TARGET, parts = parts.len(), "body ingested");

        let outcome = self.transfer_parts(&mut parts, result).await;
        // Parts after a failing one were never reached
        parts.release_all().await;
        outcome
    }

    async fn transfer_parts(
        &self,
        parts: &mut IngestedParts,
        result: &mut UploadResult,
    ) -> Result<(), UploadError> {
        for part in parts.iter_mut() {
            let outcome = self.handle_part(part, result).await;
            part.release().await;
            outcome?;
        }
        Ok(())
    }

    async fn handle_part(&self, part: &IngestedPart, result: &mut UploadResult) -> Result<(), UploadError> {
        match part.kind() {
            PartKind::File => {
                // Used verbatim; only a part without a filename attribute is rejected
                let file_name = part.client_file_name().ok_or_else(|| UploadError::MissingFileName {
                    field: part.field_name().to_string(),
                })?;

                let key = self.blobs.object_key(file_name);
                // Reported even if the transfer below fails
                result.file_name = Some(key.to_string());

                let body = part.open_stream().await?;
                let receipt = self.blobs.put(&key, part.content_type(), body).await?;
                debug!(
                    target: TRACING_TARGET,
                    key = %receipt.key,
                    size_bytes = receipt.size_bytes,
                    "file part stored"
                );
            }
            PartKind::Agent => {
                result.echo_agent = Some(part.read_text().await?);
            }
            // Drained by the ingestor, never spooled
            PartKind::Unclassified => {}
        }
        Ok(())
    }
}
