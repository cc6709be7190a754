//! Multipart ingestion.
//!
//! Every part of the request body is spooled chunk by chunk into its own
//! temporary file before the pipeline looks at any of them. Each temp file is
//! owned by a [`TempPart`] handle which deletes it exactly once: explicitly via
//! [`TempPart::release`], or on drop when a request bails out early.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use fineup_blob::ByteStream;
use futures::Stream;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

const TRACING_TARGET: &str = "fineup_axum::multipart";

/// Field name token identifying the binary file part
pub const FILE_FIELD_TOKEN: &str = "qqfile";

/// Field name token identifying the echoed agent part
pub const AGENT_FIELD_TOKEN: &str = "myagent";

/// Errors raised while ingesting a multipart body
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to parse multipart data: {0}")]
    Parse(String),

    #[error("Failed to spool multipart part: {0}")]
    Io(#[from] std::io::Error),
}

impl From<multer::Error> for IngestError {
    fn from(e: multer::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Classification of a part by its declared field name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    File,
    Agent,
    Unclassified,
}

impl PartKind {
    /// Case-insensitive substring match against the known field tokens.
    /// The file token wins when a name contains both.
    pub fn classify(field_name: &str) -> Self {
        let name = field_name.to_ascii_lowercase();
        if name.contains(FILE_FIELD_TOKEN) {
            Self::File
        } else if name.contains(AGENT_FIELD_TOKEN) {
            Self::Agent
        } else {
            Self::Unclassified
        }
    }
}

/// Extract the multipart boundary from a `Content-Type` header value
pub fn boundary_from_content_type(content_type: Option<&str>) -> Result<String, IngestError> {
    let content_type =
        content_type.ok_or_else(|| IngestError::Parse("Missing content-type header".to_string()))?;
    Ok(multer::parse_boundary(content_type)?)
}

/// Configuration for multipart ingestion
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Directory receiving the per-part temp files
    pub temp_dir: PathBuf,
    /// Maximum bytes for a single part
    pub max_part_bytes: u64,
    /// Maximum number of classified parts in one body
    pub max_parts: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            max_part_bytes: 100 * 1024 * 1024, // 100MB
            max_parts: 16,
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Set maximum part size in bytes
    pub fn max_part_bytes(mut self, bytes: u64) -> Self {
        self.max_part_bytes = bytes;
        self
    }

    pub fn max_parts(mut self, parts: usize) -> Self {
        self.max_parts = parts;
        self
    }
}

/// Owning handle to one spooled temp file
#[derive(Debug)]
pub struct TempPart {
    path: Option<PathBuf>,
}

impl TempPart {
    fn acquire(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_released(&self) -> bool {
        self.path.is_none()
    }

    /// Delete the backing file. Returns `false` when it was already released.
    pub async fn release(&mut self) -> bool {
        let Some(path) = self.path.take() else {
            return false;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(target: TRACING_TARGET, path = %path.display(), error = %e, "failed to delete temp part");
            }
        }
        true
    }
}

impl Drop for TempPart {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(target: TRACING_TARGET, path = %path.display(), error = %e, "failed to delete temp part on drop");
                }
            }
        }
    }
}

/// One part of the body, spooled to disk
#[derive(Debug)]
pub struct IngestedPart {
    field_name: String,
    kind: PartKind,
    client_file_name: Option<String>,
    content_type: Option<String>,
    size_bytes: u64,
    temp: TempPart,
}

impl IngestedPart {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn kind(&self) -> PartKind {
        self.kind
    }

    /// File name exactly as the client declared it
    pub fn client_file_name(&self) -> Option<&str> {
        self.client_file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn temp(&self) -> &TempPart {
        &self.temp
    }

    fn spooled_path(&self) -> std::io::Result<&Path> {
        self.temp.path().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("part '{}' was already released", self.field_name),
            )
        })
    }

    /// Forward-only stream over the spooled bytes
    pub async fn open_stream(&self) -> std::io::Result<ByteStream> {
        let file = tokio::fs::File::open(self.spooled_path()?).await?;
        Ok(Box::pin(ReaderStream::new(file)))
    }

    /// Whole part content as text; invalid UTF-8 is replaced
    pub async fn read_text(&self) -> std::io::Result<String> {
        let data = tokio::fs::read(self.spooled_path()?).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    pub async fn release(&mut self) -> bool {
        self.temp.release().await
    }
}

/// Per-request arena of spooled parts, in encounter order.
///
/// Dropping the arena deletes every temp file not yet released.
#[derive(Debug, Default)]
pub struct IngestedParts {
    parts: Vec<IngestedPart>,
}

impl IngestedParts {
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IngestedPart> {
        self.parts.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut IngestedPart> {
        self.parts.iter_mut()
    }

    /// Release every part still holding a temp file; returns how many were released
    pub async fn release_all(&mut self) -> usize {
        let mut released = 0;
        for part in self.parts.iter_mut() {
            if part.release().await {
                released += 1;
            }
        }
        released
    }
}

/// Reads a multipart body part by part into temp files
#[derive(Debug, Clone, Default)]
pub struct MultipartIngestor {
    config: IngestConfig,
}

impl MultipartIngestor {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Spool every part of `body` to disk.
    ///
    /// On error, temp files created so far are deleted before returning.
    pub async fn parse<S, O, E>(&self, body: S, boundary: &str) -> Result<IngestedParts, IngestError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let mut multipart = multer::Multipart::new(body, boundary.to_string());
        let mut parts = IngestedParts::default();

        while let Some(mut field) = multipart.next_field().await? {
            let field_name = field.name().unwrap_or_default().to_string();
            let kind = PartKind::classify(&field_name);

            if kind == PartKind::Unclassified {
                let mut skipped = 0u64;
                while let Some(chunk) = field.chunk().await? {
                    skipped += chunk.len() as u64;
                }
                debug!(target: TRACING_TARGET, field = %field_name, skipped, "unclassified part skipped");
                continue;
            }

            if parts.len() >= self.config.max_parts {
                return Err(IngestError::Parse(format!(
                    "Too many parts (maximum {})",
                    self.config.max_parts
                )));
            }

            let client_file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(|ct| ct.to_string());

            let (temp, size_bytes) = self.spool(field, &field_name).await?;

            debug!(
                target: TRACING_TARGET,
                field = %field_name,
                kind = ?kind,
                size_bytes,
                "part spooled"
            );

            parts.parts.push(IngestedPart {
                field_name,
                kind,
                client_file_name,
                content_type,
                size_bytes,
                temp,
            });
        }

        Ok(parts)
    }

    async fn spool(
        &self,
        mut field: multer::Field<'_>,
        field_name: &str,
    ) -> Result<(TempPart, u64), IngestError> {
        let path = self
            .config
            .temp_dir
            .join(format!("fineup_{}", uuid::Uuid::new_v4().simple()));

        // Declared before the file handle so the handle is closed first on an
        // early return and the delete in `Drop` sees no open handle
        let temp = TempPart::acquire(path.clone());
        let mut file = tokio::fs::File::create(&path).await?;

        let mut total_size = 0u64;
        while let Some(chunk) = field.chunk().await? {
            total_size += chunk.len() as u64;
            if total_size > self.config.max_part_bytes {
                return Err(IngestError::Parse(format!(
                    "Part '{}' exceeds maximum size of {} bytes",
                    field_name, self.config.max_part_bytes
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        Ok((temp, total_size))
    }
}
