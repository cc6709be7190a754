use fineup_blob::BlobError;
use thiserror::Error;

use crate::multipart::IngestError;

/// Failure of one upload request.
///
/// Never leaves the pipeline as an error: it is flattened into
/// `UploadResult::error` so the HTTP status stays 200.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Parse(#[from] IngestError),

    #[error("File part '{field}' has no file name")]
    MissingFileName { field: String },

    #[error(transparent)]
    Transfer(#[from] BlobError),

    #[error("Failed to read spooled part: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(IngestError::Io(_)) => "io",
            Self::Parse(_) => "parse",
            Self::MissingFileName { .. } => "missing_file_name",
            Self::Transfer(_) => "transfer",
            Self::Io(_) => "io",
        }
    }
}
