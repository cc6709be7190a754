//! fineup-axum: Fine Uploader compatible upload endpoints.
//!
//! A request flows through three pieces:
//!
//! - [`multipart::MultipartIngestor`] spools each part of the body to a temp
//!   file and classifies it by field name (`qqfile`, `myagent`).
//! - [`UploadPipeline`] streams the file part into blob storage, echoes the
//!   agent part and folds every failure into an [`UploadResult`].
//! - [`JsonUpload`] / [`PlainTextUpload`] render the result; both always
//!   answer 200 and differ only in content type.

pub mod app;
mod error;
pub mod multipart;
pub mod pipeline;
pub mod response;
pub mod state;

pub use app::{upload_router, UploadApp, FINE_UPLOAD_LEGACY_PATH, FINE_UPLOAD_PATH};
pub use error::UploadError;
pub use multipart::{IngestConfig, IngestError, MultipartIngestor, PartKind};
pub use pipeline::UploadPipeline;
pub use response::{ClientFlavor, JsonUpload, PlainTextUpload, UploadResult};
pub use state::UploadState;
