//! # fineup-blob: streaming blob storage for photo uploads
//!
//! `fineup-blob` is the storage side of fineup. It knows nothing about HTTP or
//! multipart bodies: it takes a `ByteStream`, derives nothing on its own beyond
//! the object key, and writes the bytes into one container of an object store.
//!
//! ## Quick Start
//!
//! ```rust
//! use fineup_blob::prelude::*;
//! use fineup_blob::MemoryBlobStore;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let adapter = BlobAdapter::new(MemoryBlobStore::new(), BlobConfig::default());
//!
//! // Once at startup
//! adapter.ensure_container().await?;
//!
//! // Per upload
//! let key = adapter.object_key("holiday");
//! let body = futures::stream::once(async { Ok::<_, std::io::Error>(bytes::Bytes::from_static(b"\xff\xd8\xff")) });
//! let receipt = adapter.put(&key, Some("image/jpeg"), Box::pin(body)).await?;
//! assert_eq!(receipt.key.as_str(), "holiday.jpg");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  UploadPipeline │  ← fineup-axum
//! ├─────────────────┤
//! │   BlobAdapter   │  ← key derivation, limits, abort on failure
//! ├─────────────────┤
//! │    BlobStore    │  ← S3-compatible or in-memory
//! └─────────────────┘
//! ```

pub mod adapter;
mod config;
mod error;
mod memory_store;
mod receipt;
mod s3_store;
pub mod store;
mod types;

pub use adapter::BlobAdapter;
pub use config::{BlobConfig, DEFAULT_CONTAINER};
pub use error::{BlobError, BlobResult};
pub use memory_store::MemoryBlobStore;
pub use receipt::BlobReceipt;
pub use s3_store::{S3CompatibleStore, S3Config, MIN_PART_SIZE};
pub use store::{BlobKeyStrategy, BlobStore, BlobWriter, JpegSuffixKeys, PutResult};
pub use types::{ByteStream, ContainerStatus, ObjectKey};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobAdapter, BlobConfig, BlobError, BlobReceipt, BlobResult, BlobStore, ByteStream, ObjectKey,
    };
}
