#![allow(dead_code)]

use fineup_axum::{IngestConfig, UploadApp, UploadPipeline, UploadState};
use fineup_blob::{BlobAdapter, BlobConfig, BlobStore, MemoryBlobStore};

pub const BOUNDARY: &str = "----fineupTestBoundary7MA4YWxk";
pub const CONTAINER: &str = "photos";

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Builder for raw multipart bodies
#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
                BOUNDARY, name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/jpeg\r\n\r\n",
                BOUNDARY, name, filename
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}

pub struct Harness {
    pub store: MemoryBlobStore,
    pub pipeline: UploadPipeline,
    pub spool: tempfile::TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        let store = MemoryBlobStore::new();
        store.ensure_container(CONTAINER).await.unwrap();
        Self::with_store(store)
    }

    pub fn with_store(store: MemoryBlobStore) -> Self {
        Self::with_config(store, BlobConfig::default())
    }

    pub fn with_config(store: MemoryBlobStore, config: BlobConfig) -> Self {
        let spool = tempfile::tempdir().unwrap();
        let blobs = BlobAdapter::new(store.clone(), config.with_container(CONTAINER));
        let pipeline = UploadPipeline::new(blobs, IngestConfig::new().temp_dir(spool.path()));
        Self { store, pipeline, spool }
    }

    pub fn app(&self) -> UploadApp {
        UploadApp::new(self.pipeline.clone())
    }

    pub fn app_with_body_limit(&self, bytes: usize) -> UploadApp {
        UploadApp::from_state(UploadState::new(self.pipeline.clone()).with_body_limit(bytes))
    }

    /// Temp files still present in the spool directory
    pub fn spooled_files(&self) -> usize {
        std::fs::read_dir(self.spool.path()).unwrap().count()
    }
}

pub fn body_stream(body: Vec<u8>) -> impl futures::Stream<Item = Result<bytes::Bytes, std::io::Error>> + Send + 'static {
    futures::stream::once(async move { Ok(bytes::Bytes::from(body)) })
}
