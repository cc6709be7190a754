use async_trait::async_trait;
use bytes::Bytes;

use crate::{BlobResult, ContainerStatus, ObjectKey};

/// Core blob storage operations - must be implemented by all storage backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create the container if it does not exist yet.
    ///
    /// Must succeed when another process creates the same container concurrently.
    async fn ensure_container(&self, container: &str) -> BlobResult<ContainerStatus>;

    /// Open a writable stream addressed by `key` inside `container`.
    ///
    /// Nothing becomes visible under `key` until the returned writer is committed.
    async fn open_write(
        &self,
        container: &str,
        key: &ObjectKey,
        content_type: Option<&str>,
    ) -> BlobResult<Box<dyn BlobWriter>>;
}

/// An open, uncommitted object write
#[async_trait]
pub trait BlobWriter: Send {
    /// Append a chunk to the object
    async fn write(&mut self, chunk: Bytes) -> BlobResult<()>;

    /// Make the written bytes visible under the writer's key
    async fn commit(self: Box<Self>) -> BlobResult<PutResult>;

    /// Discard everything written so far
    async fn abort(self: Box<Self>) -> BlobResult<()>;
}

/// Result of a committed write
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Strategy for deriving object keys from client supplied file names
pub trait BlobKeyStrategy: Send + Sync {
    fn object_key(&self, client_file_name: &str) -> ObjectKey;
}

/// Default key strategy: `<client file name>.jpg`.
///
/// Keys are deterministic, so two uploads with the same file name address the
/// same object and the later commit wins.
#[derive(Debug, Clone, Default)]
pub struct JpegSuffixKeys;

impl BlobKeyStrategy for JpegSuffixKeys {
    fn object_key(&self, client_file_name: &str) -> ObjectKey {
        ObjectKey::new(format!("{}.jpg", client_file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_suffix_is_appended_verbatim() {
        let keys = JpegSuffixKeys;
        assert_eq!(keys.object_key("cat").as_str(), "cat.jpg");
        assert_eq!(keys.object_key("cat.png").as_str(), "cat.png.jpg");
    }

    #[test]
    fn same_name_yields_same_key() {
        let keys = JpegSuffixKeys;
        assert_eq!(keys.object_key("beach"), keys.object_key("beach"));
    }
}
