use serde::{Deserialize, Serialize};

use crate::{ObjectKey, PutResult};

/// What the backend acknowledged for one committed object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobReceipt {
    pub key: ObjectKey,
    pub container: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

impl BlobReceipt {
    pub(crate) fn committed(
        container: &str,
        key: ObjectKey,
        content_type: Option<String>,
        put: PutResult,
    ) -> Self {
        Self {
            key,
            container: container.to_string(),
            size_bytes: put.size_bytes,
            content_type,
            etag: put.etag,
        }
    }

    /// Location as `container/key`
    pub fn location(&self) -> String {
        format!("{}/{}", self.container, self.key)
    }
}
