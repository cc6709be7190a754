use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use crate::{
    BlobError, BlobResult, BlobStore, BlobWriter, ContainerStatus, ObjectKey, PutResult,
};

/// In-process blob store.
///
/// Clones share state, so a test can hand one clone to the pipeline and
/// inspect the other. Faults can be injected to exercise failure paths.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    containers: HashSet<String>,
    objects: HashMap<(String, String), Bytes>,
    committed: Vec<ObjectKey>,
    aborts: usize,
    faults: Faults,
}

#[derive(Default, Clone)]
struct Faults {
    unreachable: Option<String>,
    write: Option<String>,
    stall: bool,
    commit: Option<String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails as if the backend could not be reached
    pub fn fail_unreachable<S: Into<String>>(&self, reason: S) {
        self.inner.lock().faults.unreachable = Some(reason.into());
    }

    /// Every chunk write fails
    pub fn fail_writes<S: Into<String>>(&self, reason: S) {
        self.inner.lock().faults.write = Some(reason.into());
    }

    /// Every chunk write hangs until the caller gives up
    pub fn stall_writes(&self) {
        self.inner.lock().faults.stall = true;
    }

    /// Every commit fails
    pub fn fail_commits<S: Into<String>>(&self, reason: S) {
        self.inner.lock().faults.commit = Some(reason.into());
    }

    pub fn has_container(&self, container: &str) -> bool {
        self.inner.lock().containers.contains(container)
    }

    /// Committed content for `key` in `container`
    pub fn object(&self, container: &str, key: &str) -> Option<Bytes> {
        self.inner
            .lock()
            .objects
            .get(&(container.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys in commit order, one entry per commit
    pub fn committed_keys(&self) -> Vec<ObjectKey> {
        self.inner.lock().committed.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.inner.lock().committed.len()
    }

    pub fn abort_count(&self) -> usize {
        self.inner.lock().aborts
    }

    fn check_reachable(&self) -> BlobResult<()> {
        match &self.inner.lock().faults.unreachable {
            Some(reason) => Err(BlobError::backend(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                reason.clone(),
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn ensure_container(&self, container: &str) -> BlobResult<ContainerStatus> {
        self.check_reachable()?;
        let created = self.inner.lock().containers.insert(container.to_string());
        Ok(if created {
            ContainerStatus::Created
        } else {
            ContainerStatus::Existing
        })
    }

    async fn open_write(
        &self,
        container: &str,
        key: &ObjectKey,
        _content_type: Option<&str>,
    ) -> BlobResult<Box<dyn BlobWriter>> {
        self.check_reachable()?;
        if !self.has_container(container) {
            return Err(BlobError::container_unavailable(container, "container does not exist"));
        }
        let faults = self.inner.lock().faults.clone();
        Ok(Box::new(MemoryWriter {
            store: self.inner.clone(),
            container: container.to_string(),
            key: key.clone(),
            buffer: BytesMut::new(),
            faults,
        }))
    }
}

struct MemoryWriter {
    store: Arc<Mutex<MemoryState>>,
    container: String,
    key: ObjectKey,
    buffer: BytesMut,
    faults: Faults,
}

#[async_trait]
impl BlobWriter for MemoryWriter {
    async fn write(&mut self, chunk: Bytes) -> BlobResult<()> {
        if let Some(reason) = &self.faults.write {
            return Err(BlobError::write_failed(self.key.as_str(), reason.clone()));
        }
        if self.faults.stall {
            futures_util::future::pending::<()>().await;
        }
        self.buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> BlobResult<PutResult> {
        let MemoryWriter {
            store,
            container,
            key,
            buffer,
            faults,
        } = *self;
        if let Some(reason) = faults.commit {
            return Err(BlobError::write_failed(key.as_str(), reason));
        }
        let data = buffer.freeze();
        let size_bytes = data.len() as u64;
        let mut state = store.lock();
        state.objects.insert((container, key.as_str().to_string()), data);
        state.committed.push(key);
        Ok(PutResult {
            etag: Some(format!("\"mem-{}\"", state.committed.len())),
            size_bytes,
        })
    }

    async fn abort(self: Box<Self>) -> BlobResult<()> {
        self.store.lock().aborts += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_container_is_idempotent() {
        let store = MemoryBlobStore::new();
        assert_eq!(store.ensure_container("photos").await.unwrap(), ContainerStatus::Created);
        assert_eq!(store.ensure_container("photos").await.unwrap(), ContainerStatus::Existing);
    }

    #[tokio::test]
    async fn uncommitted_write_is_invisible() {
        let store = MemoryBlobStore::new();
        store.ensure_container("photos").await.unwrap();

        let key = ObjectKey::new("a.jpg");
        let mut writer = store.open_write("photos", &key, None).await.unwrap();
        writer.write(Bytes::from_static(b"partial")).await.unwrap();
        assert!(store.object("photos", "a.jpg").is_none());

        writer.abort().await.unwrap();
        assert!(store.object("photos", "a.jpg").is_none());
        assert_eq!(store.abort_count(), 1);
    }

    #[tokio::test]
    async fn unreachable_store_fails_every_call() {
        let store = MemoryBlobStore::new();
        store.fail_unreachable("connection refused");
        let err = store.ensure_container("photos").await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn stalled_write_never_completes() {
        let store = MemoryBlobStore::new();
        store.ensure_container("photos").await.unwrap();
        store.stall_writes();

        let key = ObjectKey::new("slow.jpg");
        let mut writer = store.open_write("photos", &key, None).await.unwrap();
        let write = writer.write(Bytes::from_static(b"x"));
        let outcome = tokio::time::timeout(std::time::Duration::from_millis(20), write).await;
        assert!(outcome.is_err());
    }
}
