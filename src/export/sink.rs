//! Delivery sinks
//!
//! The exporter hands finished CSV bytes to a [`DeliverySink`]; the sink
//! owns the destination side (bucket layout, credentials). Production
//! runs use [`LocalDirSink`] against the configured delivery root;
//! [`MemorySink`] backs tests and dry runs.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{EtlError, EtlResult};

/// Destination for exported files. One object per (bucket, key) pair;
/// a repeated put replaces the previous object.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> EtlResult<()>;
}

/// Writes objects as `<root>/<bucket>/<key>` on the local filesystem.
pub struct LocalDirSink {
    root: PathBuf,
}

impl LocalDirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DeliverySink for LocalDirSink {
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> EtlResult<()> {
        let dir = self.root.join(bucket);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(key), &data).await?;
        Ok(())
    }
}

/// In-memory sink keyed by `<bucket>/<key>`. Buckets can be marked as
/// failing to exercise per-tenant delivery isolation.
#[derive(Default, Clone)]
pub struct MemorySink {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
    failing_buckets: Arc<RwLock<HashSet<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every put into the given bucket fail.
    pub fn fail_bucket(&self, bucket: &str) {
        if let Ok(mut failing) = self.failing_buckets.write() {
            failing.insert(bucket.to_string());
        }
    }

    /// Delivered object for a (bucket, key) pair, if any.
    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .ok()?
            .get(&format!("{bucket}/{key}"))
            .cloned()
    }

    /// Sorted `<bucket>/<key>` paths of everything delivered so far.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl DeliverySink for MemorySink {
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> EtlResult<()> {
        let failing = self
            .failing_buckets
            .read()
            .map_err(|_| EtlError::delivery(bucket, key, "lock poisoned"))?
            .contains(bucket);
        if failing {
            return Err(EtlError::delivery(bucket, key, "bucket unavailable"));
        }

        self.objects
            .write()
            .map_err(|_| EtlError::delivery(bucket, key, "lock poisoned"))?
            .insert(format!("{bucket}/{key}"), data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_roundtrip() {
        let sink = MemorySink::new();
        sink.put("integreat-analytics-teleo", "mart-teleo-2024-03-05.csv", Bytes::from("a,b\n"))
            .await
            .unwrap();

        let data = sink
            .get("integreat-analytics-teleo", "mart-teleo-2024-03-05.csv")
            .unwrap();
        assert_eq!(data, Bytes::from("a,b\n"));
        assert_eq!(
            sink.keys(),
            vec!["integreat-analytics-teleo/mart-teleo-2024-03-05.csv"]
        );
    }

    #[tokio::test]
    async fn test_memory_sink_failure_injection() {
        let sink = MemorySink::new();
        sink.fail_bucket("integreat-analytics-campus");

        let err = sink
            .put("integreat-analytics-campus", "x.csv", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::Delivery { .. }));

        // Other buckets are unaffected.
        sink.put("integreat-analytics-teleo", "x.csv", Bytes::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_local_dir_sink_writes_bucket_layout() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalDirSink::new(dir.path());
        sink.put("bucket-a", "file.csv", Bytes::from("h\n1\n"))
            .await
            .unwrap();

        let written = std::fs::read(dir.path().join("bucket-a").join("file.csv")).unwrap();
        assert_eq!(written, b"h\n1\n");
    }
}
