//! In-memory storage backend for testing.

use super::ObjectInfoStream;
use crate::error::{ErrorKind, Result};
use crate::{ObjectInfo, StorageBackend, validate_key};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use time::OffsetDateTime;
use tokio::sync::RwLock;

struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    inserted: OffsetDateTime,
}

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Failures
/// can be injected per key (for uploads) or for the whole listing.
///
/// # Examples
///
/// ```
/// use imgsync_storage::backend::{MockBackend, StorageBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_keys(["gallery/photo.webp"]);
/// assert!(backend.exists("gallery/photo.webp").await?);
///
/// backend.put("gallery/new.webp", b"RIFF...".to_vec(), "image/webp").await?;
/// assert_eq!(backend.content_type("gallery/new.webp").await.as_deref(), Some("image/webp"));
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<String, StoredObject>>,
    failing_keys: HashSet<String>,
    failing_list: bool,
    puts: AtomicUsize,
    exists_checks: AtomicUsize,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    ///
    /// Panics if any key fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Vec<u8>>)>) -> Self {
        let now = OffsetDateTime::now_utc();
        let mut map = HashMap::new();
        for (key, data) in objects {
            let key = key.as_ref();
            let Ok(validated) = validate_key(key) else {
                panic!("MockBackend::with_objects: invalid key {key}");
            };
            map.insert(
                validated,
                StoredObject {
                    data: data.into(),
                    content_type: crate::content_type(key).to_string(),
                    inserted: now,
                },
            );
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            failing_keys: HashSet::new(),
            failing_list: false,
            puts: AtomicUsize::new(0),
            exists_checks: AtomicUsize::new(0),
        }
    }

    /// Create a mock backend holding empty objects under the given keys.
    pub fn with_keys(keys: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self::with_objects(keys.into_iter().map(|k| (k, Vec::new())))
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make uploads to `key` fail with a network error.
    pub fn failing(mut self, key: impl Into<String>) -> Self {
        self.failing_keys.insert(key.into());
        self
    }

    /// Make every listing fail with a network error.
    pub fn failing_list(mut self) -> Self {
        self.failing_list = true;
        self
    }

    /// Stored bytes for `key`, if any.
    pub async fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.storage.read().await.get(key).map(|o| o.data.clone())
    }

    /// Content type the object under `key` was stored with.
    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.storage.read().await.get(key).map(|o| o.content_type.clone())
    }

    /// All stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.storage.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of successful uploads.
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of existence checks made.
    pub fn exists_checks(&self) -> usize {
        self.exists_checks.load(Ordering::SeqCst)
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        Self::with_keys(std::iter::empty::<&str>())
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a> {
        if self.failing_list {
            return Box::pin(futures::stream::once(async {
                Err(exn::Exn::from(ErrorKind::Network("mock listing failure".to_string())))
            }));
        }
        let validated_prefix = match prefix.map(validate_key).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let entries: Vec<ObjectInfo> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(key, _)| match &validated_prefix {
                        Some(pfx) => key.strip_prefix(pfx.as_str()).is_some_and(|r| r.is_empty() || r.starts_with('/')),
                        None => true,
                    })
                    .map(|(key, object)| {
                        ObjectInfo::new(key.clone(), object.data.len() as u64).with_modified(object.inserted)
                    })
                    .collect()
            };
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let key = validate_key(key)?;
        self.exists_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.storage.read().await.contains_key(&key))
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let key = validate_key(key)?;
        if self.failing_keys.contains(&key) {
            exn::bail!(ErrorKind::Network(format!("mock upload failure: {key}")));
        }
        let object = StoredObject {
            data,
            content_type: content_type.to_string(),
            inserted: OffsetDateTime::now_utc(),
        };
        self.storage.write().await.insert(key, object);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
