//! Storage models.

use time::OffsetDateTime;

/// Object metadata returned by storage backends.
///
/// This represents information about an object in storage, used for listing
/// operations and existence comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Key relative to the backend's root (S3 prefix, local directory)
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Last modified timestamp, when the backend reports one
    pub modified: Option<OffsetDateTime>,
}
impl ObjectInfo {
    /// Create a new ObjectInfo from a listing operation.
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: impl Into<OffsetDateTime>) -> Self {
        self.modified = Some(modified.into());
        self
    }
}
