//! Dropping local files that are already in the store.

use crate::inventory::Inventory;
use crate::key::{REMOTE_SEPARATOR, derive_key};
use crate::scan::LocalFile;
use std::path::Path;

/// Keep only the files whose derived key is missing from `inventory`.
///
/// Order is preserved. Every dropped file is logged: at `info` when it's
/// already in the store, at `warn` when no key can be derived for it.
pub fn filter_existing(files: Vec<LocalFile>, inventory: &Inventory, root: &Path) -> Vec<LocalFile> {
    files
        .into_iter()
        .filter(|file| match derive_key(&file.path, root, REMOTE_SEPARATOR) {
            Ok(key) if inventory.contains(&key) => {
                tracing::info!(path = %file.relative.display(), %key, "Skipping, already in store");
                false
            },
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(path = %file.path.display(), error = %e, "Skipping, no key for path");
                false
            },
        })
        .collect()
}
