//! Syncing a folder of images into an object store.
//!
//! A run walks the images folder ([`scan`]), derives the key each image is
//! stored under ([`derive_key`]), drops anything whose key is already in the
//! store ([`filter_existing`] against an [`Inventory`]), compresses what's
//! left through the compression service ([`Converter`]) and uploads the
//! result ([`upload`]). [`sync`] strings these together into a stream of
//! [`SyncEvent`]s.

pub mod convert;
mod dedup;
pub mod error;
mod inventory;
mod key;
mod scan;
mod staging;
mod sync;
mod throttle;
mod upload;

pub use crate::convert::{Conversion, Converter};
pub use crate::dedup::filter_existing;
pub use crate::inventory::Inventory;
pub use crate::key::{REMOTE_SEPARATOR, RemoteKey, STAGING_SEPARATOR, derive_key};
pub use crate::scan::{LocalFile, scan, scan_excluding, scan_stream, scan_stream_excluding};
pub use crate::staging::StagingDir;
pub use crate::sync::{Context, Report, SyncEvent, sync};
pub use crate::throttle::{DEFAULT_DELAY, FixedDelay, Throttle, ThrottleHandle};
pub use crate::upload::upload;
