//! Core types for the remsync mirror and sync engine.

/// Hash: opaque stable identifier for a device document-store object.
///
/// Not a content hash, just the unique key the device names each object by.
/// The empty string is reserved for the synthetic root directory.
pub type Hash = String;

/// Hash value of the synthetic root directory.
pub const ROOT_HASH: &str = "";

/// Parent value marking an object as living in the device trash.
pub const TRASH_PARENT: &str = "trash";
