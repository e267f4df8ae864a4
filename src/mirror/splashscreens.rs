//! Splashscreen catalog
//!
//! The device shows a fixed set of full-screen images for power states. The
//! mirror holds one PNG per state; there is no catalog file, the filename
//! stem is the identity.

use crate::error::SyncError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Device-defined splashscreen slots, one per power state.
pub const EXPECTED_SLOTS: &[&str] = &[
    "suspended",
    "poweroff",
    "rebooting",
    "overheating",
    "batteryempty",
];

/// One splashscreen image in the local mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splashscreen {
    /// Slot name, taken from the filename stem.
    pub id: String,
    /// Absolute path of the local image.
    pub image_path: PathBuf,
}

impl Splashscreen {
    /// Replace the image bytes in place. Identity is unchanged, so an upload
    /// afterwards lands in the same device slot.
    pub fn overwrite_image(&self, replacement: &Path) -> Result<(), SyncError> {
        let bytes = std::fs::read(replacement)?;
        if self.image_path.exists() {
            std::fs::remove_file(&self.image_path)?;
        }
        std::fs::write(&self.image_path, bytes)?;
        Ok(())
    }
}

/// Splashscreens discovered in one mirror directory.
#[derive(Debug, Default)]
pub struct SplashscreenCatalog {
    screens: Vec<Splashscreen>,
}

impl SplashscreenCatalog {
    /// One entry per image file directly in the directory. A missing
    /// directory yields an empty catalog, not an error.
    pub fn load(directory: &Path) -> Result<Self, SyncError> {
        if !directory.is_dir() {
            debug!("no splashscreen mirror at {}", directory.display());
            return Ok(Self::default());
        }
        let mut screens = Vec::new();
        for entry in std::fs::read_dir(directory)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            screens.push(Splashscreen {
                id: id.to_string(),
                image_path: path,
            });
        }
        screens.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Self { screens })
    }

    pub fn get(&self, id: &str) -> Option<&Splashscreen> {
        self.screens.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Splashscreen> {
        self.screens.iter()
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    /// Expected device slots that have no local image yet. Used to warn the
    /// user that splashscreens have not been synced.
    pub fn missing_slots(&self) -> Vec<&'static str> {
        EXPECTED_SLOTS
            .iter()
            .filter(|slot| self.get(slot).is_none())
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_directory_is_empty_not_an_error() {
        let catalog = SplashscreenCatalog::load(Path::new("/no/such/dir")).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.missing_slots().len(), EXPECTED_SLOTS.len());
    }

    #[test]
    fn one_entry_per_png_present() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("suspended.png"), b"img").unwrap();
        std::fs::write(temp.path().join("poweroff.png"), b"img").unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"skip").unwrap();

        let catalog = SplashscreenCatalog::load(temp.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("suspended").is_some());
        assert!(catalog.get("notes").is_none());
        let missing = catalog.missing_slots();
        assert!(missing.contains(&"rebooting"));
        assert!(!missing.contains(&"suspended"));
    }

    #[test]
    fn overwrite_replaces_bytes_in_place() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("suspended.png");
        std::fs::write(&original, b"old").unwrap();
        let replacement = temp.path().join("incoming.png");
        std::fs::write(&replacement, b"new").unwrap();

        let catalog = SplashscreenCatalog::load(temp.path()).unwrap();
        let screen = catalog.get("suspended").unwrap();
        screen.overwrite_image(&replacement).unwrap();
        assert_eq!(std::fs::read(&original).unwrap(), b"new");
        assert_eq!(screen.image_path, original);
    }
}
