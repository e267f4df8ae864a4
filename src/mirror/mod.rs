//! Local mirror state
//!
//! The in-memory model of everything synced from the device: the document
//! tree plus the two flat asset catalogs that sit beside it. Each category
//! loads independently; a missing mirror directory empties that category
//! alone and never fails the others.

pub mod splashscreens;
pub mod templates;
pub mod tree;

use crate::error::SyncError;
use std::path::Path;
use tracing::warn;

pub use splashscreens::{Splashscreen, SplashscreenCatalog, EXPECTED_SLOTS};
pub use templates::{Template, TemplateCatalog};
pub use tree::{DocumentTree, FileNode, NodeKind, ScanReport, TreeBuilder};

/// All local mirror state for one session.
#[derive(Debug)]
pub struct DeviceMirror {
    pub tree: DocumentTree,
    pub report: ScanReport,
    pub templates: TemplateCatalog,
    pub splashscreens: SplashscreenCatalog,
}

impl DeviceMirror {
    /// Load all three categories from their mirror directories.
    pub fn open(
        documents_dir: &Path,
        templates_dir: &Path,
        splashscreens_dir: &Path,
    ) -> Result<Self, SyncError> {
        let (tree, report) = Self::scan_documents(documents_dir)?;
        let templates = TemplateCatalog::load(templates_dir)?;
        let splashscreens = SplashscreenCatalog::load(splashscreens_dir)?;
        Ok(Self {
            tree,
            report,
            templates,
            splashscreens,
        })
    }

    /// Rebuild the document tree from disk, replacing the current one.
    pub fn rescan_documents(&mut self, documents_dir: &Path) -> Result<(), SyncError> {
        let (tree, report) = Self::scan_documents(documents_dir)?;
        self.tree = tree;
        self.report = report;
        Ok(())
    }

    fn scan_documents(documents_dir: &Path) -> Result<(DocumentTree, ScanReport), SyncError> {
        match TreeBuilder::new(documents_dir.to_path_buf()).scan() {
            Ok(result) => Ok(result),
            Err(SyncError::NotFound(path)) => {
                warn!("document mirror missing at {}, starting empty", path.display());
                Ok((DocumentTree::empty(), ScanReport::default()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn all_categories_missing_yields_empty_mirror() {
        let temp = TempDir::new().unwrap();
        let mirror = DeviceMirror::open(
            &temp.path().join("docs"),
            &temp.path().join("templates"),
            &temp.path().join("splash"),
        )
        .unwrap();
        assert!(mirror.tree.is_empty());
        assert!(mirror.templates.is_empty());
        assert!(mirror.splashscreens.is_empty());
    }

    #[test]
    fn categories_load_independently() {
        let temp = TempDir::new().unwrap();
        let splash = temp.path().join("splash");
        std::fs::create_dir_all(&splash).unwrap();
        std::fs::write(splash.join("suspended.png"), b"img").unwrap();

        let mirror =
            DeviceMirror::open(&temp.path().join("docs"), &temp.path().join("t"), &splash).unwrap();
        assert!(mirror.tree.is_empty());
        assert_eq!(mirror.splashscreens.len(), 1);
    }

    #[test]
    fn rescan_replaces_the_tree() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        let mut mirror =
            DeviceMirror::open(&docs, &temp.path().join("t"), &temp.path().join("s")).unwrap();
        assert!(mirror.tree.is_empty());

        std::fs::write(
            docs.join("aaa.metadata"),
            r#"{"visibleName":"Doc","parent":"","type":"DocumentType"}"#,
        )
        .unwrap();
        mirror.rescan_documents(&docs).unwrap();
        assert_eq!(mirror.tree.len(), 2);
        assert!(mirror.tree.contains("aaa"));
    }
}
