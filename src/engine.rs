//! Sync Orchestrator
//!
//! Drives the session, device operations, and local mirror in response to
//! user intent and relays success or failure back in one message per
//! attempt. All retry policy lives here: every operation is re-runnable
//! whole, so a retry is simply issuing the same call again. State that the
//! UI layer used to keep in globals (current paths, current mirror) is owned
//! here explicitly and the core components below stay stateless.

use crate::concurrency::MutationToken;
use crate::config::SyncConfig;
use crate::device::{paths, DeviceOps};
use crate::error::SyncError;
use crate::mirror::{DeviceMirror, SplashscreenCatalog, Template, TemplateCatalog};
use crate::session::transport::RemoteTransport;
use crate::types::Hash;
use std::path::PathBuf;
use tracing::{error, info};

/// The user's chosen mirror directories, one per sync category.
#[derive(Debug, Clone)]
pub struct SyncPaths {
    pub documents: PathBuf,
    pub templates: PathBuf,
    pub splashscreens: PathBuf,
}

impl SyncPaths {
    /// Build from stored config; every category must have been chosen.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        for (field, value) in [
            ("documents", &config.documents_dir),
            ("templates", &config.templates_dir),
            ("splashscreens", &config.splashscreens_dir),
        ] {
            if value.is_empty() {
                return Err(SyncError::Config(format!(
                    "{} sync directory is not set",
                    field
                )));
            }
        }
        Ok(Self {
            documents: PathBuf::from(&config.documents_dir),
            templates: PathBuf::from(&config.templates_dir),
            splashscreens: PathBuf::from(&config.splashscreens_dir),
        })
    }
}

/// Orchestrates one device session against one set of mirror directories.
pub struct SyncEngine<T: RemoteTransport> {
    ops: DeviceOps<T>,
    paths: SyncPaths,
    mirror: DeviceMirror,
    mutation: MutationToken,
}

impl<T: RemoteTransport> SyncEngine<T> {
    /// Open the local mirror and bind it to a transport.
    pub fn open(transport: T, paths: SyncPaths) -> Result<Self, SyncError> {
        let mirror = DeviceMirror::open(&paths.documents, &paths.templates, &paths.splashscreens)?;
        for slot in mirror.splashscreens.missing_slots() {
            info!("splashscreen slot {} not synced yet", slot);
        }
        Ok(Self {
            ops: DeviceOps::new(transport),
            paths,
            mirror,
            mutation: MutationToken::new(),
        })
    }

    pub fn mirror(&self) -> &DeviceMirror {
        &self.mirror
    }

    pub fn paths(&self) -> &SyncPaths {
        &self.paths
    }

    pub fn transport(&self) -> &T {
        self.ops.transport()
    }

    /// Mirror the whole document store locally, then rebuild the tree.
    pub async fn pull_documents(&mut self) -> Result<(), SyncError> {
        let _guard = self.mutation.try_acquire()?;
        let result = async {
            self.ops.download_document_store(&self.paths.documents).await?;
            self.mirror.rescan_documents(&self.paths.documents)
        }
        .await;
        self.finish("pull documents", result)
    }

    /// Download the template catalog and images, then reload the catalog.
    pub async fn pull_templates(&mut self) -> Result<(), SyncError> {
        let _guard = self.mutation.try_acquire()?;
        let result = async {
            self.ops.download_templates(&self.paths.templates).await?;
            self.mirror.templates = TemplateCatalog::load(&self.paths.templates)?;
            Ok(())
        }
        .await;
        self.finish("pull templates", result)
    }

    /// Download the splashscreen images, then reload the catalog.
    pub async fn pull_splashscreens(&mut self) -> Result<(), SyncError> {
        let _guard = self.mutation.try_acquire()?;
        let result = async {
            self.ops
                .download_splashscreens(&self.paths.splashscreens)
                .await?;
            self.mirror.splashscreens = SplashscreenCatalog::load(&self.paths.splashscreens)?;
            Ok(())
        }
        .await;
        self.finish("pull splashscreens", result)
    }

    /// Pull every category. Categories are independent; the first failure
    /// stops the run and is the one reported.
    pub async fn pull_all(&mut self) -> Result<(), SyncError> {
        self.pull_documents().await?;
        self.pull_templates().await?;
        self.pull_splashscreens().await?;
        Ok(())
    }

    /// Upload one document's whole bundle from the local mirror.
    pub async fn push_document(&mut self, hash: &Hash) -> Result<bool, SyncError> {
        let _guard = self.mutation.try_acquire()?;
        if !self.mirror.tree.contains(hash) {
            let err = SyncError::UnknownNode(hash.clone());
            return self.finish("push document", Err(err));
        }
        let result = self
            .ops
            .upload_document_bundle(hash, &self.paths.documents)
            .await;
        self.finish("push document", result)
    }

    /// Upload one splashscreen image into its device slot.
    pub async fn push_splashscreen(&mut self, id: &str) -> Result<(), SyncError> {
        let _guard = self.mutation.try_acquire()?;
        let result = async {
            let screen = self
                .mirror
                .splashscreens
                .get(id)
                .ok_or_else(|| SyncError::UnknownNode(id.to_string()))?;
            let remote = format!("{}/{}.png", paths::SPLASHSCREEN_STORE, id);
            self.ops.upload_file(&screen.image_path, &remote).await
        }
        .await;
        self.finish("push splashscreen", result)
    }

    /// Upload the template catalog and every locally-present template image.
    pub async fn push_templates(&mut self) -> Result<(), SyncError> {
        let _guard = self.mutation.try_acquire()?;
        let result = async {
            let catalog_path = self.mirror.templates.catalog_path();
            if !catalog_path.is_file() {
                return Err(SyncError::NotFound(catalog_path));
            }
            self.ops
                .upload_file(&catalog_path, paths::TEMPLATE_CATALOG)
                .await?;
            for template in self.mirror.templates.templates() {
                let image = self.mirror.templates.image_path(template);
                if image.is_file() {
                    let remote = format!("{}/{}.png", paths::TEMPLATE_STORE, template.filename);
                    self.ops.upload_file(&image, &remote).await?;
                }
            }
            Ok(())
        }
        .await;
        self.finish("push templates", result)
    }

    /// Add a template to the local catalog. Reaches the device on the next
    /// `push_templates`.
    pub fn add_template(&mut self, template: Template, image: &[u8]) -> Result<(), SyncError> {
        let _guard = self.mutation.try_acquire()?;
        let result = self.mirror.templates.add(template, image);
        self.finish("add template", result)
    }

    /// Rebuild the in-memory mirror from local disk.
    pub fn rescan(&mut self) -> Result<(), SyncError> {
        let _guard = self.mutation.try_acquire()?;
        let result = self.mirror.rescan_documents(&self.paths.documents);
        self.finish("rescan", result)
    }

    /// Rename one node, keeping the name lookup consistent.
    pub fn rename(&mut self, hash: &str, new_name: &str) -> Result<(), SyncError> {
        let _guard = self.mutation.try_acquire()?;
        let result = self.mirror.tree.rename(hash, new_name);
        self.finish("rename", result)
    }

    /// Move one node under a different directory, through the tree indices.
    pub fn reparent(&mut self, hash: &str, new_parent: &str) -> Result<(), SyncError> {
        let _guard = self.mutation.try_acquire()?;
        let result = self.mirror.tree.reparent(hash, new_parent);
        self.finish("reparent", result)
    }

    /// Log the outcome once. Exactly one user-visible message per failed
    /// attempt; the in-progress guard is released by drop on every path.
    fn finish<R>(&self, operation: &str, result: Result<R, SyncError>) -> Result<R, SyncError> {
        match &result {
            Ok(_) => info!("{} completed", operation),
            Err(e) => error!("{} failed: {}", operation, e.user_message()),
        }
        result
    }
}
