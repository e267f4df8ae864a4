//! Template catalog
//!
//! Templates are page backgrounds stored on the device as one PNG each plus
//! a single shared `templates.json` catalog. The local mirror keeps the same
//! shape. The catalog has no partial-update format, so adding a template
//! rewrites the whole file.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Catalog file name, identical on device and in the mirror.
pub const CATALOG_FILE: &str = "templates.json";

/// One page template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: String,
    /// Disk basename without extension; the image is `<filename>.png`.
    pub filename: String,
    #[serde(default)]
    pub icon_code: String,
    #[serde(default)]
    pub landscape: bool,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFileBody {
    #[serde(default)]
    templates: Vec<Template>,
}

/// In-memory template catalog bound to one mirror directory.
#[derive(Debug)]
pub struct TemplateCatalog {
    directory: PathBuf,
    templates: Vec<Template>,
}

impl TemplateCatalog {
    /// Load the catalog from a mirror directory. A missing catalog file or
    /// directory yields an empty catalog, not an error.
    pub fn load(directory: &Path) -> Result<Self, SyncError> {
        let catalog_path = directory.join(CATALOG_FILE);
        if !catalog_path.is_file() {
            debug!("no template catalog at {}", catalog_path.display());
            return Ok(Self {
                directory: directory.to_path_buf(),
                templates: Vec::new(),
            });
        }
        let content = std::fs::read_to_string(&catalog_path)?;
        let body: CatalogFileBody = serde_json::from_str(&content).map_err(|e| SyncError::Parse {
            hash: CATALOG_FILE.to_string(),
            source: e,
        })?;
        Ok(Self {
            directory: directory.to_path_buf(),
            templates: body.templates,
        })
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.directory.join(CATALOG_FILE)
    }

    /// Local path of a template's image.
    pub fn image_path(&self, template: &Template) -> PathBuf {
        self.directory.join(format!("{}.png", template.filename))
    }

    /// Append a template: write its image, add it in memory, and rewrite the
    /// whole catalog file. Templates are never individually deleted here.
    pub fn add(&mut self, template: Template, image: &[u8]) -> Result<(), SyncError> {
        std::fs::create_dir_all(&self.directory)?;
        std::fs::write(self.image_path(&template), image)?;
        self.templates.push(template);
        self.rewrite_catalog()
    }

    fn rewrite_catalog(&self) -> Result<(), SyncError> {
        let body = CatalogFileBody {
            templates: self.templates.clone(),
        };
        let content = serde_json::to_string_pretty(&body)
            .map_err(|e| SyncError::Config(format!("could not serialize template catalog: {}", e)))?;
        std::fs::write(self.catalog_path(), content)?;
        Ok(())
    }
}
