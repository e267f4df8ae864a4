//! Remote File Operations
//!
//! Translates sync intents into shell commands and transfer-channel calls on
//! one remote session. Encapsulates the device's fixed directory layout so
//! callers never hardcode device paths.

use crate::error::SyncError;
use crate::session::transport::RemoteTransport;
use crate::types::Hash;
use futures::future::{BoxFuture, FutureExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Fixed device-side paths.
pub mod paths {
    /// Document store root (xochitl's data directory).
    pub const DOCUMENT_STORE: &str = "/home/root/.local/share/remarkable/xochitl";
    /// Template images and catalog.
    pub const TEMPLATE_STORE: &str = "/usr/share/remarkable/templates";
    /// Template catalog file.
    pub const TEMPLATE_CATALOG: &str = "/usr/share/remarkable/templates/templates.json";
    /// Splashscreen images live directly in the share directory.
    pub const SPLASHSCREEN_STORE: &str = "/usr/share/remarkable";
}

/// Pseudo-entries and device-internal names excluded from listings.
const LISTING_BLACKLIST: &[&str] = &[".", "..", ".tree", "thumbnails", "cache", "lost+found"];

/// Possible per-document payload extensions, in the fixed upload order.
const BUNDLE_EXTENSIONS: &[&str] = &["pdf", "epub", "metadata", "content", "pagedata", "local"];

/// A remote directory listing partitioned into subdirectories and files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

/// Partition raw `ls -p -1` lines into directories and plain files.
///
/// Entries the device wraps in quoting (names that needed escaping) are
/// dropped rather than mis-parsed. Known limitation: such files are skipped.
pub fn parse_listing(lines: &[String]) -> DirectoryListing {
    let mut listing = DirectoryListing::default();
    for raw in lines {
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let is_dir = line.ends_with('/');
        let name = line.trim_end_matches('/');
        if name.is_empty() || LISTING_BLACKLIST.contains(&name) {
            continue;
        }
        if name.starts_with('\'') {
            warn!("skipping quoted listing entry: {}", name);
            continue;
        }
        if is_dir {
            listing.dirs.push(name.to_string());
        } else {
            listing.files.push(name.to_string());
        }
    }
    listing
}

/// Compute the local destination for a remote path by prefix substitution.
pub fn local_destination(remote_path: &str, strip_prefix: &str, local_root: &Path) -> PathBuf {
    let rel = remote_path
        .strip_prefix(strip_prefix)
        .unwrap_or(remote_path)
        .trim_start_matches('/');
    local_root.join(rel)
}

fn join_remote(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// High-level file operations over one remote session.
pub struct DeviceOps<T: RemoteTransport> {
    transport: T,
}

impl<T: RemoteTransport> DeviceOps<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// List one remote directory, partitioned into subdirectories and files.
    pub async fn list_directory_entries(&self, path: &str) -> Result<DirectoryListing, SyncError> {
        let output = self.transport.execute(&format!("ls -p -1 '{}'", path)).await?;
        Ok(parse_listing(&output.stdout_lines()))
    }

    /// Check whether a file or directory exists on the device.
    pub async fn remote_exists(&self, path: &str) -> Result<bool, SyncError> {
        let output = self
            .transport
            .execute(&format!("test -e '{}' && echo yes", path))
            .await?;
        Ok(output.stdout.contains("yes"))
    }

    /// Download one remote file, placing it under `local_root` at the path
    /// left after stripping `strip_prefix`. Intermediate directories are
    /// created; partial-file promotion is whatever the channel guarantees.
    pub async fn download_file(
        &self,
        remote_path: &str,
        strip_prefix: &str,
        local_root: &Path,
    ) -> Result<(), SyncError> {
        let destination = local_destination(remote_path, strip_prefix, local_root);
        debug!("downloading {} to {}", remote_path, destination.display());
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.transport.download(remote_path, &destination).await
    }

    /// Recursively download a directory subtree, depth first.
    ///
    /// A directory's own files are downloaded only after all of its
    /// subdirectories have completed, so a cancellation mid-walk leaves leaf
    /// directories fully present or untouched, never a parent complete while
    /// a child is missing.
    pub fn recursive_download<'a>(
        &'a self,
        remote_dir: &'a str,
        strip_prefix: &'a str,
        local_root: &'a Path,
    ) -> BoxFuture<'a, Result<(), SyncError>> {
        async move {
            let listing = self.list_directory_entries(remote_dir).await?;
            for dir in &listing.dirs {
                self.recursive_download(&join_remote(remote_dir, dir), strip_prefix, local_root)
                    .await?;
            }
            for file in &listing.files {
                self.download_file(&join_remote(remote_dir, file), strip_prefix, local_root)
                    .await?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Upload one local file to an exact remote path.
    ///
    /// An existing remote file is deleted first because the device's transfer
    /// primitive is not assumed to overwrite safely. Delete-then-put is not
    /// atomic; a crash in between loses the remote file. The remote shell
    /// offers no transactional primitive to close that window.
    pub async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<(), SyncError> {
        if self.remote_exists(remote_path).await? {
            debug!("removing existing remote file {}", remote_path);
            self.transport
                .execute(&format!("rm '{}'", remote_path))
                .await?;
        }
        self.transport.upload(local_path, remote_path).await
    }

    /// Upload every locally-present member of one document's bundle.
    ///
    /// A document on the device is a cluster keyed by hash: payload files in
    /// `BUNDLE_EXTENSIONS` order, then the `<hash>.thumbnails/` directory,
    /// then the loose `<hash>/` directory, each in name order. Members absent
    /// locally are silently skipped; a partial bundle is a valid bundle.
    /// Returns whether anything was uploaded.
    pub async fn upload_document_bundle(
        &self,
        hash: &Hash,
        mirror_root: &Path,
    ) -> Result<bool, SyncError> {
        let mut uploaded = false;

        for ext in BUNDLE_EXTENSIONS {
            let local = mirror_root.join(format!("{}.{}", hash, ext));
            if local.is_file() {
                let remote = join_remote(paths::DOCUMENT_STORE, &format!("{}.{}", hash, ext));
                self.upload_file(&local, &remote).await?;
                uploaded = true;
            }
        }

        for dir_name in [format!("{}.thumbnails", hash), hash.to_string()] {
            let local_dir = mirror_root.join(&dir_name);
            if local_dir.is_dir() {
                self.upload_directory(&local_dir, &join_remote(paths::DOCUMENT_STORE, &dir_name))
                    .await?;
                uploaded = true;
            }
        }

        if uploaded {
            info!("uploaded bundle for {}", hash);
        } else {
            warn!("no local bundle members found for {}", hash);
        }
        Ok(uploaded)
    }

    /// Upload a local directory's files under a remote directory, in
    /// name-sorted order for reproducibility.
    async fn upload_directory(&self, local_dir: &Path, remote_dir: &str) -> Result<(), SyncError> {
        self.transport
            .execute(&format!("mkdir -p '{}'", remote_dir))
            .await?;
        for entry in WalkDir::new(local_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(local_dir)
                .map_err(|e| SyncError::Config(e.to_string()))?;
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            let remote_path = join_remote(remote_dir, &rel_str);
            if let Some(idx) = remote_path.rfind('/') {
                let remote_parent = &remote_path[..idx];
                if remote_parent != remote_dir {
                    self.transport
                        .execute(&format!("mkdir -p '{}'", remote_parent))
                        .await?;
                }
            }
            self.upload_file(entry.path(), &remote_path).await?;
        }
        Ok(())
    }

    /// Download the template catalog and every template image into the
    /// template mirror directory.
    pub async fn download_templates(&self, local_root: &Path) -> Result<(), SyncError> {
        info!("downloading templates to {}", local_root.display());
        self.download_file(paths::TEMPLATE_CATALOG, paths::TEMPLATE_STORE, local_root)
            .await?;
        let listing = self.list_directory_entries(paths::TEMPLATE_STORE).await?;
        for file in listing.files.iter().filter(|f| f.ends_with(".png")) {
            self.download_file(
                &join_remote(paths::TEMPLATE_STORE, file),
                paths::TEMPLATE_STORE,
                local_root,
            )
            .await?;
        }
        Ok(())
    }

    /// Download every splashscreen image into the splashscreen mirror.
    pub async fn download_splashscreens(&self, local_root: &Path) -> Result<(), SyncError> {
        info!("downloading splashscreens to {}", local_root.display());
        let listing = self
            .list_directory_entries(paths::SPLASHSCREEN_STORE)
            .await?;
        for file in listing.files.iter().filter(|f| f.ends_with(".png")) {
            self.download_file(
                &join_remote(paths::SPLASHSCREEN_STORE, file),
                paths::SPLASHSCREEN_STORE,
                local_root,
            )
            .await?;
        }
        Ok(())
    }

    /// Mirror the whole document store locally.
    pub async fn download_document_store(&self, local_root: &Path) -> Result<(), SyncError> {
        info!("downloading document store to {}", local_root.display());
        self.recursive_download(paths::DOCUMENT_STORE, paths::DOCUMENT_STORE, local_root)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_listing_partitions_on_trailing_slash() {
        let listing = parse_listing(&lines(&["a1b2c3/", "d4e5.metadata", "d4e5.content"]));
        assert_eq!(listing.dirs, vec!["a1b2c3"]);
        assert_eq!(listing.files, vec!["d4e5.metadata", "d4e5.content"]);
    }

    #[test]
    fn parse_listing_filters_pseudo_entries() {
        let listing = parse_listing(&lines(&[
            "./",
            "../",
            ".tree",
            "thumbnails/",
            "cache/",
            "lost+found/",
            "",
            "real/",
        ]));
        assert_eq!(listing.dirs, vec!["real"]);
        assert!(listing.files.is_empty());
    }

    #[test]
    fn parse_listing_drops_quoted_names() {
        let listing = parse_listing(&lines(&["'weird name'/", "'spaced file'", "plain.pdf"]));
        assert!(listing.dirs.is_empty());
        assert_eq!(listing.files, vec!["plain.pdf"]);
    }

    #[test]
    fn local_destination_substitutes_prefix() {
        let dest = local_destination(
            "/home/root/.local/share/remarkable/xochitl/ab/cd.metadata",
            paths::DOCUMENT_STORE,
            Path::new("/mirror/docs"),
        );
        assert_eq!(dest, PathBuf::from("/mirror/docs/ab/cd.metadata"));
    }

    #[test]
    fn local_destination_leaves_unprefixed_paths_relative() {
        let dest = local_destination("/other/file.png", "/usr/share/remarkable", Path::new("/m"));
        assert_eq!(dest, PathBuf::from("/m/other/file.png"));
    }

    #[test]
    fn join_remote_never_doubles_separators() {
        assert_eq!(join_remote("/a/b/", "c"), "/a/b/c");
        assert_eq!(join_remote("/a/b", "c"), "/a/b/c");
    }
}
