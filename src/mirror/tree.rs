//! Local Tree Builder
//!
//! Reconstructs the device document hierarchy from a mirror directory of flat
//! per-object metadata records. Records arrive in filesystem enumeration
//! order, which has no relationship to parent-before-child order, so a child
//! may reference a directory that has not been seen yet. The builder resolves
//! both directions: children that arrive before their parent land in a
//! synthesized placeholder that the parent's real record later adopts, and a
//! parent that never shows up in the enumeration is read from disk by hash on
//! demand. Anything whose parent chain still fails to reach the root is
//! reported as an orphan, never silently grafted onto the tree.

use crate::error::SyncError;
use crate::types::{Hash, ROOT_HASH, TRASH_PARENT};
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Variant discriminator for tree members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A directory holding other nodes, children in discovery order.
    Directory { children: Vec<Hash> },
    /// A leaf document.
    Document,
}

/// One member of the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub hash: Hash,
    pub parent: Hash,
    pub visible_name: String,
    pub created_time: String,
    pub last_modified: String,
    pub pinned: bool,
    pub kind: NodeKind,
}

impl FileNode {
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// Child hashes when this node is a directory.
    pub fn children(&self) -> Option<&[Hash]> {
        match &self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::Document => None,
        }
    }

    fn synthetic_root() -> Self {
        Self {
            hash: ROOT_HASH.to_string(),
            parent: String::new(),
            visible_name: "root".to_string(),
            created_time: String::new(),
            last_modified: String::new(),
            pinned: false,
            kind: NodeKind::Directory { children: Vec::new() },
        }
    }

    fn placeholder(hash: &Hash) -> Self {
        Self {
            hash: hash.clone(),
            parent: String::new(),
            visible_name: String::new(),
            created_time: String::new(),
            last_modified: String::new(),
            pinned: false,
            kind: NodeKind::Directory { children: Vec::new() },
        }
    }
}

/// On-disk shape of one metadata record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataRecord {
    #[serde(default)]
    visible_name: String,
    #[serde(default)]
    parent: String,
    #[serde(default)]
    created_time: String,
    #[serde(default)]
    last_modified: String,
    #[serde(default)]
    pinned: bool,
    #[serde(rename = "type", default)]
    kind: String,
}

/// What one scan saw and what it could not place.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Count of metadata records parsed.
    pub records_seen: usize,
    /// Records discarded because they live in the trash.
    pub discarded_trash: usize,
    /// Hashes whose parent chain never reached the root: missing parent
    /// record, parent chain ending in trash, or a malformed cycle. Excluded
    /// from the tree, surfaced here so callers can tell the user.
    pub orphans: Vec<Hash>,
}

/// The reconstructed hierarchy, stored as an arena keyed by hash with
/// children as hash lists. Exactly one directory has the root hash; it exists
/// even before any scan runs.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: HashMap<Hash, FileNode>,
    directory_lookup: HashMap<String, Hash>,
}

impl DocumentTree {
    /// A tree holding only the synthetic root.
    pub fn empty() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_HASH.to_string(), FileNode::synthetic_root());
        let mut directory_lookup = HashMap::new();
        directory_lookup.insert("root".to_string(), ROOT_HASH.to_string());
        Self {
            nodes,
            directory_lookup,
        }
    }

    pub fn root(&self) -> &FileNode {
        &self.nodes[ROOT_HASH]
    }

    pub fn node(&self, hash: &str) -> Option<&FileNode> {
        self.nodes.get(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.nodes.contains_key(hash)
    }

    /// Number of nodes including the synthetic root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileNode> {
        self.nodes.values()
    }

    /// Display-name lookup for directories, last write wins on collision.
    pub fn directory_by_name(&self, name: &str) -> Option<&FileNode> {
        self.directory_lookup
            .get(name)
            .and_then(|hash| self.nodes.get(hash))
    }

    /// Children of a directory, in discovery order.
    pub fn children_of(&self, hash: &str) -> Result<Vec<&FileNode>, SyncError> {
        let node = self
            .nodes
            .get(hash)
            .ok_or_else(|| SyncError::UnknownNode(hash.to_string()))?;
        let children = node
            .children()
            .ok_or_else(|| SyncError::UnknownNode(format!("{} is not a directory", hash)))?;
        Ok(children
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .collect())
    }

    /// Rename one node. Directory renames update the name lookup.
    pub fn rename(&mut self, hash: &str, new_name: &str) -> Result<(), SyncError> {
        let node = self
            .nodes
            .get_mut(hash)
            .ok_or_else(|| SyncError::UnknownNode(hash.to_string()))?;
        let old_name = std::mem::replace(&mut node.visible_name, new_name.to_string());
        if node.is_directory() {
            if self.directory_lookup.get(&old_name).map(String::as_str) == Some(hash) {
                self.directory_lookup.remove(&old_name);
            }
            self.directory_lookup
                .insert(new_name.to_string(), hash.to_string());
        }
        Ok(())
    }

    /// Move one node under a different directory, through the arena indices.
    pub fn reparent(&mut self, hash: &str, new_parent: &str) -> Result<(), SyncError> {
        if hash == ROOT_HASH {
            return Err(SyncError::UnknownNode(
                "the root cannot be reparented".to_string(),
            ));
        }
        if !self.nodes.contains_key(hash) {
            return Err(SyncError::UnknownNode(hash.to_string()));
        }
        match self.nodes.get(new_parent) {
            Some(node) if node.is_directory() => {}
            Some(_) => {
                return Err(SyncError::UnknownNode(format!(
                    "{} is not a directory",
                    new_parent
                )))
            }
            None => return Err(SyncError::UnknownNode(new_parent.to_string())),
        }
        // A directory may not move under its own descendant.
        let mut cursor = new_parent.to_string();
        while cursor != ROOT_HASH {
            if cursor == hash {
                return Err(SyncError::Config(format!(
                    "cannot move {} under its own descendant",
                    hash
                )));
            }
            cursor = match self.nodes.get(&cursor) {
                Some(node) => node.parent.clone(),
                None => break,
            };
        }

        let old_parent = self.nodes[hash].parent.clone();
        if let Some(NodeKind::Directory { children }) =
            self.nodes.get_mut(&old_parent).map(|n| &mut n.kind)
        {
            children.retain(|c| c != hash);
        }
        if let Some(NodeKind::Directory { children }) =
            self.nodes.get_mut(new_parent).map(|n| &mut n.kind)
        {
            children.push(hash.to_string());
        }
        if let Some(node) = self.nodes.get_mut(hash) {
            node.parent = new_parent.to_string();
        }
        Ok(())
    }
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::empty()
    }
}

/// Builds a `DocumentTree` from a mirror directory of metadata records.
pub struct TreeBuilder {
    source: PathBuf,
}

impl TreeBuilder {
    pub fn new(source: PathBuf) -> Self {
        Self { source }
    }

    /// Scan the mirror directory and reconstruct the tree.
    ///
    /// A missing source directory is `NotFound`; callers treat that as an
    /// empty mirror, not a failure. A malformed record or an unrecognized
    /// object type aborts the whole scan, since a partially built tree would
    /// misrepresent the hierarchy.
    pub fn scan(&self) -> Result<(DocumentTree, ScanReport), SyncError> {
        if !self.source.is_dir() {
            return Err(SyncError::NotFound(self.source.clone()));
        }
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.source)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("metadata") {
                continue;
            }
            let Some(hash) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if hash.is_empty() {
                continue;
            }
            let body = std::fs::read_to_string(&path)?;
            records.push((hash.to_string(), body));
        }
        debug!(
            "scanning {} metadata records from {}",
            records.len(),
            self.source.display()
        );
        Self::build_from_records(records, Some(&self.source))
    }

    /// Build a tree from already-read `(hash, record body)` pairs.
    ///
    /// `source` enables on-demand reads for parents absent from `records`;
    /// passing `None` restricts resolution to the given set.
    pub fn build_from_records(
        records: Vec<(Hash, String)>,
        source: Option<&Path>,
    ) -> Result<(DocumentTree, ScanReport), SyncError> {
        let mut state = BuildState::new();
        let mut report = ScanReport::default();

        for (hash, body) in records {
            let record: MetadataRecord =
                serde_json::from_str(&body).map_err(|e| SyncError::Parse {
                    hash: hash.clone(),
                    source: e,
                })?;
            report.records_seen += 1;
            state.ingest(hash, record, &mut report)?;
        }

        state.resolve_pending(source, &mut report)?;
        let tree = state.finish(&mut report);
        if !report.orphans.is_empty() {
            warn!(
                "scan left {} orphaned records: {:?}",
                report.orphans.len(),
                report.orphans
            );
        }
        Ok((tree, report))
    }
}

/// Working state for one build pass.
struct BuildState {
    nodes: HashMap<Hash, FileNode>,
    directory_lookup: HashMap<String, Hash>,
    /// Placeholder directories synthesized for not-yet-seen parents.
    pending: HashSet<Hash>,
    /// Hashes whose record declared them trashed. Never registered.
    trash: HashSet<Hash>,
}

impl BuildState {
    fn new() -> Self {
        let tree = DocumentTree::empty();
        Self {
            nodes: tree.nodes,
            directory_lookup: tree.directory_lookup,
            pending: HashSet::new(),
            trash: HashSet::new(),
        }
    }

    /// Classify and register one record, then attach it to its parent,
    /// synthesizing a placeholder when the parent is not yet known.
    fn ingest(
        &mut self,
        hash: Hash,
        record: MetadataRecord,
        report: &mut ScanReport,
    ) -> Result<(), SyncError> {
        if record.parent == TRASH_PARENT {
            // Any placeholder at this hash stays pending and is dropped at
            // the end, which sends children that arrived early to the orphan
            // report rather than into the visible tree.
            report.discarded_trash += 1;
            self.trash.insert(hash);
            return Ok(());
        }

        let kind = match record.kind.as_str() {
            "CollectionType" => {
                // Adopt the children a placeholder accumulated, if any.
                let adopted = if self.pending.remove(&hash) {
                    match self.nodes.remove(&hash).map(|n| n.kind) {
                        Some(NodeKind::Directory { children }) => children,
                        _ => Vec::new(),
                    }
                } else {
                    Vec::new()
                };
                NodeKind::Directory { children: adopted }
            }
            "DocumentType" => {
                if self.pending.remove(&hash) {
                    // Something claimed this document as its parent. The
                    // claimants cannot attach to a document; they end up in
                    // the orphan report.
                    self.nodes.remove(&hash);
                }
                NodeKind::Document
            }
            other => {
                return Err(SyncError::UnknownType {
                    hash,
                    kind: other.to_string(),
                })
            }
        };

        let node = FileNode {
            hash: hash.clone(),
            parent: record.parent.clone(),
            visible_name: record.visible_name.clone(),
            created_time: record.created_time,
            last_modified: record.last_modified,
            pinned: record.pinned,
            kind,
        };
        let is_directory = node.is_directory();
        self.nodes.insert(hash.clone(), node);
        if is_directory {
            self.directory_lookup.insert(record.visible_name, hash.clone());
        }

        self.attach(hash, record.parent);
        Ok(())
    }

    fn attach(&mut self, hash: Hash, parent: Hash) {
        match self.nodes.get_mut(&parent).map(|n| &mut n.kind) {
            Some(NodeKind::Directory { children }) => children.push(hash),
            Some(NodeKind::Document) => {
                // Malformed: parent is a document. Left unattached; the
                // reachability sweep reports it.
            }
            None => {
                let mut placeholder = FileNode::placeholder(&parent);
                if let NodeKind::Directory { children } = &mut placeholder.kind {
                    children.push(hash);
                }
                self.nodes.insert(parent.clone(), placeholder);
                self.pending.insert(parent);
            }
        }
    }

    /// Resolve placeholders whose record never appeared in the enumeration
    /// by reading their metadata record from disk by hash. A visited set
    /// bounds the walk so a malformed parent cycle terminates.
    fn resolve_pending(
        &mut self,
        source: Option<&Path>,
        report: &mut ScanReport,
    ) -> Result<(), SyncError> {
        let mut queue: VecDeque<Hash> = self.pending.iter().cloned().collect();
        let mut visited: HashSet<Hash> = HashSet::new();
        while let Some(hash) = queue.pop_front() {
            if !self.pending.contains(&hash) || !visited.insert(hash.clone()) {
                continue;
            }
            if self.trash.contains(&hash) {
                continue;
            }
            let Some(dir) = source else { continue };
            let record_path = dir.join(format!("{}.metadata", hash));
            if !record_path.is_file() {
                continue;
            }
            let body = std::fs::read_to_string(&record_path)?;
            let record: MetadataRecord =
                serde_json::from_str(&body).map_err(|e| SyncError::Parse {
                    hash: hash.clone(),
                    source: e,
                })?;
            report.records_seen += 1;
            let parent = record.parent.clone();
            self.ingest(hash, record, report)?;
            // The record may have pointed at yet another unseen parent.
            if self.pending.contains(&parent) {
                queue.push_back(parent);
            }
        }
        Ok(())
    }

    /// Drop unresolved placeholders, sweep reachability from the root, and
    /// report every registered node the sweep cannot reach.
    fn finish(mut self, report: &mut ScanReport) -> DocumentTree {
        for hash in self.pending.drain() {
            self.nodes.remove(&hash);
        }

        let mut reachable: HashSet<Hash> = HashSet::new();
        let mut frontier = vec![ROOT_HASH.to_string()];
        while let Some(hash) = frontier.pop() {
            if !reachable.insert(hash.clone()) {
                continue;
            }
            if let Some(children) = self.nodes.get(&hash).and_then(|n| n.children()) {
                for child in children {
                    if self.nodes.contains_key(child) {
                        frontier.push(child.clone());
                    }
                }
            }
        }

        let mut orphans: Vec<Hash> = self
            .nodes
            .keys()
            .filter(|h| !reachable.contains(*h))
            .cloned()
            .collect();
        orphans.sort();
        for hash in &orphans {
            self.nodes.remove(hash);
        }
        report.orphans = orphans;

        for node in self.nodes.values_mut() {
            if let NodeKind::Directory { children } = &mut node.kind {
                children.retain(|c| reachable.contains(c));
            }
        }
        let nodes = self.nodes;
        self.directory_lookup.retain(|_, h| nodes.contains_key(h));

        DocumentTree {
            nodes,
            directory_lookup: self.directory_lookup,
        }
    }
}
