//! Folder and file node types.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Unique identifier for a folder node within a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a new NodeId from a u64.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Listing state of a folder node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeStatus {
    /// Not listed yet, or listing was interrupted.
    #[default]
    Pending,
    /// Listing finished (possibly truncated under the `Truncate` policy).
    Complete,
    /// Listing stopped early and the children are known to be incomplete.
    Partial {
        /// Why the listing stopped.
        reason: String,
    },
}

impl NodeStatus {
    /// Check if the listing has finished, completely or not.
    pub fn is_finished(&self) -> bool {
        !matches!(self, NodeStatus::Pending)
    }

    /// Check if the listing is known to be incomplete.
    pub fn is_partial(&self) -> bool {
        matches!(self, NodeStatus::Partial { .. })
    }
}

/// A file discovered inside a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Identifier of the file at the provider.
    pub provider_id: CompactString,

    /// Download URL.
    pub url: String,

    /// File name (not full path).
    pub file_name: CompactString,

    /// Size in bytes, `None` when the provider did not report one.
    pub size: Option<u64>,
}

impl FileEntry {
    /// Create a new file entry.
    pub fn new(
        provider_id: impl Into<CompactString>,
        url: impl Into<String>,
        file_name: impl Into<CompactString>,
        size: Option<u64>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            url: url.into(),
            file_name: file_name.into(),
            size,
        }
    }

    /// Check if the size is known.
    pub fn has_known_size(&self) -> bool {
        self.size.is_some()
    }

    /// Size for aggregate totals; unknown counts as zero.
    pub fn size_or_zero(&self) -> u64 {
        self.size.unwrap_or(0)
    }
}

/// A folder in the reconstructed tree.
///
/// `parent` is a plain [`NodeId`] back-reference. It is only used to
/// reconstruct paths for display and never owns the parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Identifier of this node within the crawl.
    pub id: NodeId,

    /// Identifier of the folder at the provider.
    pub provider_id: CompactString,

    /// Browse URL of the folder.
    pub url: String,

    /// Folder name (not full path).
    pub name: CompactString,

    /// Parent node, `None` for the root.
    pub parent: Option<NodeId>,

    /// Subfolders in canonical order.
    pub children: Vec<DirectoryNode>,

    /// Files in canonical order.
    pub files: Vec<FileEntry>,

    /// When the listing of this folder started.
    pub started_at: Option<DateTime<Utc>>,

    /// When the listing of this folder finished.
    pub finished_at: Option<DateTime<Utc>>,

    /// Listing state.
    #[serde(default)]
    pub status: NodeStatus,
}

impl DirectoryNode {
    /// Create a new, not yet listed, folder node.
    pub fn new(
        id: NodeId,
        provider_id: impl Into<CompactString>,
        url: impl Into<String>,
        name: impl Into<CompactString>,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            id,
            provider_id: provider_id.into(),
            url: url.into(),
            name: name.into(),
            parent,
            children: Vec::new(),
            files: Vec::new(),
            started_at: None,
            finished_at: None,
            status: NodeStatus::Pending,
        }
    }

    /// Check if this is the root of the tree.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of direct entries (subfolders and files).
    pub fn entry_count(&self) -> usize {
        self.children.len() + self.files.len()
    }

    /// Names of the direct entries: subfolders first, then files.
    pub fn entry_names(&self) -> Vec<&str> {
        self.children
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.files.iter().map(|f| f.file_name.as_str()))
            .collect()
    }

    /// Sort subfolders and files by ordinal name comparison.
    ///
    /// Only this level is sorted; children are sorted when they are listed.
    pub fn sort_canonical(&mut self) {
        self.children.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        self.files
            .sort_by(|a, b| a.file_name.as_str().cmp(b.file_name.as_str()));
    }

    /// Time spent listing this folder, if it finished.
    pub fn listing_duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Find a node by id in this subtree.
    pub fn find(&self, id: NodeId) -> Option<&DirectoryNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Reconstruct the `/`-separated path of `id` relative to this node.
    ///
    /// Follows `parent` references upward, so `self` must be the tree root.
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = self.find(id)?;
        while let Some(parent) = current.parent {
            segments.push(current.name.as_str());
            current = self.find(parent)?;
        }
        segments.push(current.name.as_str());
        segments.reverse();
        Some(segments.join("/"))
    }

    /// Iterate over this node and every descendant, depth first.
    pub fn walk(&self) -> impl Iterator<Item = &DirectoryNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(id: u64, name: &str, parent: Option<u64>) -> DirectoryNode {
        DirectoryNode::new(
            NodeId::new(id),
            format!("p{id}"),
            format!("folder/{id}"),
            name,
            parent.map(NodeId::new),
        )
    }

    #[test]
    fn test_node_id() {
        let id = NodeId::new(42);
        assert_eq!(id.0, 42);
        assert_eq!(id.to_string(), "#42");
    }

    #[test]
    fn test_unknown_size_is_not_empty() {
        let unknown = FileEntry::new("a", "u", "doc", None);
        let empty = FileEntry::new("b", "u", "empty.txt", Some(0));

        assert!(!unknown.has_known_size());
        assert!(empty.has_known_size());
        assert_eq!(unknown.size_or_zero(), 0);
    }

    #[test]
    fn test_sort_canonical_is_ordinal() {
        let mut root = dir(0, "root", None);
        root.children.push(dir(1, "b", Some(0)));
        root.children.push(dir(2, "B", Some(0)));
        root.children.push(dir(3, "a", Some(0)));
        root.files.push(FileEntry::new("f1", "u", "z.txt", Some(1)));
        root.files.push(FileEntry::new("f2", "u", "Z.txt", Some(1)));

        root.sort_canonical();

        assert_eq!(root.entry_names(), vec!["B", "a", "b", "Z.txt", "z.txt"]);
    }

    #[test]
    fn test_path_of() {
        let mut root = dir(0, "root", None);
        let mut music = dir(1, "music", Some(0));
        music.children.push(dir(2, "live", Some(1)));
        root.children.push(music);

        assert_eq!(root.path_of(NodeId::new(2)).as_deref(), Some("root/music/live"));
        assert_eq!(root.path_of(NodeId::new(0)).as_deref(), Some("root"));
        assert!(root.path_of(NodeId::new(9)).is_none());
    }

    #[test]
    fn test_walk_visits_every_node() {
        let mut root = dir(0, "root", None);
        let mut a = dir(1, "a", Some(0));
        a.children.push(dir(3, "a1", Some(1)));
        root.children.push(a);
        root.children.push(dir(2, "b", Some(0)));

        let ids: Vec<u64> = root.walk().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![0, 1, 3, 2]);
    }
}
