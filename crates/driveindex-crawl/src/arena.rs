//! Concurrent node storage for the tree under construction.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};

use driveindex_core::{DirectoryNode, FileEntry, NodeId};

/// Hands out unique [`NodeId`]s.
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: AtomicU64,
}

impl NodeIdAllocator {
    /// Create an allocator starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    pub fn allocate(&self) -> NodeId {
        NodeId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct ArenaNode {
    node: DirectoryNode,
    child_ids: Vec<NodeId>,
}

/// Flat storage of every folder node, keyed by id.
///
/// Children are stored as ids; [`NodeArena::materialize`] builds the nested
/// tree on demand. Each node is only mutated by the worker that owns its
/// folder task, so the map's shard locks are the only synchronization.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: DashMap<NodeId, ArenaNode>,
}

impl NodeArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of folders stored.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if no folders are stored.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Store a node. Its `children` are ignored; use [`NodeArena::attach`].
    pub fn insert(&self, mut node: DirectoryNode) {
        node.children.clear();
        self.nodes.insert(
            node.id,
            ArenaNode {
                node,
                child_ids: Vec::new(),
            },
        );
    }

    /// Copy of a node without its children.
    pub fn get(&self, id: NodeId) -> Option<DirectoryNode> {
        self.nodes.get(&id).map(|entry| entry.node.clone())
    }

    /// Apply `f` to a stored node.
    pub fn update<R>(&self, id: NodeId, f: impl FnOnce(&mut DirectoryNode) -> R) -> Option<R> {
        self.nodes.get_mut(&id).map(|mut entry| f(&mut entry.node))
    }

    /// Store a finished listing: children become arena nodes and `node`
    /// takes the listed files.
    ///
    /// Children must be inserted before any task referring to them is queued.
    pub fn attach(
        &self,
        id: NodeId,
        children: Vec<DirectoryNode>,
        files: Vec<FileEntry>,
        update: impl FnOnce(&mut DirectoryNode),
    ) -> bool {
        let child_ids: Vec<NodeId> = children.iter().map(|child| child.id).collect();
        for child in children {
            self.insert(child);
        }

        match self.nodes.get_mut(&id) {
            Some(mut entry) => {
                entry.child_ids.extend(child_ids);
                entry.node.files = files;
                update(&mut entry.node);
                true
            }
            None => false,
        }
    }

    /// Fill in the size of the file at `index` in `node`.
    ///
    /// Returns `false` if the slot no longer holds `file_id`.
    pub fn set_file_size(&self, node: NodeId, index: usize, file_id: &str, size: u64) -> bool {
        self.update(node, |dir| match dir.files.get_mut(index) {
            Some(file) if file.provider_id == file_id => {
                file.size = Some(size);
                true
            }
            _ => false,
        })
        .unwrap_or(false)
    }

    /// Build the nested tree rooted at `root`.
    pub fn materialize(&self, root: NodeId) -> Option<DirectoryNode> {
        let (mut node, child_ids) = {
            let entry = self.nodes.get(&root)?;
            (entry.node.clone(), entry.child_ids.clone())
        };

        node.children = child_ids
            .into_iter()
            .filter_map(|child| self.materialize(child))
            .collect();
        Some(node)
    }
}

/// Records folders already queued for expansion.
///
/// A folder reachable through more than one parent is expanded only once.
#[derive(Debug, Default)]
pub struct FolderTracker {
    seen: DashSet<String>,
}

impl FolderTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a folder. Returns `true` the first time it is seen.
    pub fn track(&self, folder_id: &str) -> bool {
        self.seen.insert(folder_id.to_string())
    }

    /// Number of distinct folders tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if no folders have been tracked.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(ids: &NodeIdAllocator, name: &str, parent: Option<NodeId>) -> DirectoryNode {
        let id = ids.allocate();
        DirectoryNode::new(id, name, format!("u/{name}"), name, parent)
    }

    #[test]
    fn test_allocator_is_unique() {
        let ids = NodeIdAllocator::new();
        assert_eq!(ids.allocate(), NodeId::new(0));
        assert_eq!(ids.allocate(), NodeId::new(1));
    }

    #[test]
    fn test_attach_and_materialize() {
        let ids = NodeIdAllocator::new();
        let arena = NodeArena::new();
        let root = dir(&ids, "root", None);
        let root_id = root.id;
        arena.insert(root);

        let a = dir(&ids, "a", Some(root_id));
        let b = dir(&ids, "b", Some(root_id));
        let a_id = a.id;
        let files = vec![FileEntry::new("f1", "u", "x.txt", None)];
        assert!(arena.attach(root_id, vec![a, b], files, |_| {}));

        let nested = dir(&ids, "a1", Some(a_id));
        assert!(arena.attach(a_id, vec![nested], Vec::new(), |_| {}));

        let tree = arena.materialize(root_id).unwrap();
        assert_eq!(tree.entry_names(), vec!["a", "b", "x.txt"]);
        assert_eq!(tree.children[0].children[0].name.as_str(), "a1");
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn test_set_file_size_checks_slot() {
        let ids = NodeIdAllocator::new();
        let arena = NodeArena::new();
        let root = dir(&ids, "root", None);
        let root_id = root.id;
        arena.insert(root);
        arena.attach(root_id, Vec::new(), vec![FileEntry::new("f1", "u", "doc", None)], |_| {});

        assert!(!arena.set_file_size(root_id, 0, "other", 5));
        assert!(arena.set_file_size(root_id, 0, "f1", 5));
        assert_eq!(arena.get(root_id).unwrap().files[0].size, Some(5));
    }

    #[test]
    fn test_folder_tracker() {
        let tracker = FolderTracker::new();
        assert!(tracker.track("abc"));
        assert!(!tracker.track("abc"));
        assert_eq!(tracker.len(), 1);
    }
}
