use crate::path::{PathSpec, TypeIndicator};

/// Index into the arena `Vec<ScanNode>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single node in the scan tree, stored in a flat arena.
/// Uses sibling-list representation: each node has `first_child`,
/// `last_child` and `next_sibling`, children kept in discovery order.
#[derive(Debug, Clone)]
pub struct ScanNode {
    /// Layer this node was discovered as
    pub path_spec: PathSpec,
    /// Parent node index (None for root)
    pub parent: Option<NodeId>,
    /// First discovered child (None for leaves)
    pub first_child: Option<NodeId>,
    /// Most recently discovered child, where new children are appended
    pub last_child: Option<NodeId>,
    /// Next sibling node index (None if last child)
    pub next_sibling: Option<NodeId>,
    /// Depth in the tree (root = 0)
    pub depth: u16,
}

impl ScanNode {
    pub fn type_indicator(&self) -> TypeIndicator {
        self.path_spec.type_indicator()
    }

    pub fn is_file_system(&self) -> bool {
        self.type_indicator().is_file_system()
    }

    /// Volume system root, e.g. the partition table at location `/`.
    pub fn is_volume_system_root(&self) -> bool {
        self.type_indicator().is_volume_system()
    }

    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }
}

/// The discovery tree stored as a flat arena of nodes.
#[derive(Debug, Clone)]
pub struct ScanTree {
    /// All nodes in contiguous memory
    pub nodes: Vec<ScanNode>,
    /// Root node index
    pub root: NodeId,
}

impl ScanTree {
    /// Create a tree holding only the root layer.
    pub fn new(root_spec: PathSpec) -> Self {
        let root_node = ScanNode {
            path_spec: root_spec,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            depth: 0,
        };

        ScanTree {
            nodes: vec![root_node],
            root: NodeId(0),
        }
    }

    /// Append a child under `parent`. A child with an equal path
    /// specification is reused, so re-scans never duplicate nodes.
    /// Returns the child's ID and whether it was newly created.
    pub fn add_child(&mut self, parent: NodeId, path_spec: PathSpec) -> (NodeId, bool) {
        if let Some(existing) = self
            .children(parent)
            .find(|&id| self.get(id).path_spec == path_spec)
        {
            return (existing, false);
        }

        let new_id = NodeId(self.nodes.len() as u32);
        let node = ScanNode {
            path_spec,
            parent: Some(parent),
            first_child: None,
            last_child: None,
            next_sibling: None,
            depth: self.nodes[parent.index()].depth + 1,
        };

        // Append to parent's child list (O(1) via last_child)
        match self.nodes[parent.index()].last_child {
            Some(last) => self.nodes[last.index()].next_sibling = Some(new_id),
            None => self.nodes[parent.index()].first_child = Some(new_id),
        }
        self.nodes[parent.index()].last_child = Some(new_id);

        self.nodes.push(node);
        (new_id, true)
    }

    /// Get a node by ID.
    pub fn get(&self, id: NodeId) -> &ScanNode {
        &self.nodes[id.index()]
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty (only root).
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Iterate over children of a node in discovery order.
    pub fn children(&self, parent: NodeId) -> ChildIter<'_> {
        ChildIter {
            tree: self,
            current: self.nodes[parent.index()].first_child,
        }
    }

    /// Direct child whose path specification has the given location.
    pub fn sub_node_by_location(&self, parent: NodeId, location: &str) -> Option<NodeId> {
        self.children(parent)
            .find(|&id| self.get(id).path_spec.location() == Some(location))
    }

    /// Node holding exactly this path specification.
    pub fn find(&self, path_spec: &PathSpec) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| &node.path_spec == path_spec)
            .map(|i| NodeId(i as u32))
    }
}

/// Iterator over the children of a node.
pub struct ChildIter<'a> {
    tree: &'a ScanTree,
    current: Option<NodeId>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.tree.nodes[id.index()].next_sibling;
        Some(id)
    }
}
