use crate::{
    index::bitmap_map::BitmapMap,
    tx::{Transaction, TransactionalBitmap, TransactionalMap, TransactionalSet},
};
use stratadb_query::TraversalMode;

///
/// HierarchyIndex
///
/// Parent/child placement of hierarchical entities. Nodes whose parent has
/// not been indexed yet are tracked as orphans and excluded from traversal
/// until the parent arrives; their children edges are recorded up front so
/// attachment is automatic.
///

#[derive(Debug, Default)]
pub struct HierarchyIndex {
    roots: TransactionalBitmap,
    children: BitmapMap<u32>,
    parents: TransactionalMap<u32, Option<u32>>,
    orphans: TransactionalSet<u32>,
}

impl HierarchyIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            roots: TransactionalBitmap::new(),
            children: BitmapMap::new(),
            parents: TransactionalMap::new(),
            orphans: TransactionalSet::new(),
        }
    }

    #[must_use]
    pub fn contains_node(&self, txn: Option<&Transaction>, node: u32) -> bool {
        self.parents.contains_key(txn, &node)
    }

    #[must_use]
    pub fn is_empty(&self, txn: Option<&Transaction>) -> bool {
        self.parents.is_empty(txn)
    }

    /// Place a node under `parent` (`None` places it at the root level),
    /// replacing any previous placement.
    pub fn set_parent(&mut self, mut txn: Option<&mut Transaction>, node: u32, parent: Option<u32>) {
        if self.parents.contains_key(txn.as_deref(), &node) {
            self.detach(txn.as_deref_mut(), node);
        }
        self.parents.insert(txn.as_deref_mut(), node, parent);

        match parent {
            None => {
                self.roots.insert(txn.as_deref_mut(), node);
            }
            Some(parent) => {
                self.children.add(txn.as_deref_mut(), parent, node);
                if !self.parents.contains_key(txn.as_deref(), &parent) {
                    self.orphans.insert(txn.as_deref_mut(), node);
                }
            }
        }

        // the node's arrival attaches any children that were waiting for it
        if let Some(waiting) = self.children.bucket(txn.as_deref(), &node) {
            for child in waiting.iter() {
                self.orphans.remove(txn.as_deref_mut(), &child);
            }
        }
    }

    /// Remove a node's placement. Its children stay recorded under it and
    /// become orphans until the node is re-indexed.
    pub fn remove_node(&mut self, mut txn: Option<&mut Transaction>, node: u32) {
        self.detach(txn.as_deref_mut(), node);
        self.parents.remove(txn.as_deref_mut(), &node);
        if let Some(children) = self.children.bucket(txn.as_deref(), &node) {
            for child in children.iter() {
                self.orphans.insert(txn.as_deref_mut(), child);
            }
        }
    }

    /// All attached nodes in traversal order from the roots. `level_sorter`
    /// orders each sibling group before it is visited.
    #[must_use]
    pub fn list_nodes_from_root(
        &self,
        txn: Option<&Transaction>,
        mode: TraversalMode,
        level_sorter: &dyn Fn(Vec<u32>) -> Vec<u32>,
    ) -> Vec<u32> {
        let roots = level_sorter(self.roots.materialize(txn).to_vec());
        let mut result = Vec::new();
        match mode {
            TraversalMode::DepthFirst => {
                for root in roots {
                    self.visit_depth_first(txn, root, level_sorter, &mut result);
                }
            }
            TraversalMode::BreadthFirst => {
                let mut queue = std::collections::VecDeque::from(roots);
                while let Some(node) = queue.pop_front() {
                    result.push(node);
                    for child in self.attached_children(txn, node, level_sorter) {
                        queue.push_back(child);
                    }
                }
            }
        }
        result
    }

    pub fn commit(&mut self, txn: &mut Transaction) {
        self.roots.commit(txn);
        self.children.commit(txn);
        self.parents.commit(txn);
        self.orphans.commit(txn);
    }

    fn visit_depth_first(
        &self,
        txn: Option<&Transaction>,
        node: u32,
        level_sorter: &dyn Fn(Vec<u32>) -> Vec<u32>,
        result: &mut Vec<u32>,
    ) {
        result.push(node);
        for child in self.attached_children(txn, node, level_sorter) {
            self.visit_depth_first(txn, child, level_sorter, result);
        }
    }

    fn attached_children(
        &self,
        txn: Option<&Transaction>,
        node: u32,
        level_sorter: &dyn Fn(Vec<u32>) -> Vec<u32>,
    ) -> Vec<u32> {
        let Some(children) = self.children.bucket(txn, &node) else {
            return Vec::new();
        };
        level_sorter(
            children
                .iter()
                .filter(|child| {
                    self.parents.contains_key(txn, child) && !self.orphans.contains(txn, child)
                })
                .collect(),
        )
    }

    fn detach(&mut self, mut txn: Option<&mut Transaction>, node: u32) {
        match self.parents.get(txn.as_deref(), &node).copied() {
            Some(None) => {
                self.roots.remove(txn, node);
            }
            Some(Some(parent)) => {
                self.children.remove(txn.as_deref_mut(), &parent, node, true);
                self.orphans.remove(txn, &node);
            }
            None => {}
        }
    }
}
