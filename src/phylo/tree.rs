//! Arena-backed rooted tree.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::TreeError;

pub type NodeId = usize;

/// Id of the root once a tree has been built.
pub const ROOT: NodeId = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: Option<String>,
    /// Length of the branch leading to this node
    pub branch_length: f64,
    pub support: Option<f64>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Rooted tree. Node ids are assigned in preorder, so the root is always [`ROOT`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhyloTree {
    nodes: Vec<TreeNode>,
}

impl PhyloTree {
    /// Builds a tree from parsed nodes, dropping anything unreachable from `root`.
    pub(crate) fn from_arena(nodes: Vec<TreeNode>, root: NodeId) -> Self {
        let mut tree = PhyloTree { nodes };
        tree.compact(root);
        tree
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id].children.is_empty()
    }

    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.nodes[id].name.as_deref()
    }

    /// All node ids in preorder, children visited left to right.
    pub fn preorder(&self) -> Vec<NodeId> {
        self.preorder_from(ROOT)
    }

    fn preorder_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| self.is_leaf(id))
            .collect()
    }

    pub fn leaf_names(&self) -> Vec<String> {
        self.leaves()
            .into_iter()
            .filter_map(|id| self.nodes[id].name.clone())
            .collect()
    }

    /// The unique node carrying `label`.
    pub fn find(&self, label: &str) -> Result<NodeId, TreeError> {
        let mut matches = self
            .preorder()
            .into_iter()
            .filter(|&id| self.label(id) == Some(label));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id),
            (Some(_), Some(_)) => Err(TreeError::AmbiguousLabel(label.to_string())),
            (None, _) => Err(TreeError::UnknownLabel(label.to_string())),
        }
    }

    /// Removes the node labelled `label`; see [`PhyloTree::delete`].
    pub fn delete_by_name(
        &mut self,
        label: &str,
        preserve_branch_length: bool,
    ) -> Result<(), TreeError> {
        let id = self.find(label)?;
        self.delete(id, preserve_branch_length);
        Ok(())
    }

    /// Removes a node, attaching its children to its parent.
    ///
    /// A parent left with a single child is removed in turn (its child moves
    /// up a level). With `preserve_branch_length` the removed node's branch
    /// length is added to its only child, or to its parent when it had several
    /// children. Deleting the root is a no-op. Node ids are reassigned.
    pub fn delete(&mut self, id: NodeId, preserve_branch_length: bool) {
        if self.nodes[id].parent.is_none() {
            warn!("Refusing to delete the root node");
            return;
        }
        self.detach(id, true, preserve_branch_length);
        self.compact(ROOT);
    }

    fn detach(&mut self, id: NodeId, prevent_nondicotomic: bool, preserve_branch_length: bool) {
        let Some(parent) = self.nodes[id].parent else {
            return;
        };
        let children = std::mem::take(&mut self.nodes[id].children);
        let length = self.nodes[id].branch_length;

        if preserve_branch_length {
            match children.len() {
                0 => {}
                1 => self.nodes[children[0]].branch_length += length,
                _ => self.nodes[parent].branch_length += length,
            }
        }

        for &child in &children {
            self.nodes[child].parent = Some(parent);
            self.nodes[parent].children.push(child);
        }
        self.nodes[parent].children.retain(|&c| c != id);
        self.nodes[id].parent = None;
        debug!("Detached node {:?}", self.nodes[id].name);

        if prevent_nondicotomic && self.nodes[parent].children.len() < 2 {
            self.detach(parent, false, preserve_branch_length);
        }
    }

    /// Removes every leaf whose label fails `keep` (unlabelled leaves included).
    /// Returns the removed labels.
    pub fn retain_leaves<F>(&mut self, keep: F, preserve_branch_length: bool) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let mut removed = Vec::new();
        loop {
            let doomed: Vec<NodeId> = self
                .leaves()
                .into_iter()
                .filter(|&id| id != ROOT && !self.label(id).is_some_and(&keep))
                .collect();
            if doomed.is_empty() {
                break;
            }
            for id in doomed {
                if let Some(name) = self.nodes[id].name.clone() {
                    removed.push(name);
                }
                self.detach(id, true, preserve_branch_length);
            }
            self.compact(ROOT);
        }
        removed
    }

    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> NodeId {
        let mut ancestors = HashSet::new();
        let mut current = Some(a);
        while let Some(id) = current {
            ancestors.insert(id);
            current = self.nodes[id].parent;
        }
        let mut current = b;
        while !ancestors.contains(&current) {
            match self.nodes[current].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Cophenetic distance: path length between two nodes through their lowest common ancestor.
    pub fn distance_between(&self, a: NodeId, b: NodeId) -> f64 {
        let ancestor = self.common_ancestor(a, b);
        let mut dist = 0.0;
        for start in [a, b] {
            let mut current = start;
            while current != ancestor {
                dist += self.nodes[current].branch_length;
                match self.nodes[current].parent {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
        }
        dist
    }

    /// Renumbers nodes reachable from `root` in preorder and drops the rest.
    fn compact(&mut self, root: NodeId) {
        let order = self.preorder_from(root);
        let mut remap = vec![usize::MAX; self.nodes.len()];
        for (new_id, &old_id) in order.iter().enumerate() {
            remap[old_id] = new_id;
        }
        let nodes = order
            .iter()
            .map(|&old_id| {
                let node = &self.nodes[old_id];
                TreeNode {
                    name: node.name.clone(),
                    branch_length: node.branch_length,
                    support: node.support,
                    parent: node.parent.map(|p| remap[p]),
                    children: node.children.iter().map(|&c| remap[c]).collect(),
                }
            })
            .collect();
        self.nodes = nodes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phylo::newick::parse_newick;
    use approx::assert_relative_eq;

    const TREE: &str = "((A:1,B:2)0.9:3,(C:4,D:5):6);";

    fn distance(tree: &PhyloTree, a: &str, b: &str) -> f64 {
        tree.distance_between(tree.find(a).unwrap(), tree.find(b).unwrap())
    }

    #[test]
    fn test_distances() {
        let tree = parse_newick(TREE).unwrap();
        assert_relative_eq!(distance(&tree, "A", "B"), 3.0);
        assert_relative_eq!(distance(&tree, "A", "C"), 14.0);
        assert_relative_eq!(distance(&tree, "C", "A"), 14.0);
        assert_relative_eq!(distance(&tree, "D", "D"), 0.0);
        assert_relative_eq!(tree.distance_between(ROOT, tree.find("D").unwrap()), 11.0);
        assert_eq!(tree.common_ancestor(tree.find("A").unwrap(), tree.find("B").unwrap()), 1);
    }

    #[test]
    fn test_unknown_and_ambiguous_labels() {
        let tree = parse_newick(TREE).unwrap();
        assert!(matches!(tree.find("Z"), Err(TreeError::UnknownLabel(_))));
        let dup = parse_newick("(A,A);").unwrap();
        assert!(matches!(dup.find("A"), Err(TreeError::AmbiguousLabel(_))));
    }

    #[test]
    fn test_delete_leaf_collapses_parent() {
        let mut tree = parse_newick(TREE).unwrap();
        tree.delete_by_name("B", false).unwrap();

        assert_eq!(tree.leaf_names(), vec!["C", "D", "A"]);
        assert_eq!(tree.node(ROOT).children.len(), 2);
        assert_eq!(tree.node(tree.find("A").unwrap()).parent, Some(ROOT));
        assert_relative_eq!(distance(&tree, "A", "C"), 11.0);
        assert_eq!(tree.node_count(), 5);
    }

    #[test]
    fn test_delete_leaf_preserving_branch_length() {
        let mut tree = parse_newick(TREE).unwrap();
        tree.delete_by_name("B", true).unwrap();
        assert_relative_eq!(distance(&tree, "A", "C"), 14.0);
    }

    #[test]
    fn test_delete_root_is_noop() {
        let mut tree = parse_newick(TREE).unwrap();
        let before = tree.node_count();
        tree.delete(ROOT, false);
        assert_eq!(tree.node_count(), before);
    }

    #[test]
    fn test_delete_unknown() {
        let mut tree = parse_newick(TREE).unwrap();
        assert!(tree.delete_by_name("Q", false).is_err());
    }

    #[test]
    fn test_retain_leaves() {
        let mut tree = parse_newick(TREE).unwrap();
        let removed = tree.retain_leaves(|name| name == "A" || name == "C", false);
        assert_eq!(removed, vec!["B", "D"]);
        assert_eq!(tree.leaf_names(), vec!["A", "C"]);
        assert_relative_eq!(distance(&tree, "A", "C"), 5.0);
    }
}
