//! Newick reader.
//!
//! Handles nested groups, leaf and internal labels, quoted labels
//! (`'a b'`, with `''` as an escaped quote), branch lengths and `[...]`
//! comments. A purely numeric label on an internal node is read as a support
//! value rather than a name. Missing branch lengths default to 1.0.

use std::path::Path;

use super::tree::{NodeId, PhyloTree, TreeNode};
use super::TreeError;

/// Branch length assigned when a node has no `:length`.
pub const DEFAULT_BRANCH_LENGTH: f64 = 1.0;

struct Parser<'a> {
    bytes: &'a [u8],
    idx: usize,
    nodes: Vec<TreeNode>,
}

fn is_delim(b: u8) -> bool {
    matches!(b, b'(' | b')' | b',' | b':' | b';' | b'[' | b']')
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> TreeError {
        TreeError::Parse {
            position: self.idx,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.idx).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.idx += 1;
        }
    }

    /// Skips whitespace and any number of `[...]` comments.
    fn skip_filler(&mut self) -> Result<(), TreeError> {
        loop {
            self.skip_ws();
            if self.peek() != Some(b'[') {
                return Ok(());
            }
            match self.bytes[self.idx..].iter().position(|&b| b == b']') {
                Some(offset) => self.idx += offset + 1,
                None => return Err(self.error("Unterminated comment")),
            }
        }
    }

    fn parse_label(&mut self) -> Result<Option<String>, TreeError> {
        self.skip_filler()?;
        match self.peek() {
            Some(b'\'') => {
                self.idx += 1;
                let mut label = Vec::new();
                loop {
                    match self.peek() {
                        None => return Err(self.error("Unterminated quoted label")),
                        Some(b'\'') if self.bytes.get(self.idx + 1) == Some(&b'\'') => {
                            label.push(b'\'');
                            self.idx += 2;
                        }
                        Some(b'\'') => {
                            self.idx += 1;
                            break;
                        }
                        Some(b) => {
                            label.push(b);
                            self.idx += 1;
                        }
                    }
                }
                Ok(Some(String::from_utf8_lossy(&label).into_owned()))
            }
            Some(b) if !is_delim(b) => {
                let start = self.idx;
                while self.peek().is_some_and(|b| !is_delim(b)) {
                    self.idx += 1;
                }
                let label = String::from_utf8_lossy(&self.bytes[start..self.idx])
                    .trim()
                    .to_string();
                Ok((!label.is_empty()).then_some(label))
            }
            _ => Ok(None),
        }
    }

    fn parse_branch_length(&mut self) -> Result<Option<f64>, TreeError> {
        self.skip_filler()?;
        if self.peek() != Some(b':') {
            return Ok(None);
        }
        self.idx += 1;
        self.skip_ws();
        let start = self.idx;
        while self.peek().is_some_and(|b| !is_delim(b)) {
            self.idx += 1;
        }
        let raw = String::from_utf8_lossy(&self.bytes[start..self.idx])
            .trim()
            .to_string();
        raw.parse::<f64>()
            .map(Some)
            .map_err(|_| self.error(format!("Invalid branch length '{}'", raw)))
    }

    fn push(&mut self, node: TreeNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn parse_subtree(&mut self) -> Result<NodeId, TreeError> {
        self.skip_filler()?;
        if self.peek().is_none() {
            return Err(self.error("Unexpected end of Newick"));
        }

        let mut children = Vec::new();
        if self.peek() == Some(b'(') {
            self.idx += 1;
            loop {
                children.push(self.parse_subtree()?);
                self.skip_filler()?;
                match self.peek() {
                    Some(b',') => self.idx += 1,
                    Some(b')') => {
                        self.idx += 1;
                        break;
                    }
                    None => return Err(self.error("Unterminated Newick group")),
                    Some(_) => return Err(self.error("Invalid Newick group separator")),
                }
            }
        }

        let label = self.parse_label()?;
        let length = self.parse_branch_length()?;
        self.skip_filler()?;

        let (name, support) = match label {
            Some(label) if !children.is_empty() => match label.parse::<f64>() {
                Ok(support) => (None, Some(support)),
                Err(_) => (Some(label), None),
            },
            Some(label) => (Some(label), None),
            None if children.is_empty() => {
                return Err(self.error("Expected leaf label in Newick"));
            }
            None => (None, None),
        };

        let id = self.push(TreeNode {
            name,
            branch_length: length.unwrap_or(DEFAULT_BRANCH_LENGTH),
            support,
            parent: None,
            children: children.clone(),
        });
        for child in children {
            self.nodes[child].parent = Some(id);
        }
        Ok(id)
    }
}

/// Parses the first tree of a Newick string.
pub fn parse_newick(text: &str) -> Result<PhyloTree, TreeError> {
    let mut parser = Parser {
        bytes: text.as_bytes(),
        idx: 0,
        nodes: Vec::new(),
    };
    let root = parser.parse_subtree()?;
    parser.skip_filler()?;
    match parser.peek() {
        None | Some(b';') => {}
        Some(_) => return Err(parser.error("Unexpected character after tree")),
    }
    Ok(PhyloTree::from_arena(parser.nodes, root))
}

/// Reads and parses a Newick file.
pub fn read_newick_file(path: &Path) -> Result<PhyloTree, TreeError> {
    let text = std::fs::read_to_string(path)?;
    let tree = parse_newick(&text)?;
    log::info!(
        "Loaded tree from {} with {} nodes ({} leaves)",
        path.display(),
        tree.node_count(),
        tree.leaves().len()
    );
    Ok(tree)
}
