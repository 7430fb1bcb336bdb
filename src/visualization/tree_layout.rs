//! Rectangular tree layout and presence classes for tree annotation.

use plotters::style::RGBColor;

use crate::config::PresenceThresholds;
use crate::phylo::PhyloTree;

/// How common a gene is within a lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceClass {
    /// Above the high threshold
    Fixed,
    /// Between the thresholds
    Variable,
    /// Below the low threshold
    Absent,
    /// Lineage not in the frequency table
    Missing,
}

impl PresenceClass {
    pub fn color(&self) -> RGBColor {
        match self {
            PresenceClass::Fixed => RGBColor(0, 128, 0),
            PresenceClass::Variable => RGBColor(255, 165, 0),
            PresenceClass::Absent => RGBColor(255, 0, 0),
            PresenceClass::Missing => RGBColor(160, 160, 160),
        }
    }
}

/// Classifies a frequency after rounding it to three decimals.
pub fn classify_presence(frequency: Option<f64>, thresholds: &PresenceThresholds) -> PresenceClass {
    let Some(frequency) = frequency else {
        return PresenceClass::Missing;
    };
    let rounded = (frequency * 1000.0).round() / 1000.0;
    if rounded > thresholds.high {
        PresenceClass::Fixed
    } else if rounded < thresholds.low {
        PresenceClass::Absent
    } else {
        PresenceClass::Variable
    }
}

/// Node coordinates in tree units: `x` is the distance from the root, `y`
/// the row, with leaves on consecutive rows in preorder.
#[derive(Debug, Clone)]
pub struct TreeLayout {
    /// Indexed by node id
    pub positions: Vec<(f64, f64)>,
    pub max_depth: f64,
    pub leaf_count: usize,
}

pub fn layout_tree(tree: &PhyloTree) -> TreeLayout {
    let order = tree.preorder();
    let mut positions = vec![(0.0, 0.0); tree.node_count()];

    let mut max_depth = 0.0f64;
    for &id in &order {
        let x = match tree.node(id).parent {
            Some(parent) => positions[parent].0 + tree.node(id).branch_length,
            None => 0.0,
        };
        positions[id].0 = x;
        max_depth = max_depth.max(x);
    }

    let mut leaf_count = 0usize;
    for &id in &order {
        if tree.is_leaf(id) {
            positions[id].1 = leaf_count as f64;
            leaf_count += 1;
        }
    }
    // Parents sit midway between their outermost children.
    for &id in order.iter().rev() {
        let children = &tree.node(id).children;
        if let (Some(&first), Some(&last)) = (children.first(), children.last()) {
            positions[id].1 = (positions[first].1 + positions[last].1) / 2.0;
        }
    }

    TreeLayout {
        positions,
        max_depth,
        leaf_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phylo::newick::parse_newick;
    use crate::phylo::tree::ROOT;
    use approx::assert_relative_eq;

    #[test]
    fn test_classify_presence() {
        let t = PresenceThresholds::default();
        assert_eq!(classify_presence(Some(1.0), &t), PresenceClass::Fixed);
        assert_eq!(classify_presence(Some(0.96), &t), PresenceClass::Fixed);
        assert_eq!(classify_presence(Some(0.95), &t), PresenceClass::Variable);
        // rounds to 0.950 before comparison
        assert_eq!(classify_presence(Some(0.9504), &t), PresenceClass::Variable);
        assert_eq!(classify_presence(Some(0.5), &t), PresenceClass::Variable);
        assert_eq!(classify_presence(Some(0.04), &t), PresenceClass::Absent);
        assert_eq!(classify_presence(None, &t), PresenceClass::Missing);
    }

    #[test]
    fn test_layout_tree() {
        let tree = parse_newick("((A:1,B:2):3,C:1);").unwrap();
        let layout = layout_tree(&tree);

        assert_eq!(layout.leaf_count, 3);
        assert_relative_eq!(layout.max_depth, 5.0);

        let a = tree.find("A").unwrap();
        let b = tree.find("B").unwrap();
        let c = tree.find("C").unwrap();
        let ab = tree.node(a).parent.unwrap();
        assert_eq!(layout.positions[a], (4.0, 0.0));
        assert_eq!(layout.positions[b], (5.0, 1.0));
        assert_eq!(layout.positions[c], (1.0, 2.0));
        assert_eq!(layout.positions[ab], (3.0, 0.5));
        assert_eq!(layout.positions[ROOT], (0.0, 1.25));
    }
}
