//! Structural statistics for the position container

use std::fmt;

/// Width of one stored position inside a node.
const POSITION_WIDTH: usize = 8;

/// Node and level counts of a position tree holding `element_count` positions
/// in nodes of `node_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub element_count: u64,
    pub node_size: u32,
    pub levels: u32,
    pub leaf_node_count: u64,
    pub branch_node_count: u64,
    pub free_node_list_head: u64,
}

impl TreeStats {
    /// Computes the shape of a fully packed tree.
    ///
    /// An empty tree still has one (empty) root leaf.
    pub fn compute(element_count: u64, node_size: u32) -> Self {
        let fanout = ((node_size as usize) / POSITION_WIDTH).max(2) as u64;

        let leaf_node_count = element_count.div_ceil(fanout).max(1);
        let mut branch_node_count = 0;
        let mut levels = 1;
        let mut width = leaf_node_count;
        while width > 1 {
            width = width.div_ceil(fanout);
            branch_node_count += width;
            levels += 1;
        }

        Self {
            element_count,
            node_size,
            levels,
            leaf_node_count,
            branch_node_count,
            free_node_list_head: 0,
        }
    }

    /// Leaf and branch nodes. A packed tree keeps no free nodes, so
    /// `free_node_list_head` is always zero.
    pub fn node_count(&self) -> u64 {
        self.leaf_node_count + self.branch_node_count
    }
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  element count ------------: {}", self.element_count)?;
        writeln!(f, "  node size ----------------: {}", self.node_size)?;
        writeln!(f, "  levels in tree -----------: {}", self.levels)?;
        writeln!(f, "  node count ---------------: {}", self.node_count())?;
        writeln!(f, "  leaf node count ----------: {}", self.leaf_node_count)?;
        writeln!(f, "  branch node count --------: {}", self.branch_node_count)?;
        writeln!(f, "  free node list head id ---: {}", self.free_node_list_head)
    }
}
