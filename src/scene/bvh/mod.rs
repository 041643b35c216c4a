mod building;
mod sorting;

pub use sorting::{RayQueue, SorterScratch};

use crate::{geometry::WorldBox4, scene::PrimitiveList};

/// Node of the dense 4-ary tree. The tree lives in a flat array in
/// level-order position: the children of node `i` are `4i+1..=4i+4`.
/// `child_boxes` packs the four children's bounds, one lane per child.
/// A leaf without an id is a sentinel for an empty subtree.
#[derive(Clone, Debug)]
pub(crate) enum BvhNode {
    Inner { child_boxes: WorldBox4 },
    Leaf { leaf: Option<usize> },
}

impl Default for BvhNode {
    fn default() -> Self {
        BvhNode::Leaf { leaf: None }
    }
}

/// Bounding volume hierarchy over the scene's primitives. Built once at
/// scene construction, immutable afterwards. Owns the node array and the
/// leaf table of per-leaf primitive collections.
pub struct Bvh {
    pub(crate) nodes: Vec<BvhNode>,
    pub(crate) leaves: Vec<PrimitiveList>,

    depth: usize,
    pub(crate) n_inner: usize,
}

impl Bvh {
    /// Number of non-sentinel leaves, which is also the number of ray
    /// queues a sorting pass needs.
    pub fn n_leaves(&self) -> usize {
        self.leaves.len()
    }

    pub fn leaf_primitives(&self, leaf_id: usize) -> &PrimitiveList {
        &self.leaves[leaf_id]
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn new_empty(depth: usize) -> Bvh {
        let n_inner = 4usize.pow(depth as u32) - 1;
        let n_total = 4usize.pow(depth as u32 + 1) - 1;
        Bvh {
            nodes: vec![BvhNode::default(); n_total],
            leaves: Vec::new(),
            depth,
            n_inner,
        }
    }

    pub fn print_statistics(&self) {
        let inner_count = self
            .nodes
            .iter()
            .filter(|n| matches!(n, BvhNode::Inner { .. }))
            .count();

        println!(
            "Tree: depth {}, {} nodes addressed, {} inner",
            self.depth,
            self.nodes.len(),
            inner_count
        );
        println!("Leaf nodes: {}", self.leaves.len());
        match self.leaf_fill() {
            Some(fill) => println!(
                "Leaf fill: {} - {} primitives, avg {:.1}",
                fill.min, fill.max, fill.mean
            ),
            None => println!("Leaf fill: no leaves"),
        }
    }

    /// How many primitives the leaves hold, smallest to largest. `None` for
    /// a tree without leaves.
    fn leaf_fill(&self) -> Option<LeafFill> {
        let mut sizes = self
            .leaves
            .iter()
            .map(|list| list.iter().map(|c| c.len()).sum::<usize>());

        let first = sizes.next()?;
        let mut fill = LeafFill {
            min: first,
            max: first,
            mean: 0.0,
        };
        let mut total = first;
        for size in sizes {
            fill.min = fill.min.min(size);
            fill.max = fill.max.max(size);
            total += size;
        }
        fill.mean = total as f32 / self.leaves.len() as f32;
        Some(fill)
    }
}

#[derive(Copy, Clone, Debug)]
struct LeafFill {
    min: usize,
    max: usize,
    mean: f32,
}
