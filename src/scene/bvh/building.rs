use std::{collections::VecDeque, ops::Range};

use assert2::assert;
use itertools::Itertools as _;
use simba::simd::SimdValue as _;

use crate::{
    geometry::{FloatType, WorldBox, WorldBox4, WorldVector},
    scene::{Primitive, collect_primitives},
};

use super::{Bvh, BvhNode};

impl Bvh {
    /// Builds the tree top-down over the given primitives.
    ///
    /// Nodes are visited in level-order. A node's set is cut into four
    /// approximately equal quartiles along the axis where the primitive
    /// centres have the largest variance; nodes in the last addressable
    /// layer, or with fewer than `2 * min_leaf_size` primitives, become
    /// leaves. Every primitive ends up in exactly one leaf.
    pub fn build(mut primitives: Vec<Primitive>, max_depth: usize, min_leaf_size: usize) -> Bvh {
        assert!(max_depth >= 1);
        assert!(min_leaf_size >= 1);

        let mut bvh = Bvh::new_empty(tree_depth(primitives.len(), max_depth));

        let mut queue: VecDeque<(usize, Range<usize>)> = VecDeque::new();
        queue.push_back((0, 0..primitives.len()));

        while let Some((index, range)) = queue.pop_front() {
            if range.is_empty() {
                // Sentinel leaf, nothing to store.
                continue;
            }

            let offset = range.start;
            let set = &mut primitives[range];

            if index >= bvh.n_inner || set.len() < 2 * min_leaf_size {
                let leaf_id = bvh.leaves.len();
                bvh.leaves.push(collect_primitives(set.iter()));
                bvh.nodes[index] = BvhNode::Leaf { leaf: Some(leaf_id) };
                continue;
            }

            let axis = split_axis(set);
            let cmp = move |a: &Primitive, b: &Primitive| {
                center_on(a, axis).total_cmp(&center_on(b, axis))
            };

            // Median first, then the two mid-quartile pivots.
            let n = set.len();
            set.select_nth_unstable_by(n / 2, cmp);
            set[..n / 2].select_nth_unstable_by(n / 4, cmp);
            set[n / 2..].select_nth_unstable_by(3 * n / 4 - n / 2, cmp);

            let mut child_boxes = WorldBox4::default();
            for (child, (&lo, &hi)) in [0, n / 4, n / 2, 3 * n / 4, n]
                .iter()
                .tuple_windows()
                .enumerate()
            {
                if let Some(bb) = enclosing_box(&set[lo..hi]) {
                    child_boxes.replace(child, bb);
                }
                queue.push_back((4 * index + child + 1, offset + lo..offset + hi));
            }
            bvh.nodes[index] = BvhNode::Inner { child_boxes };
        }

        bvh
    }
}

/// Smallest number of levels whose last layer can address every primitive,
/// clamped to `max_depth`.
fn tree_depth(n_primitives: usize, max_depth: usize) -> usize {
    let mut depth = 0;
    while 4usize.pow(depth as u32) < n_primitives {
        depth += 1;
    }
    depth.min(max_depth)
}

fn center_on(primitive: &Primitive, axis: usize) -> FloatType {
    primitive.bound().center()[axis]
}

/// Axis with the largest variance of primitive centres. Ties pick the
/// earliest axis, so the choice is reproducible.
fn split_axis(set: &[Primitive]) -> usize {
    let inv = 1.0 / set.len() as FloatType;
    let mean = set
        .iter()
        .map(|p| p.bound().center().coords)
        .sum::<WorldVector>()
        * inv;
    let variance = set
        .iter()
        .map(|p| {
            let d = p.bound().center().coords - mean;
            d.component_mul(&d)
        })
        .sum::<WorldVector>()
        * inv;

    let mut axis = 0;
    for candidate in 1..3 {
        if variance[candidate] > variance[axis] {
            axis = candidate;
        }
    }
    axis
}

fn enclosing_box(set: &[Primitive]) -> Option<WorldBox> {
    set.iter()
        .map(Primitive::bound)
        .reduce(|acc, bb| acc.union(&bb))
}
