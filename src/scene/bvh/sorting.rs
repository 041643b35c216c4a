use std::collections::VecDeque;

use assert2::debug_assert;

use crate::geometry::{Ray, Ray4, RayIntersectionExt as _, hit_lanes};

use super::{Bvh, BvhNode};

/// Rays waiting to be intersected against one leaf's primitives.
pub type RayQueue = Vec<Ray>;

/// Reusable traversal state, kept between generations so the FIFO
/// allocation survives. The counters accumulate over the whole render and
/// feed the duplication report.
#[derive(Clone, Debug, Default)]
pub struct SorterScratch {
    fifo: VecDeque<usize>,

    /// Rays traversed so far.
    pub rays_sorted: usize,
    /// Queue pushes so far; one ray can land in several leaf queues.
    pub leaf_pushes: usize,
}

impl SorterScratch {
    /// Average number of leaf queues a ray lands in. Values well above one
    /// mean the tree's child boxes overlap badly for this scene.
    pub fn mean_leaves_per_ray(&self) -> f32 {
        if self.rays_sorted == 0 {
            return 0.0;
        }
        self.leaf_pushes as f32 / self.rays_sorted as f32
    }
}

impl Bvh {
    /// Drains `rays` and distributes every ray into the queues of all
    /// leaves whose subtree boxes it crosses. A ray can land in several
    /// queues; the primitive pass reconciles duplicates by keeping the
    /// globally nearest hit. Traversal order is unspecified.
    pub fn sort_rays_by_leaves(
        &self,
        rays: &mut RayQueue,
        sorted: &mut [RayQueue],
        scratch: &mut SorterScratch,
    ) {
        debug_assert!(sorted.len() == self.n_leaves());

        for ray in rays.drain(..) {
            let packet = Ray4::broadcast(&ray);

            debug_assert!(scratch.fifo.is_empty());
            scratch.fifo.push_back(0);
            while let Some(i) = scratch.fifo.pop_front() {
                match &self.nodes[i] {
                    BvhNode::Leaf { leaf: None } => {}
                    BvhNode::Leaf { leaf: Some(id) } => {
                        sorted[*id].push(ray);
                        scratch.leaf_pushes += 1;
                    }
                    BvhNode::Inner { child_boxes } => {
                        for j in hit_lanes(child_boxes.cast(&packet)) {
                            scratch.fifo.push_back(4 * i + j + 1);
                        }
                    }
                }
            }

            scratch.rays_sorted += 1;
        }
    }
}
