use nalgebra::Unit;
use simba::simd::{SimdComplexField as _, SimdPartialOrd as _, SimdValue};

use crate::{
    geometry::{
        EPSILON_INTERSECT, HitRecord, MaterialId, Ray, Ray4, SimdFloatType, WorldPoint,
        WorldPoint4, WorldVector, hit_lanes,
    },
    scene::Sphere,
};

use super::triangles::MISS;

/// Spheres stored as structure-of-arrays in groups of four: packed centres
/// and radii per lane, material ids per sphere. Push semantics match
/// [`super::TriangleCollection`]: a fresh group starts as four broadcast
/// copies of its first sphere.
#[derive(Clone, Debug, Default)]
pub struct SphereCollection {
    centers: Vec<WorldPoint4>,
    radii: Vec<SimdFloatType>,

    materials: Vec<MaterialId>,
}

impl SphereCollection {
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn n_packets(&self) -> usize {
        self.centers.len()
    }

    pub fn push(&mut self, sphere: &Sphere) {
        let lane = self.len() % 4;
        if lane == 0 {
            self.centers.push(WorldPoint4::splat(sphere.center));
            self.radii.push(SimdFloatType::splat(sphere.radius));
        } else {
            let last = self.centers.len() - 1;
            self.centers[last].replace(lane, sphere.center);
            self.radii[last].replace(lane, sphere.radius);
        }

        self.materials.push(sphere.material);
    }

    pub fn center_of(&self, i: usize) -> WorldPoint {
        self.centers[i / 4].extract(i % 4)
    }

    pub fn normal_at(&self, i: usize, p: &WorldPoint) -> Unit<WorldVector> {
        Unit::new_normalize(p - self.center_of(i))
    }

    pub fn material_of(&self, i: usize) -> MaterialId {
        self.materials[i]
    }

    /// Solves `a t^2 + 2 b t + c = 0` for one broadcast ray against the four
    /// spheres of packet `k` and returns the smaller root above the
    /// intersection epsilon, the larger one if the origin is inside, or
    /// [`MISS`]. Negative discriminants yield NaN in the square root, which
    /// every comparison rejects.
    pub fn packet_intersect(&self, ray: &Ray4, k: usize) -> SimdFloatType {
        let oc = &ray.origin.coords - &self.centers[k].coords;
        let r = self.radii[k];

        let a = ray.direction.dot(&ray.direction);
        let b = oc.dot(&ray.direction);
        let c = oc.dot(&oc) - r * r;

        let discriminant = b * b - a * c;
        let sqrt_d = discriminant.simd_sqrt();

        let eps = SimdFloatType::splat(EPSILON_INTERSECT);
        let near = (-b - sqrt_d) / a;
        let far = (-b + sqrt_d) / a;
        let t = near.select(near.simd_gt(eps), far);

        let mask = discriminant.simd_ge(SimdFloatType::ZERO) & t.simd_gt(eps);
        t.select(mask, SimdFloatType::splat(MISS))
    }

    /// Folds the closest hit over all packets into `record`, which may
    /// already hold a hit from another collection.
    pub fn intersect(&self, ray: &Ray, record: &mut HitRecord) {
        let packet_ray = Ray4::broadcast(ray);

        for k in 0..self.n_packets() {
            let t = self.packet_intersect(&packet_ray, k);

            for lane in hit_lanes(t.simd_gt(SimdFloatType::ZERO)) {
                let i = k * 4 + lane;
                if i >= self.len() {
                    continue;
                }

                let t_lane = t.extract(lane);
                if record.closer_than(t_lane) {
                    record.t = t_lane;
                    record.p = ray.point_at(t_lane);
                    record.n = self.normal_at(i, &record.p).into_inner();
                    record.v = ray.direction.into_inner();
                    record.material = self.material_of(i);
                    record.valid = true;
                }
            }
        }
    }
}
