use nalgebra::Unit;
use simba::simd::{SimdPartialOrd as _, SimdValue, WideF32x4};

use crate::{
    geometry::{
        EPSILON_INTERSECT, EPSILON_PARALLEL, HitRecord, MaterialId, Ray, Ray4, SimdFloatType,
        WorldPoint4, WorldVector, WorldVector4, hit_lanes,
    },
    scene::Triangle,
};

/// Distance reported for lanes that miss.
pub(crate) const MISS: f32 = -1.0;

/// Dot product of two vector packets as an FMA chain. The intersection
/// kernel takes three of these per packet, so the fused form matters.
#[inline(always)]
pub(crate) fn packet_dot(a: &WorldVector4, b: &WorldVector4) -> SimdFloatType {
    WideF32x4(a.x.0.mul_add(b.x.0, a.y.0.mul_add(b.y.0, a.z.0 * b.z.0)))
}

/// Triangles stored as structure-of-arrays in groups of four: base vertex
/// `A` and the two edge vectors `U = B - A`, `V = C - A`, one packet entry
/// per lane. Shading data (normal, material) is kept per triangle.
///
/// The first triangle pushed into a fresh group is broadcast to all four
/// lanes; later pushes overwrite lanes 1..3. Lanes past `len` therefore hold
/// duplicates, which at worst re-report an existing hit.
#[derive(Clone, Debug, Default)]
pub struct TriangleCollection {
    a: Vec<WorldPoint4>,
    u: Vec<WorldVector4>,
    v: Vec<WorldVector4>,

    normals: Vec<Unit<WorldVector>>,
    materials: Vec<MaterialId>,
}

impl TriangleCollection {
    pub fn len(&self) -> usize {
        self.normals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normals.is_empty()
    }

    pub fn n_packets(&self) -> usize {
        self.a.len()
    }

    pub fn push(&mut self, triangle: &Triangle) {
        let u = triangle.b - triangle.a;
        let v = triangle.c - triangle.a;

        let lane = self.len() % 4;
        if lane == 0 {
            self.a.push(WorldPoint4::splat(triangle.a));
            self.u.push(WorldVector4::splat(u));
            self.v.push(WorldVector4::splat(v));
        } else {
            let last = self.a.len() - 1;
            self.a[last].replace(lane, triangle.a);
            self.u[last].replace(lane, u);
            self.v[last].replace(lane, v);
        }

        self.normals.push(triangle.normal());
        self.materials.push(triangle.material);
    }

    pub fn normal_at(&self, i: usize) -> Unit<WorldVector> {
        self.normals[i]
    }

    pub fn material_of(&self, i: usize) -> MaterialId {
        self.materials[i]
    }

    /// Möller–Trumbore for one broadcast ray against the four triangles of
    /// packet `k`. Returns per-lane hit distances, [`MISS`] where the lane
    /// missed. Rays parallel to the triangle plane are rejected by the
    /// determinant threshold; division by a tiny determinant may produce
    /// infinities, which the barycentric range masks discard.
    pub fn packet_intersect(&self, ray: &Ray4, k: usize) -> SimdFloatType {
        let a = &self.a[k];
        let u = &self.u[k];
        let v = &self.v[k];

        let h = ray.direction.cross(v);
        let det = packet_dot(u, &h);
        let inv_det = SimdFloatType::ONE / det;

        let s = &ray.origin.coords - &a.coords;
        let bary_u = inv_det * packet_dot(&s, &h);

        let q = s.cross(u);
        let bary_v = inv_det * packet_dot(&ray.direction, &q);
        let t = inv_det * packet_dot(v, &q);

        let eps_parallel = SimdFloatType::splat(EPSILON_PARALLEL);
        let not_parallel = det.simd_gt(eps_parallel) | det.simd_lt(-eps_parallel);

        let mask = not_parallel
            & bary_u.simd_gt(SimdFloatType::ZERO)
            & bary_u.simd_lt(SimdFloatType::ONE)
            & bary_v.simd_gt(SimdFloatType::ZERO)
            & (bary_u + bary_v).simd_lt(SimdFloatType::ONE)
            & t.simd_gt(SimdFloatType::splat(EPSILON_INTERSECT));

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
                    record.n = self.normal_at(i).into_inner();
                    record.v = ray.direction.into_inner();
                    record.material = self.material_of(i);
                    record.valid = true;
                }
            }
        }
    }
}
