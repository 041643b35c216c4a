mod aabb;
mod ray_box_intersection;

use nalgebra::{Point3, Unit, Vector3};
use simba::simd::SimdValue;

pub use aabb::Aabb;
pub use ray_box_intersection::RayIntersectionExt;

pub type FloatType = f32;
pub type SimdFloatType = simba::simd::WideF32x4;
pub type SimdMaskType = simba::simd::WideBoolF32x4;

/// Minimum accepted distance along a ray for a primitive hit.
/// Rejects self-intersections right at the surface a scatter ray leaves.
pub const EPSILON_INTERSECT: FloatType = 1e-3;

/// Determinant threshold below which a ray counts as parallel to a triangle.
pub const EPSILON_PARALLEL: FloatType = 1e-4;

/// Offset applied along the direction of a freshly scattered ray.
pub const EPSILON_ORIGIN_PUSH: FloatType = 1e-4;

/// Indices of the set lanes of a packet mask, in ascending order. Packet
/// kernels return one mask bit per lane; four lanes means a plain scan
/// beats bit tricks here.
pub fn hit_lanes(mask: SimdMaskType) -> impl Iterator<Item = usize> {
    let bits = mask.0.move_mask();
    (0..SimdFloatType::LANES).filter(move |lane| bits & (1 << lane) != 0)
}

pub type ScreenSize = nalgebra::Vector2<u32>;

pub type WorldPoint = Point3<FloatType>;
pub type WorldVector = Vector3<FloatType>;
pub type WorldBox = Aabb<WorldPoint>;
pub type WorldPoint4 = Point3<SimdFloatType>;
pub type WorldVector4 = Vector3<SimdFloatType>;
pub type WorldBox4 = Aabb<WorldPoint4>;

/// Linear RGB radiance / reflectance value.
pub type Colour = Vector3<FloatType>;

/// Index of a contribution slot in the render buffer.
pub type ContribId = u32;

/// Index into the scene's material arena.
pub type MaterialId = u32;

/// Ray going through the world. Only positive direction is considered to be on the ray.
#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: Unit<WorldVector>,

    /// Contribution slot this ray updates when it bounces or terminates.
    pub contrib: ContribId,
}

impl Ray {
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        Ray {
            origin,
            direction: Unit::new_normalize(direction),
            contrib: 0,
        }
    }

    pub fn with_contrib(mut self, contrib: ContribId) -> Ray {
        self.contrib = contrib;
        self
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction.as_ref() * distance
    }

    /// Moves the origin forward along the direction. Used to push scatter
    /// rays off the surface they just left.
    pub fn advance_by(&self, distance: FloatType) -> Ray {
        Ray {
            origin: self.point_at(distance),
            direction: self.direction,
            contrib: self.contrib,
        }
    }
}

/// One ray broadcast into all four lanes, the argument every
/// packet-versus-packet kernel takes.
#[derive(Copy, Clone, Debug)]
pub struct Ray4 {
    pub origin: WorldPoint4,
    pub direction: WorldVector4,
}

impl Ray4 {
    pub fn broadcast(ray: &Ray) -> Ray4 {
        Ray4 {
            origin: ray.origin.map(SimdFloatType::splat),
            direction: ray.direction.map(SimdFloatType::splat),
        }
    }
}

impl From<&Ray> for Ray4 {
    fn from(ray: &Ray) -> Ray4 {
        Ray4::broadcast(ray)
    }
}

/// Intersection of a ray and scene geometry.
#[derive(Copy, Clone, Debug)]
pub struct HitRecord {
    /// Distance along the ray
    pub t: FloatType,
    /// Point where the ray hit the geometry
    pub p: WorldPoint,
    /// Outward-facing unit normal at the hit point
    pub n: WorldVector,
    /// Direction of the incident ray
    pub v: WorldVector,
    pub valid: bool,
    pub material: MaterialId,
}

impl Default for HitRecord {
    fn default() -> Self {
        HitRecord {
            t: FloatType::INFINITY,
            p: WorldPoint::origin(),
            n: WorldVector::zeros(),
            v: WorldVector::zeros(),
            valid: false,
            material: 0,
        }
    }
}

impl HitRecord {
    /// Is `t` a hit closer than what this record currently holds?
    pub fn closer_than(&self, t: FloatType) -> bool {
        !self.valid || t < self.t
    }
}
