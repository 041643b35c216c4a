pub mod bvh;
pub mod spheres;
pub mod triangles;

use arrayvec::ArrayVec;
use nalgebra::Unit;

use crate::{
    geometry::{FloatType, HitRecord, MaterialId, Ray, WorldBox, WorldPoint, WorldVector},
    material::Material,
};

pub use bvh::Bvh;
pub use spheres::SphereCollection;
pub use triangles::TriangleCollection;

/// Triangle with counter-clockwise winding.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Triangle {
    pub a: WorldPoint,
    pub b: WorldPoint,
    pub c: WorldPoint,
    pub material: MaterialId,
}

impl Triangle {
    pub fn new(a: WorldPoint, b: WorldPoint, c: WorldPoint, material: MaterialId) -> Triangle {
        Triangle { a, b, c, material }
    }

    /// Geometric unit normal following the winding order.
    pub fn normal(&self) -> Unit<WorldVector> {
        Unit::new_normalize((self.b - self.a).cross(&(self.c - self.a)))
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sphere {
    pub center: WorldPoint,
    pub radius: FloatType,
    pub material: MaterialId,
}

impl Sphere {
    pub fn new(center: WorldPoint, radius: FloatType, material: MaterialId) -> Sphere {
        Sphere {
            center,
            radius,
            material,
        }
    }
}

/// The closed set of primitive kinds the engine can trace.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Primitive {
    Triangle(Triangle),
    Sphere(Sphere),
}

impl Primitive {
    /// Smallest axis-aligned box that completely contains the primitive.
    pub fn bound(&self) -> WorldBox {
        match self {
            Primitive::Triangle(t) => {
                let mut bb = WorldBox::from_corners(t.a, t.b);
                bb.grow(&t.c);
                bb
            }
            Primitive::Sphere(s) => {
                let r = WorldVector::repeat(s.radius);
                WorldBox::new(s.center - r, s.center + r)
            }
        }
    }
}

impl From<Triangle> for Primitive {
    fn from(t: Triangle) -> Primitive {
        Primitive::Triangle(t)
    }
}

impl From<Sphere> for Primitive {
    fn from(s: Sphere) -> Primitive {
        Primitive::Sphere(s)
    }
}

/// SoA storage for one primitive kind, tested four primitives per ray cast.
#[derive(Clone, Debug)]
pub enum PrimitiveCollection {
    Triangles(TriangleCollection),
    Spheres(SphereCollection),
}

impl PrimitiveCollection {
    /// Scans all packets and folds every hit closer than what `record`
    /// already holds into it. Scan order does not affect the result.
    pub fn intersect(&self, ray: &Ray, record: &mut HitRecord) {
        match self {
            PrimitiveCollection::Triangles(c) => c.intersect(ray, record),
            PrimitiveCollection::Spheres(c) => c.intersect(ray, record),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PrimitiveCollection::Triangles(c) => c.len(),
            PrimitiveCollection::Spheres(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-leaf collections, at most one per primitive kind.
pub type PrimitiveList = ArrayVec<PrimitiveCollection, 2>;

/// Packs a set of primitives into per-kind SoA collections.
pub fn collect_primitives<'a>(primitives: impl IntoIterator<Item = &'a Primitive>) -> PrimitiveList {
    let mut triangles = TriangleCollection::default();
    let mut spheres = SphereCollection::default();

    for primitive in primitives {
        match primitive {
            Primitive::Triangle(t) => triangles.push(t),
            Primitive::Sphere(s) => spheres.push(s),
        }
    }

    let mut list = PrimitiveList::new();
    if !triangles.is_empty() {
        list.push(PrimitiveCollection::Triangles(triangles));
    }
    if !spheres.is_empty() {
        list.push(PrimitiveCollection::Spheres(spheres));
    }
    list
}

/// Immutable scene: the acceleration structure over all primitives plus the
/// material arena hit records reference by id.
pub struct Scene {
    bvh: Bvh,
    materials: Vec<Box<dyn Material>>,
}

impl Scene {
    /// Builds the scene acceleration structure. An empty primitive list is
    /// legal and renders black.
    pub fn new(
        primitives: Vec<Primitive>,
        materials: Vec<Box<dyn Material>>,
        max_depth: usize,
        min_leaf_size: usize,
    ) -> Scene {
        Scene {
            bvh: Bvh::build(primitives, max_depth, min_leaf_size),
            materials,
        }
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn material(&self, id: MaterialId) -> &dyn Material {
        self.materials[id as usize].as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;

    #[test]
    fn triangle_bound_contains_all_corners() {
        let t = Triangle::new(
            [0.0, 0.0, 0.0].into(),
            [2.0, -1.0, 0.0].into(),
            [1.0, 3.0, -2.0].into(),
            0,
        );
        let bb = Primitive::from(t).bound();
        assert!(bb.min == WorldPoint::new(0.0, -1.0, -2.0));
        assert!(bb.max == WorldPoint::new(2.0, 3.0, 0.0));
    }

    #[test]
    fn sphere_bound_is_center_plus_minus_radius() {
        let s = Sphere::new([1.0, 2.0, 3.0].into(), 0.5, 0);
        let bb = Primitive::from(s).bound();
        assert!(bb.min == WorldPoint::new(0.5, 1.5, 2.5));
        assert!(bb.max == WorldPoint::new(1.5, 2.5, 3.5));
    }

    #[test]
    fn triangle_normal_follows_winding() {
        let t = Triangle::new(
            [0.0, 0.0, 0.0].into(),
            [1.0, 0.0, 0.0].into(),
            [0.0, 1.0, 0.0].into(),
            0,
        );
        assert!((t.normal().into_inner() - WorldVector::new(0.0, 0.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn collect_splits_by_kind() {
        let prims = vec![
            Primitive::from(Triangle::new(
                [0.0, 0.0, 0.0].into(),
                [1.0, 0.0, 0.0].into(),
                [0.0, 1.0, 0.0].into(),
                0,
            )),
            Primitive::from(Sphere::new([0.0, 0.0, 0.0].into(), 1.0, 1)),
            Primitive::from(Sphere::new([2.0, 0.0, 0.0].into(), 1.0, 1)),
        ];
        let list = collect_primitives(&prims);
        assert!(list.len() == 2);
        assert!(list.iter().map(PrimitiveCollection::len).sum::<usize>() == 3);
    }

    #[test]
    fn collect_skips_absent_kinds() {
        let prims = vec![Primitive::from(Sphere::new([0.0, 0.0, 0.0].into(), 1.0, 0))];
        let list = collect_primitives(&prims);
        assert!(list.len() == 1);
        assert!(matches!(list[0], PrimitiveCollection::Spheres(_)));
    }
}
