use simba::simd::{SimdPartialOrd as _, SimdValue as _, WideBoolF32x4, WideF32x4};

use crate::geometry::{Ray, Ray4, SimdFloatType, SimdMaskType, WorldBox, WorldBox4};

pub trait RayIntersectionExt<R> {
    type Output;

    /// Casts a ray against the box (or box packet) using the slab test.
    fn cast(&self, ray: &R) -> Self::Output;
}

/// Replaces NaN lanes with `fill`. The simba surface has no `is_nan`, so
/// this reaches through to the wide type.
#[inline(always)]
fn nan_to(v: SimdFloatType, fill: f32) -> SimdFloatType {
    SimdFloatType::splat(fill).select(WideBoolF32x4(v.0.is_nan()), v)
}

/// Lane-wise minimum. NaN handling follows the underlying hardware min,
/// the caller has to filter NaNs beforehand.
#[inline(always)]
fn fast_min(a: SimdFloatType, b: SimdFloatType) -> SimdFloatType {
    WideF32x4(a.0.fast_min(b.0))
}

/// Lane-wise maximum, same NaN caveat as [`fast_min`].
#[inline(always)]
fn fast_max(a: SimdFloatType, b: SimdFloatType) -> SimdFloatType {
    WideF32x4(a.0.fast_max(b.0))
}

impl RayIntersectionExt<Ray> for WorldBox {
    type Output = bool;

    /// Slab test for a single ray against a single box. An intersection
    /// counts only when some part of it lies in front of the origin.
    ///
    /// Division by a zero direction component produces infinities; NaN
    /// (origin sitting exactly on a slab plane of an axis the ray is
    /// parallel to) is filtered so the axis imposes no constraint.
    fn cast(&self, ray: &Ray) -> bool {
        let l1 = (self.min - ray.origin).component_div(ray.direction.as_ref());
        let l2 = (self.max - ray.origin).component_div(ray.direction.as_ref());

        let exit = l1.zip_map(&l2, |a, b| {
            a.min(f32::INFINITY).max(b.min(f32::INFINITY))
        });
        let enter = l1.zip_map(&l2, |a, b| {
            a.max(f32::NEG_INFINITY).min(b.max(f32::NEG_INFINITY))
        });

        let t_max = exit.x.min(exit.y).min(exit.z);
        let t_min = enter.x.max(enter.y).max(enter.z);

        t_max >= 0.0 && t_max >= t_min
    }
}

impl RayIntersectionExt<Ray4> for WorldBox4 {
    type Output = SimdMaskType;

    /// One broadcast ray against four boxes at once. Lane `j` of the mask is
    /// set iff `t_min[j] <= t_max[j]`; ties count as hits.
    ///
    /// Deliberately no `t_max >= 0` filter here: boxes entirely behind the
    /// origin still report a hit. Culling by distance belongs to the
    /// primitive kernels, which know `t`.
    fn cast(&self, ray: &Ray4) -> SimdMaskType {
        let to_box_min = (&self.min.coords - &ray.origin.coords)
            .component_div(&ray.direction)
            .map(|x| nan_to(x, f32::NEG_INFINITY));
        let to_box_max = (&self.max.coords - &ray.origin.coords)
            .component_div(&ray.direction)
            .map(|x| nan_to(x, f32::INFINITY));

        let componentwise_min = to_box_min.zip_map(&to_box_max, |a, b| fast_min(a, b));
        let componentwise_max = to_box_min.zip_map(&to_box_max, |a, b| fast_max(a, b));

        let t_min = fast_max(
            componentwise_min.x,
            fast_max(componentwise_min.y, componentwise_min.z),
        );
        let t_max = fast_min(
            componentwise_max.x,
            fast_min(componentwise_max.y, componentwise_max.z),
        );

        t_min.simd_le(t_max)
    }
}

#[cfg(test)]
mod tests {
    use assert2::assert;
    use proptest::prelude::{ProptestConfig, Strategy};
    use simba::simd::SimdValue;
    use test_case::{test_case, test_matrix};
    use test_strategy::proptest;

    use super::*;
    use crate::geometry::{WorldPoint, WorldVector};

    fn unit_box() -> WorldBox {
        WorldBox::from_corners([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into())
    }

    /// Scalar reference without the `t_max >= 0` filter, the semantics the
    /// packet cast implements.
    fn cast_unfiltered(b: &WorldBox, ray: &Ray) -> bool {
        let l1 = (b.min - ray.origin).component_div(ray.direction.as_ref());
        let l2 = (b.max - ray.origin).component_div(ray.direction.as_ref());
        let exit = l1.zip_map(&l2, |a, b| a.min(f32::INFINITY).max(b.min(f32::INFINITY)));
        let enter = l1.zip_map(&l2, |a, b| a.max(f32::NEG_INFINITY).min(b.max(f32::NEG_INFINITY)));
        enter.x.max(enter.y).max(enter.z) <= exit.x.min(exit.y).min(exit.z)
    }

    /// Checks cases when the ray hits the box, including some corner cases.
    #[test_matrix(
        [5.0, 7.0, 10.0],
        [5.0, 7.0, 10.0],
        [5.0, 7.0, 10.0],
        [-1.0, 0.0, 2.0],
        [-1.0, 0.0, 2.0],
        [-1.0, 0.0, 2.0]
    )]
    fn hit_from_surface_point(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32) {
        if dx == 0.0 && dy == 0.0 && dz == 0.0 {
            return;
        }

        // The origin lies on or inside the box, so the ray must always hit.
        let r = Ray::new(WorldPoint::new(px, py, pz), WorldVector::new(dx, dy, dz));
        assert!(unit_box().cast(&r));
    }

    #[test]
    fn origin_strictly_inside_always_hits() {
        let b = unit_box();
        for d in [
            WorldVector::new(1.0, 0.0, 0.0),
            WorldVector::new(-1.0, 2.0, 0.5),
            WorldVector::new(0.0, 0.0, -1.0),
        ] {
            let r = Ray::new(WorldPoint::new(7.0, 8.0, 6.0), d);
            assert!(b.cast(&r));
        }
    }

    /// Rays that lie parallel to one axis and start outside the corresponding
    /// slab must miss, even if they move toward the box on other axes.
    #[test_case( 0.0,  7.0,  7.0,   0.0, 1.0, 0.0 ; "low_x_parallel_miss")]
    #[test_case(12.0,  7.0,  7.0,   0.0, 1.0, 0.0 ; "high_x_parallel_miss")]
    #[test_case( 7.0,  0.0,  7.0,   1.0, 0.0, 0.0 ; "low_y_parallel_miss")]
    #[test_case( 7.0, 12.0,  7.0,   1.0, 0.0, 0.0 ; "high_y_parallel_miss")]
    #[test_case( 7.0,  7.0,  0.0,   1.0, 0.0, 0.0 ; "low_z_parallel_miss")]
    #[test_case( 7.0,  7.0, 12.0,   1.0, 0.0, 0.0 ; "high_z_parallel_miss")]
    #[test_case( 0.0,  5.0,  7.0,   1.0, 0.0, 1.0 ; "corner_miss")]
    #[test_case( 0.0,  0.0,  0.0,  -1.0, 1.0, 1.0 ; "corner_miss2")]
    fn only_misses(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32) {
        let r = Ray::new(WorldPoint::new(px, py, pz), WorldVector::new(dx, dy, dz));
        assert!(!unit_box().cast(&r));
    }

    #[test]
    fn box_behind_origin_misses_scalar() {
        let r = Ray::new(WorldPoint::new(20.0, 7.0, 7.0), WorldVector::new(1.0, 0.0, 0.0));
        assert!(!unit_box().cast(&r));
    }

    /// The packet cast keeps boxes entirely behind the origin: the sole
    /// difference from the scalar test is the missing `t_max >= 0` filter.
    #[test]
    fn box_behind_origin_hits_packet() {
        let r = Ray::new(WorldPoint::new(20.0, 7.0, 7.0), WorldVector::new(1.0, 0.0, 0.0));
        assert!(!unit_box().cast(&r));

        let packet = WorldBox4::splat(unit_box());
        let mask = packet.cast(&Ray4::broadcast(&r));
        for i in 0..4 {
            assert!(mask.extract(i));
        }
    }

    fn test_boxes() -> [WorldBox; 4] {
        [
            WorldBox::from_corners([-8.0, -8.0, -8.0].into(), [-4.0, -4.0, -4.0].into()),
            WorldBox::from_corners([-2.0, -2.0, -2.0].into(), [1.0, 1.0, 1.0].into()),
            WorldBox::from_corners([3.0, -1.0, -1.0].into(), [5.0, 6.0, 2.0].into()),
            WorldBox::from_corners([7.0, 7.0, 7.0].into(), [9.0, 8.0, 11.0].into()),
        ]
    }

    fn ray_strategy() -> impl Strategy<Value = Ray> {
        (
            proptest::array::uniform3(-12.0f32..12.0),
            proptest::array::uniform3(-1.0f32..1.0),
        )
            .prop_filter_map("zero direction", |(o, d)| {
                let d = WorldVector::from(d);
                (d.norm() > 1e-3).then(|| Ray::new(WorldPoint::from(o), d))
            })
    }

    /// The packet mask must equal four independent unfiltered scalar tests.
    #[proptest(ProptestConfig::with_cases(10000))]
    fn packet_matches_scalar_reference(#[strategy(ray_strategy())] ray: Ray) {
        let boxes = test_boxes();
        let mut packet = WorldBox4::default();
        for (i, b) in boxes.iter().enumerate() {
            packet.replace(i, b.clone());
        }

        let mask = packet.cast(&Ray4::broadcast(&ray));
        for (i, b) in boxes.iter().enumerate() {
            assert!(mask.extract(i) == cast_unfiltered(b, &ray));
        }
    }
}
