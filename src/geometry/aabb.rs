use std::ops::Sub;

use nalgebra::{
    ClosedAddAssign, ClosedDivAssign, DefaultAllocator, DimName, OPoint, Point, Scalar, SimdPartialOrd,
    allocator::Allocator,
};
use num_traits::One;
use simba::simd::SimdValue;

/// Axis-aligned box spanned by two corner points, `min <= max` componentwise.
/// With a SIMD point type a single `Aabb` holds one box per lane.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aabb<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> Aabb<Point> {
    /// Builds a box from corners that are already ordered.
    pub fn new(min: Point, max: Point) -> Aabb<Point> {
        Aabb { min, max }
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> Aabb<Point2> {
        Aabb {
            min: f(&self.min),
            max: f(&self.max),
        }
    }

    pub fn zip_map<Point2, Point3, F: FnMut(&Point, &Point2) -> Point3>(
        &self,
        rhs: &Aabb<Point2>,
        mut f: F,
    ) -> Aabb<Point3> {
        Aabb {
            min: f(&self.min, &rhs.min),
            max: f(&self.max, &rhs.max),
        }
    }

    pub fn zip_apply<Point2, F: FnMut(&mut Point, &Point2)>(&mut self, rhs: &Aabb<Point2>, mut f: F) {
        f(&mut self.min, &rhs.min);
        f(&mut self.max, &rhs.max);
    }
}

impl<T: Scalar + SimdPartialOrd, D: DimName> Aabb<OPoint<T, D>>
where
    DefaultAllocator: Allocator<D>,
{
    /// Builds a box from two arbitrary corners, reordering them so that
    /// `min <= max` holds componentwise. Degenerate (point) boxes are legal.
    pub fn from_corners(a: OPoint<T, D>, b: OPoint<T, D>) -> Aabb<OPoint<T, D>> {
        Aabb {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// Smallest box containing both operands.
    pub fn union(&self, other: &Aabb<OPoint<T, D>>) -> Aabb<OPoint<T, D>> {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Extends the box so it contains `p`.
    pub fn grow(&mut self, p: &OPoint<T, D>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }
}

impl<T: Scalar, D: DimName> Aabb<OPoint<T, D>>
where
    DefaultAllocator: Allocator<D>,
{
    pub fn map_coords<T2: Scalar, F: FnMut(T) -> T2>(&self, mut f: F) -> Aabb<OPoint<T2, D>> {
        self.map(|x| x.map(&mut f))
    }

    pub fn zip_map_coords<T2: Scalar, T3: Scalar, F: FnMut(T, T2) -> T3>(
        &self,
        rhs: &Aabb<OPoint<T2, D>>,
        mut f: F,
    ) -> Aabb<OPoint<T3, D>> {
        self.zip_map(rhs, |x, y| OPoint {
            coords: x.coords.zip_map(&y.coords, &mut f),
        })
    }

    pub fn zip_apply_coords<T2: Scalar, F: FnMut(&mut T, T2)>(
        &mut self,
        rhs: &Aabb<OPoint<T2, D>>,
        mut f: F,
    ) {
        self.zip_apply(rhs, |x, y| x.coords.zip_apply(&y.coords, &mut f))
    }
}

impl<Point: Sub + Copy> Aabb<Point> {
    pub fn size(&self) -> Point::Output {
        self.max - self.min
    }
}

impl<T: Scalar + ClosedAddAssign + ClosedDivAssign + One, const D: usize> Aabb<Point<T, D>> {
    pub fn center(&self) -> Point<T, D> {
        let two = T::one() + T::one();
        let avg_coords = (&self.min.coords + &self.max.coords) / two;
        Point::from(avg_coords)
    }
}

impl<Point> From<(Point, Point)> for Aabb<Point> {
    fn from(value: (Point, Point)) -> Self {
        let (min, max) = value;
        Aabb { min, max }
    }
}

impl<T: SimdValue + Scalar, D: DimName> SimdValue for Aabb<OPoint<T, D>>
where
    T::Element: SimdValue + Scalar,
    DefaultAllocator: Allocator<D>,
{
    const LANES: usize = T::LANES;

    type Element = Aabb<OPoint<T::Element, D>>;

    type SimdBool = T::SimdBool;

    fn splat(val: Self::Element) -> Self {
        val.map_coords(|x| T::splat(x))
    }

    fn extract(&self, i: usize) -> Self::Element {
        self.map_coords(|x| x.extract(i))
    }

    unsafe fn extract_unchecked(&self, i: usize) -> Self::Element {
        unsafe { self.map_coords(|x| x.extract_unchecked(i)) }
    }

    fn replace(&mut self, i: usize, val: Self::Element) {
        self.zip_apply_coords(&val, |x, y| x.replace(i, y.clone()));
    }

    unsafe fn replace_unchecked(&mut self, i: usize, val: Self::Element) {
        unsafe {
            self.zip_apply_coords(&val, |x, y| x.replace_unchecked(i, y.clone()));
        }
    }

    fn select(self, cond: Self::SimdBool, other: Self) -> Self {
        self.zip_map_coords(&other, |x, y| x.select(cond, y.clone()))
    }
}
