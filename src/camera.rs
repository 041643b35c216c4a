use assert2::assert;
use bon::bon;
use nalgebra::Unit;
use rand::Rng;

use crate::geometry::{FloatType, Ray, ScreenSize, WorldPoint, WorldVector};

/// Error tolerance for the orientation frame construction.
const EPSILON: FloatType = 1e-6;

/// Pinhole camera building jittered primary rays through a viewport plane.
#[derive(Copy, Clone, Debug)]
pub struct Camera {
    center: WorldPoint,

    resolution: ScreenSize,

    view: Unit<WorldVector>,
    up: Unit<WorldVector>,
    right: Unit<WorldVector>,

    /// Vertical field of view in radians.
    fov: FloatType,
    /// Distance from the center to the viewport plane; the ray origin sits
    /// on the viewport rather than at the center.
    viewport_distance: FloatType,
}

#[bon]
impl Camera {
    #[builder]
    pub fn new(
        center: WorldPoint,
        forward: WorldVector,
        up: WorldVector,
        resolution: ScreenSize,
        fov: FloatType,
        #[builder(default = 0.0)] viewport_distance: FloatType,
    ) -> Self {
        let view = Unit::try_new(forward, EPSILON).expect("Forward vector must be non-zero");
        let up = Unit::try_new(up, EPSILON).expect("Up vector must be non-zero");
        let right = Unit::try_new(view.cross(&up), EPSILON)
            .expect("`up` and `forward` must be linearly independent");
        let up = Unit::new_normalize(right.cross(&view));

        assert!(resolution.x > 0);
        assert!(resolution.y > 0);
        assert!(fov > 0.0);
        assert!(fov < std::f32::consts::PI);

        Camera {
            center,
            resolution,
            view,
            up,
            right,
            fov,
            viewport_distance,
        }
    }
}

impl Camera {
    /// Camera at `center` oriented toward `target`.
    pub fn look_at(
        center: WorldPoint,
        target: WorldPoint,
        up: WorldVector,
        resolution: ScreenSize,
        fov: FloatType,
    ) -> Camera {
        Camera::builder()
            .center(center)
            .forward(target - center)
            .up(up)
            .resolution(resolution)
            .fov(fov)
            .build()
    }

    pub fn resolution(&self) -> ScreenSize {
        self.resolution
    }

    /// Builds the ray for sample `sample_k` of pixel `(pixel_i, pixel_j)`
    /// (row, column). Samples are stratified on a 2x2 sub-pixel grid with a
    /// noise term on top.
    pub fn sample_ray(
        &self,
        pixel_i: u32,
        pixel_j: u32,
        sample_k: u32,
        rng: &mut impl Rng,
    ) -> Ray {
        let width = self.resolution.x as FloatType;
        let height = self.resolution.y as FloatType;

        let viewport_width = 2.0 * (0.5 * self.fov).tan();
        let viewport_height = viewport_width * height / width;

        let sub_i = sample_k / 2 % 2;
        let sub_j = sample_k % 2;
        let su = ((pixel_i * 2 + sub_i) as FloatType + rng.random::<FloatType>()) / (2.0 * height)
            - 0.5;
        let sv = ((pixel_j * 2 + sub_j) as FloatType + rng.random::<FloatType>()) / (2.0 * width)
            - 0.5;

        self.ray_from_uv(su * viewport_height, sv * viewport_width)
    }

    /// Ray through the viewport position `(u, v)`, `u` down and `v` right,
    /// both zero at the image center.
    fn ray_from_uv(&self, u: FloatType, v: FloatType) -> Ray {
        let pixel_offset =
            self.view.as_ref() + self.right.as_ref() * v - self.up.as_ref() * u;
        Ray::new(
            self.center + pixel_offset * self.viewport_distance,
            pixel_offset,
        )
    }
}
