use rand::{SeedableRng as _, rngs::SmallRng};

use crate::{
    geometry::{ContribId, EPSILON_ORIGIN_PUSH, Ray},
    scene::{
        Scene,
        bvh::{RayQueue, SorterScratch},
    },
};

use super::{ContributionRecord, RenderSettings};

/// Traces the whole image and returns the contribution buffer.
///
/// `camera_ray(pixel_i, pixel_j, sample_k)` supplies the primary rays. Each
/// generation sorts the live rays into per-leaf queues, intersects them
/// against the leaf primitives, then shades every still-open sample and
/// queues its scatter ray for the next generation. The loop stops when no
/// rays remain or the bounce cap is reached.
pub fn render<F>(
    scene: &Scene,
    mut camera_ray: F,
    settings: &RenderSettings,
) -> Vec<ContributionRecord>
where
    F: FnMut(u32, u32, u32) -> Ray,
{
    let width = settings.width.get();
    let height = settings.height.get();
    let spp = settings.samples_per_pixel.get();

    let n_samples = width as usize * height as usize * spp as usize;
    let mut contributions = vec![ContributionRecord::default(); n_samples];

    let mut rays: RayQueue = Vec::with_capacity(n_samples);
    for pixel_i in 0..height {
        for pixel_j in 0..width {
            for sample_k in 0..spp {
                let slot = (pixel_i * width + pixel_j) * spp + sample_k;
                rays.push(camera_ray(pixel_i, pixel_j, sample_k).with_contrib(slot as ContribId));
            }
        }
    }

    let mut next_rays: RayQueue = Vec::with_capacity(rays.len());
    let mut sorted = vec![RayQueue::new(); scene.bvh().n_leaves()];
    let mut scratch = SorterScratch::default();

    let mut generation = 0;
    while !rays.is_empty() && generation < settings.max_bounces {
        scene
            .bvh()
            .sort_rays_by_leaves(&mut rays, &mut sorted, &mut scratch);
        intersect_sorted(scene, &mut sorted, &mut contributions);
        shade_and_regenerate(
            scene,
            &mut contributions,
            &mut next_rays,
            settings.seed,
            generation,
        );

        std::mem::swap(&mut rays, &mut next_rays);
        generation += 1;
    }

    contributions
}

/// Intersects every sorted ray against all collections of its leaf. After
/// this pass every leaf queue is empty again and each contribution record
/// holds the nearest hit across all leaves its ray visited.
fn intersect_sorted(
    scene: &Scene,
    sorted: &mut [RayQueue],
    contributions: &mut [ContributionRecord],
) {
    for (leaf_id, queue) in sorted.iter_mut().enumerate() {
        if queue.is_empty() {
            continue;
        }

        let list = scene.bvh().leaf_primitives(leaf_id);
        for ray in queue.drain(..) {
            let record = &mut contributions[ray.contrib as usize].hit;
            for collection in list.iter() {
                collection.intersect(&ray, record);
            }
        }
    }
}

/// Shades every open sample and queues its scatter ray. Samples whose ray
/// escaped, or whose material absorbed it, are frozen. Running this again on
/// a frozen sample is a no-op.
fn shade_and_regenerate(
    scene: &Scene,
    contributions: &mut [ContributionRecord],
    next_rays: &mut RayQueue,
    seed: u64,
    generation: u32,
) {
    for (slot, contrib) in contributions.iter_mut().enumerate() {
        if contrib.done {
            continue;
        }

        if contrib.hit.valid {
            let material = scene.material(contrib.hit.material);
            let emit = material.emittance(&contrib.hit);
            let att = material.attenuation(&contrib.hit);

            contrib.colour += contrib.albedo.component_mul(&emit);
            contrib.albedo = contrib.albedo.component_mul(&att);

            let mut rng = sample_rng(seed, slot, generation);
            match material.scatter(&contrib.hit, &mut rng) {
                Some(scatter) => {
                    // Reuse the record for the scatter ray.
                    contrib.hit.valid = false;
                    next_rays.push(
                        scatter
                            .advance_by(EPSILON_ORIGIN_PUSH)
                            .with_contrib(slot as ContribId),
                    );
                }
                None => contrib.done = true,
            }
        } else {
            // The ray escaped the scene, the environment contributes nothing.
            contrib.done = true;
        }
    }
}

/// Deterministic stream per (sample, generation), independent of tracing
/// order.
fn sample_rng(seed: u64, slot: usize, generation: u32) -> SmallRng {
    let stream = seed
        .wrapping_add((slot as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(u64::from(generation).wrapping_mul(0xD1B5_4A32_D192_ED03));
    SmallRng::seed_from_u64(stream)
}

#[cfg(test)]
mod tests {
    use assert2::assert;

    use super::*;
    use crate::{
        geometry::{Colour, EPSILON_INTERSECT, HitRecord, WorldPoint, WorldVector},
        material::{Lambertian, Light, Material},
        scene::{Primitive, Triangle, collect_primitives},
        texture::Constant,
    };
    use std::num::NonZeroU32;

    fn nz(v: u32) -> NonZeroU32 {
        NonZeroU32::new(v).unwrap()
    }

    fn settings(width: u32, height: u32, spp: u32, max_bounces: u32) -> RenderSettings {
        RenderSettings {
            width: nz(width),
            height: nz(height),
            samples_per_pixel: nz(spp),
            max_bounces,
            seed: 42,
        }
    }

    /// Two triangles forming the quad `[x0, x1] x [y0, y1]` at `z`.
    fn quad_z(x0: f32, x1: f32, y0: f32, y1: f32, z: f32, material: u32) -> [Primitive; 2] {
        [
            Primitive::from(Triangle::new(
                [x0, y0, z].into(),
                [x1, y0, z].into(),
                [x1, y1, z].into(),
                material,
            )),
            Primitive::from(Triangle::new(
                [x0, y0, z].into(),
                [x1, y1, z].into(),
                [x0, y1, z].into(),
                material,
            )),
        ]
    }

    fn downward_ray(pixel_i: u32, pixel_j: u32, _sample_k: u32) -> Ray {
        // One parallel ray per pixel over a unit grid, pointing down -z.
        Ray::new(
            WorldPoint::new(pixel_j as f32 * 0.1, pixel_i as f32 * 0.1, 5.0),
            -WorldVector::z(),
        )
    }

    #[test]
    fn empty_scene_renders_black_and_terminates_immediately() {
        let scene = Scene::new(Vec::new(), Vec::new(), 16, 8);
        let records = render(&scene, downward_ray, &settings(10, 10, 4, 10));

        assert!(records.len() == 400);
        for record in &records {
            assert!(record.done);
            assert!(record.colour == Colour::zeros());
        }
    }

    #[test]
    fn emissive_surface_contributes_exactly_its_radiance() {
        // An emitter spanning half the pixel grid; one bounce suffices. The
        // bounds keep every grid ray away from the quad's diagonal seam.
        let primitives = quad_z(-0.07, 0.43, -0.05, 1.05, 0.0, 0).to_vec();
        let materials: Vec<Box<dyn Material>> = vec![Box::new(Light::new(Constant::new(
            Colour::new(3.0, 3.0, 3.0),
        )))];
        let scene = Scene::new(primitives, materials, 16, 8);

        let records = render(&scene, downward_ray, &settings(10, 10, 1, 10));

        for (slot, record) in records.iter().enumerate() {
            let pixel_j = slot % 10;
            assert!(record.done);
            if pixel_j <= 4 {
                // Pixels at x = 0.0 .. 0.4 see the emitter.
                assert!(record.colour == Colour::new(3.0, 3.0, 3.0));
            } else {
                assert!(record.colour == Colour::zeros());
            }
        }
    }

    #[test]
    fn bounce_cap_freezes_gathered_colour() {
        // A mirror-less diffuse floor keeps scattering; cap at one bounce.
        let primitives = quad_z(-10.0, 10.0, -10.0, 10.0, 0.0, 0).to_vec();
        let materials: Vec<Box<dyn Material>> = vec![Box::new(Lambertian::new(Constant::new(
            Colour::new(0.5, 0.5, 0.5),
        )))];
        let scene = Scene::new(primitives, materials, 16, 8);

        let records = render(&scene, downward_ray, &settings(4, 4, 2, 1));

        for record in &records {
            // One generation ran; the samples are still open but keep their
            // (zero) gathered colour and halved throughput.
            assert!(!record.done);
            assert!(record.colour == Colour::zeros());
            assert!(record.albedo == Colour::new(0.5, 0.5, 0.5));
        }
    }

    #[test]
    fn shading_a_frozen_sample_is_a_no_op() {
        let primitives = quad_z(-1.0, 1.0, -1.0, 1.0, 0.0, 0).to_vec();
        let materials: Vec<Box<dyn Material>> =
            vec![Box::new(Lambertian::new(Constant::new(Colour::repeat(0.5))))];
        let scene = Scene::new(primitives, materials, 16, 8);

        let mut contributions = vec![ContributionRecord {
            colour: Colour::new(1.0, 2.0, 3.0),
            albedo: Colour::repeat(0.25),
            hit: HitRecord {
                valid: true,
                material: 0,
                ..HitRecord::default()
            },
            done: true,
        }];

        let mut next_rays = RayQueue::new();
        shade_and_regenerate(&scene, &mut contributions, &mut next_rays, 1, 0);
        shade_and_regenerate(&scene, &mut contributions, &mut next_rays, 1, 1);

        assert!(next_rays.is_empty());
        assert!(contributions[0].colour == Colour::new(1.0, 2.0, 3.0));
        assert!(contributions[0].albedo == Colour::repeat(0.25));
        assert!(contributions[0].hit.valid);
    }

    #[test]
    fn scatter_rays_never_reintersect_their_surface() {
        // A Lambertian plane at y = 0; scatter rays leave upward and must
        // never record a hit in the epsilon shell of the surface they left.
        let plane = [
            Primitive::from(Triangle::new(
                [-100.0, 0.0, -100.0].into(),
                [100.0, 0.0, 100.0].into(),
                [100.0, 0.0, -100.0].into(),
                0,
            )),
            Primitive::from(Triangle::new(
                [-100.0, 0.0, -100.0].into(),
                [-100.0, 0.0, 100.0].into(),
                [100.0, 0.0, 100.0].into(),
                0,
            )),
        ];
        let collections = collect_primitives(plane.iter());
        let lambertian = Lambertian::new(Constant::new(Colour::repeat(0.5)));

        for stream in 0..200u64 {
            // Hit the plane from above, somewhere off-center.
            let origin = WorldPoint::new(stream as f32 * 0.37 - 30.0, 4.0, 1.3);
            let down = Ray::new(origin, WorldVector::new(0.1, -1.0, 0.05));

            let mut hit = HitRecord::default();
            for collection in collections.iter() {
                collection.intersect(&down, &mut hit);
            }
            assert!(hit.valid);

            let mut rng = sample_rng(7, stream as usize, 0);
            let scatter = lambertian
                .scatter(&hit, &mut rng)
                .expect("lambertian always scatters")
                .advance_by(EPSILON_ORIGIN_PUSH);

            let mut requeue_hit = HitRecord::default();
            for collection in collections.iter() {
                collection.intersect(&scatter, &mut requeue_hit);
            }
            assert!(!requeue_hit.valid || requeue_hit.t > EPSILON_INTERSECT);
        }
    }

    #[test]
    fn same_seed_renders_identical_buffers() {
        let mut primitives = quad_z(-2.0, 2.0, -2.0, 2.0, 0.0, 0).to_vec();
        primitives.extend(quad_z(-0.5, 0.5, -0.5, 0.5, 3.0, 1));
        let materials: Vec<Box<dyn Material>> = vec![
            Box::new(Lambertian::new(Constant::new(Colour::new(0.7, 0.6, 0.5)))),
            Box::new(Light::new(Constant::new(Colour::repeat(4.0)))),
        ];
        let scene = Scene::new(primitives, materials, 16, 4);

        let s = settings(8, 8, 4, 6);
        let a = render(&scene, downward_ray, &s);
        let b = render(&scene, downward_ray, &s);

        assert!(a.len() == b.len());
        for (ra, rb) in a.iter().zip(&b) {
            assert!(ra.colour.map(f32::to_bits) == rb.colour.map(f32::to_bits));
            assert!(ra.albedo.map(f32::to_bits) == rb.albedo.map(f32::to_bits));
            assert!(ra.done == rb.done);
        }
    }

    #[test]
    fn cornell_box_is_bright_with_coloured_wall_bleed() {
        use crate::{Camera, Mesh, geometry::ScreenSize};
        use rand::{SeedableRng as _, rngs::SmallRng};

        let materials: Vec<Box<dyn Material>> = vec![
            Box::new(Lambertian::new(Constant::new(Colour::new(0.75, 0.75, 0.75)))),
            Box::new(Lambertian::new(Constant::new(Colour::new(0.75, 0.25, 0.25)))),
            Box::new(Lambertian::new(Constant::new(Colour::new(0.25, 0.25, 0.75)))),
            Box::new(Light::new(Constant::new(Colour::new(3.0, 3.0, 3.0)))),
        ];
        let room = Mesh::cornell_box(0, 1, 2, 3);
        let scene = Scene::new(room.into_primitives(), materials, 16, 8);

        let size = 24u32;
        let camera = Camera::builder()
            .center(WorldPoint::new(0.5, 0.5, 0.8))
            .forward(WorldVector::new(0.0, 0.0, -1.0))
            .up(WorldVector::new(0.0, 1.0, 0.0))
            .resolution(ScreenSize::new(size, size))
            .fov(45f32.to_radians())
            .viewport_distance(0.8 + 1e-4)
            .build();

        let s = settings(size, size, 8, 10);
        let mut rng = SmallRng::seed_from_u64(s.seed);
        let records = render(
            &scene,
            |i, j, k| camera.sample_ray(i, j, k, &mut rng),
            &s,
        );

        let spp = s.samples_per_pixel.get();
        let pixel_mean = |i: u32, j: u32| {
            let base = ((i * size + j) * spp) as usize;
            records[base..base + spp as usize]
                .iter()
                .map(|r| r.colour)
                .sum::<Colour>()
                / spp as f32
        };

        // The lit room is not mostly black.
        let mut total = Colour::zeros();
        for i in 0..size {
            for j in 0..size {
                total += pixel_mean(i, j);
            }
        }
        let mean = total / (size * size) as f32;
        assert!(mean.norm() > 0.05);

        // Red bleeds into the leftmost column, blue into the rightmost.
        let mut left = Colour::zeros();
        let mut right = Colour::zeros();
        for i in 0..size {
            left += pixel_mean(i, 0);
            right += pixel_mean(i, size - 1);
        }
        assert!(left.x > left.z);
        assert!(right.z > right.x);
    }

    #[test]
    fn quadrupling_samples_shrinks_pixel_noise() {
        // Identical geometry under every pixel: a diffuse floor lit by a
        // small patch overhead. Per-pixel means are then iid estimates and
        // their variance across pixels must scale like 1 / samples.
        let mut primitives = quad_z(-50.0, 50.0, -50.0, 50.0, 0.0, 0).to_vec();
        primitives.extend(quad_z(-0.6, 2.2, -0.6, 2.2, 4.0, 1));
        let materials: Vec<Box<dyn Material>> = vec![
            Box::new(Lambertian::new(Constant::new(Colour::repeat(0.75)))),
            Box::new(Light::new(Constant::new(Colour::repeat(5.0)))),
        ];
        let scene = Scene::new(primitives, materials, 16, 8);

        // Start below the light so the first hit is always the floor.
        let camera = |pixel_i: u32, pixel_j: u32, _k: u32| {
            Ray::new(
                WorldPoint::new(pixel_j as f32 * 0.1, pixel_i as f32 * 0.1, 2.0),
                -WorldVector::z(),
            )
        };

        let variance_of_pixel_means = |spp: u32| {
            let s = settings(16, 16, spp, 4);
            let records = render(&scene, camera, &s);

            let pixels: u32 = 16 * 16;
            let means: Vec<f32> = (0..pixels)
                .map(|p| {
                    (0..spp)
                        .map(|k| records[(p * spp + k) as usize].colour.x)
                        .sum::<f32>()
                        / spp as f32
                })
                .collect();
            let grand = means.iter().sum::<f32>() / pixels as f32;
            means.iter().map(|m| (m - grand).powi(2)).sum::<f32>() / (pixels - 1) as f32
        };

        let coarse = variance_of_pixel_means(4);
        let fine = variance_of_pixel_means(16);

        assert!(coarse > 0.0);
        assert!(fine > 0.0);
        let ratio = coarse / fine;
        // Expected ratio is 4; allow a generous statistical band.
        assert!(ratio > 2.0 && ratio < 8.0, "ratio = {ratio}");
    }
}
