use std::num::NonZeroU32;

use indicatif::ProgressBar;
use rand::{SeedableRng as _, rngs::SmallRng};

use quadtrace::{
    Camera, Mesh, RenderSettings, Scene, framebuffer,
    geometry::{Colour, ScreenSize, WorldPoint, WorldVector},
    material::{Dielectric, Lambertian, Light, Material, Metallic},
    render,
    scene::{Primitive, Sphere},
    texture::Constant,
};

fn main() -> anyhow::Result<()> {
    let settings = RenderSettings {
        width: NonZeroU32::new(200).unwrap(),
        height: NonZeroU32::new(200).unwrap(),
        samples_per_pixel: NonZeroU32::new(32).unwrap(),
        max_bounces: 10,
        seed: 42,
    };

    let materials: Vec<Box<dyn Material>> = vec![
        Box::new(Lambertian::new(Constant::new(Colour::new(0.75, 0.75, 0.75)))),
        Box::new(Lambertian::new(Constant::new(Colour::new(0.75, 0.25, 0.25)))),
        Box::new(Lambertian::new(Constant::new(Colour::new(0.25, 0.25, 0.75)))),
        Box::new(Light::new(Constant::new(Colour::new(3.0, 3.0, 3.0)))),
        Box::new(Dielectric::new(Constant::new(Colour::repeat(1.0)), 1.5)),
        Box::new(Metallic::new(Constant::new(Colour::repeat(1.0)), 0.0)),
    ];
    let (white, red, blue, light, glass, mirror) = (0, 1, 2, 3, 4, 5);

    let mut room = Mesh::cornell_box(white, red, blue, light);
    room.extend(Mesh::parallelepiped(
        WorldPoint::new(0.25, 0.0, -0.5),
        WorldPoint::new(0.15, 0.0, -0.8),
        WorldPoint::new(0.55, 0.0, -0.6),
        WorldPoint::new(0.25, 0.6, -0.5),
        white,
    ));
    room.extend(Mesh::parallelepiped(
        WorldPoint::new(0.8, 0.0, -0.15),
        WorldPoint::new(0.5, 0.0, -0.25),
        WorldPoint::new(0.9, 0.0, -0.45),
        WorldPoint::new(0.8, 0.3, -0.15),
        white,
    ));

    let mut primitives = room.into_primitives();
    primitives.push(Primitive::from(Sphere::new(
        WorldPoint::new(0.7, 0.45, -0.3),
        0.15,
        glass,
    )));
    primitives.push(Primitive::from(Sphere::new(
        WorldPoint::new(0.3, 0.15, -0.3),
        0.15,
        mirror,
    )));

    println!("#Triangles: {}", primitives.len() - 2);
    let scene = Scene::new(primitives, materials, 16, 8);
    scene.bvh().print_statistics();

    let camera = Camera::builder()
        .center(WorldPoint::new(0.5, 0.5, 0.8))
        .forward(WorldVector::new(0.0, 0.0, -1.0))
        .up(WorldVector::new(0.0, 1.0, 0.0))
        .resolution(ScreenSize::new(
            settings.width.get(),
            settings.height.get(),
        ))
        .fov(45f32.to_radians())
        .viewport_distance(0.8 + 1e-4)
        .build();

    let n_primary = u64::from(
        settings.width.get() * settings.height.get() * settings.samples_per_pixel.get(),
    );
    let bar = ProgressBar::new(n_primary);

    let mut camera_rng = SmallRng::seed_from_u64(settings.seed);
    let start = std::time::Instant::now();
    let records = render(
        &scene,
        |i, j, k| {
            bar.inc(1);
            camera.sample_ray(i, j, k, &mut camera_rng)
        },
        &settings,
    );
    bar.finish();
    println!("Traced in {:.1?}", start.elapsed());

    let image = framebuffer::assemble_image(&records, &settings);
    image.save("cornell.png")?;

    Ok(())
}
