use image::RgbImage;

use crate::{
    geometry::Colour,
    renderer::{ContributionRecord, RenderSettings},
};

/// Averages the contribution slots of every pixel into an 8-bit image.
/// Colours are clamped to `[0, 1]` and passed through a square root as a
/// gamma-2 approximation.
pub fn assemble_image(records: &[ContributionRecord], settings: &RenderSettings) -> RgbImage {
    let width = settings.width.get();
    let spp = settings.samples_per_pixel.get();

    RgbImage::from_fn(width, settings.height.get(), |x, y| {
        let base = ((y * width + x) * spp) as usize;
        let sum: Colour = records[base..base + spp as usize]
            .iter()
            .map(|record| record.colour)
            .sum();
        let mean = sum / spp as f32;

        let c = mean.map(|v| (v.clamp(0.0, 1.0).sqrt() * 255.0).round() as u8);
        image::Rgb([c.x, c.y, c.z])
    })
}
