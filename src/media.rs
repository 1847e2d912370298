use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};

/// Fit an image onto a square key icon, mixing transparency against `background`
pub fn encode_icon(image: DynamicImage, background: [u8; 3], nearest: bool, size: u32) -> RgbImage {
    let [br, bg, bb] = background;

    let resized = image
        .resize_to_fill(
            size,
            size,
            if nearest {
                FilterType::Nearest
            } else {
                FilterType::Gaussian
            },
        )
        .to_rgba8();

    RgbImage::from_fn(size, size, |x, y| {
        let [r, g, b, a] = resized.get_pixel(x, y).0;

        // Mix alpha values against the background
        let a = a as f64 / 255.0;
        let ba = 1. - a;
        Rgb([
            ((br as f64 * ba) + (r as f64 * a)) as u8,
            ((bg as f64 * ba) + (g as f64 * a)) as u8,
            ((bb as f64 * ba) + (b as f64 * a)) as u8,
        ])
    })
}
