use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};

/// Single-channel image whose longer side fits the OCR bounding box.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    luma: GrayImage,
}

impl PreprocessedImage {
    pub fn width(&self) -> u32 {
        self.luma.width()
    }

    pub fn height(&self) -> u32 {
        self.luma.height()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.luma
    }
}

/// Downscales `image` so that neither side exceeds `max_side` and reduces it
/// to luminance. Images already inside the box keep their size.
///
/// Alpha is not dropped: translucent pixels are blended over white before
/// the luminance conversion, so transparent backgrounds read as paper.
pub fn preprocess(image: DynamicImage, max_side: u32) -> PreprocessedImage {
    let max_side = max_side.max(1);
    let (width, height) = (image.width(), image.height());
    let resized = match fit_within(width, height, max_side) {
        Some((new_width, new_height)) => {
            image.resize_exact(new_width, new_height, FilterType::Lanczos3)
        }
        None => image,
    };
    PreprocessedImage {
        luma: to_luma(&resized),
    }
}

fn fit_within(width: u32, height: u32, max_side: u32) -> Option<(u32, u32)> {
    if width <= max_side && height <= max_side {
        return None;
    }
    let scale = (max_side as f64 / width as f64).min(max_side as f64 / height as f64);
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_side);
    Some((scaled(width), scaled(height)))
}

fn to_luma(image: &DynamicImage) -> GrayImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut luma = GrayImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let r = (r as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        let g = (g as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        let b = (b as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        let value = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
        luma.put_pixel(x, y, image::Luma([value]));
    }

    luma
}
