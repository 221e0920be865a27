//! Image decode, crop and resize primitives.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use std::path::Path;
use thiserror::Error;

/// Resampling filter for every resize. Fixed so variants are reproducible.
const RESIZE_FILTER: FilterType = FilterType::Triangle;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("image has zero size")]
    Empty,
    #[error("crop {rect:?} out of bounds for {width}x{height} image")]
    OutOfBounds { rect: Rect, width: u32, height: u32 },
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Square of side `side` centered in a `width`x`height` image.
    ///
    /// The origin is floored, so an odd leftover puts the extra pixel on the
    /// right/bottom edge.
    pub fn centered_square(width: u32, height: u32, side: u32) -> Self {
        Self {
            x: width.saturating_sub(side) / 2,
            y: height.saturating_sub(side) / 2,
            width: side,
            height: side,
        }
    }
}

/// Open and decode an image file.
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage, ImageError> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| ImageError::Decode {
        path: path.display().to_string(),
        source,
    })?;
    non_empty(image)
}

/// Decode an in-memory encoded image (PNG, JPEG, ...).
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    let image = image::load_from_memory(bytes).map_err(|source| ImageError::Decode {
        path: "<memory>".to_string(),
        source,
    })?;
    non_empty(image)
}

fn non_empty(image: DynamicImage) -> Result<DynamicImage, ImageError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ImageError::Empty);
    }
    Ok(image)
}

/// Resize the whole image to `size`x`size` RGB, ignoring aspect ratio.
pub fn resize(image: &DynamicImage, size: u32) -> RgbImage {
    image.resize_exact(size, size, RESIZE_FILTER).to_rgb8()
}

/// Crop `rect` out of `image` and resize it to `size`x`size` RGB.
pub fn crop_and_resize(
    image: &DynamicImage,
    rect: Rect,
    size: u32,
) -> Result<RgbImage, ImageError> {
    let (width, height) = (image.width(), image.height());
    let fits = rect.width > 0
        && rect.height > 0
        && rect.x.checked_add(rect.width).is_some_and(|r| r <= width)
        && rect.y.checked_add(rect.height).is_some_and(|b| b <= height);
    if !fits {
        return Err(ImageError::OutOfBounds { rect, width, height });
    }

    let cropped = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
    Ok(resize(&cropped, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_centered_square_even() {
        let r = Rect::centered_square(200, 100, 80);
        assert_eq!(r, Rect { x: 60, y: 10, width: 80, height: 80 });
    }

    #[test]
    fn test_centered_square_floors_odd_margin() {
        // (101 - 92) / 2 = 4.5 → 4
        let r = Rect::centered_square(101, 100, 92);
        assert_eq!((r.x, r.y), (4, 4));
    }

    #[test]
    fn test_crop_and_resize_output_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 200, Rgb([1, 2, 3])));
        let rect = Rect::centered_square(300, 200, 184);
        let out = crop_and_resize(&img, rect, 112).unwrap();
        assert_eq!(out.dimensions(), (112, 112));
        assert_eq!(out.get_pixel(56, 56), &Rgb([1, 2, 3]));
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(50, 50));
        let rect = Rect { x: 10, y: 10, width: 45, height: 45 };
        assert!(matches!(
            crop_and_resize(&img, rect, 112),
            Err(ImageError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ImageError::Decode { .. }));
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(matches!(
            load_image("/nonexistent/face.png"),
            Err(ImageError::Decode { .. })
        ));
    }
}
