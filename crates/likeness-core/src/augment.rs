//! Deterministic augmentation: several framings of one photo.
//!
//! Every photo yields the full frame plus centered square crops at a fixed
//! list of ratios. Each view is embedded and normalized independently, which
//! makes enrollment and verification less sensitive to how tightly the face
//! was framed.

use crate::imaging::{self, ImageError, Rect};
use crate::recognizer::{Extractor, RecognizerError, ARCFACE_INPUT_SIZE};
use crate::types::NormalizedEmbedding;
use image::{DynamicImage, GenericImageView, RgbImage};
use thiserror::Error;

/// Centered-crop ratios applied after the full-frame view.
pub const DEFAULT_CROP_RATIOS: [f32; 2] = [0.92, 0.85];

#[derive(Error, Debug)]
pub enum AugmentError {
    #[error("image: {0}")]
    Image(#[from] ImageError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Produces the variant regions of an image and their embeddings.
#[derive(Debug, Clone)]
pub struct VariantSampler {
    crop_ratios: Vec<f32>,
    input_size: u32,
}

impl Default for VariantSampler {
    fn default() -> Self {
        Self::new(DEFAULT_CROP_RATIOS.to_vec())
    }
}

impl VariantSampler {
    /// Ratios outside (0, 1] are dropped.
    pub fn new(crop_ratios: Vec<f32>) -> Self {
        let crop_ratios = crop_ratios
            .into_iter()
            .filter(|r| *r > 0.0 && *r <= 1.0)
            .collect();
        Self {
            crop_ratios,
            input_size: ARCFACE_INPUT_SIZE as u32,
        }
    }

    pub fn crop_ratios(&self) -> &[f32] {
        &self.crop_ratios
    }

    /// Maximum number of variants per image.
    pub fn variant_count(&self) -> usize {
        1 + self.crop_ratios.len()
    }

    /// Full frame first, then one centered crop per ratio, all resized to the
    /// extractor input size.
    ///
    /// Crops are skipped when a dimension is unknown (zero) or the crop side
    /// floors to zero.
    pub fn regions(&self, image: &DynamicImage) -> Result<Vec<RgbImage>, ImageError> {
        let mut regions = Vec::with_capacity(self.variant_count());
        regions.push(imaging::resize(image, self.input_size));

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(regions);
        }

        let square = width.min(height);
        for &ratio in &self.crop_ratios {
            let side = (square as f32 * ratio).floor() as u32;
            if side == 0 {
                continue;
            }
            let rect = Rect::centered_square(width, height, side);
            regions.push(imaging::crop_and_resize(image, rect, self.input_size)?);
        }

        Ok(regions)
    }

    /// Embed every variant of `image`, normalizing each result.
    ///
    /// Any extraction failure aborts the whole image; a partial set would
    /// change the vote count downstream.
    pub fn embed<E: Extractor + ?Sized>(
        &self,
        extractor: &mut E,
        image: &DynamicImage,
    ) -> Result<Vec<NormalizedEmbedding>, AugmentError> {
        let regions = self.regions(image)?;
        let mut embeddings = Vec::with_capacity(regions.len());
        for (i, region) in regions.iter().enumerate() {
            let raw = extractor.extract(region)?;
            tracing::debug!(variant = i, dim = raw.len(), "variant embedded");
            embeddings.push(raw.normalize());
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;
    use image::Rgb;

    /// Records the region sizes it sees and returns a fixed 3-4-5 vector.
    struct Recording {
        seen: Vec<(u32, u32)>,
    }

    impl Extractor for Recording {
        fn extract(&mut self, face: &RgbImage) -> Result<Embedding, RecognizerError> {
            self.seen.push(face.dimensions());
            Ok(Embedding::new(vec![3.0, 4.0]))
        }
    }

    struct Failing;

    impl Extractor for Failing {
        fn extract(&mut self, _face: &RgbImage) -> Result<Embedding, RecognizerError> {
            Err(RecognizerError::InferenceFailed("boom".into()))
        }
    }

    fn image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 120, 200])))
    }

    #[test]
    fn test_default_produces_three_regions() {
        let regions = VariantSampler::default().regions(&image(640, 480)).unwrap();
        assert_eq!(regions.len(), 3);
        for r in &regions {
            assert_eq!(r.dimensions(), (112, 112));
        }
    }

    #[test]
    fn test_crop_geometry_matches_ratio() {
        // Left half black, right half white.
        let mut buf = RgbImage::new(200, 100);
        for (x, _, p) in buf.enumerate_pixels_mut() {
            *p = if x < 100 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) };
        }
        let img = DynamicImage::ImageRgb8(buf);
        let regions = VariantSampler::default().regions(&img).unwrap();
        // Crop of side floor(100 * 0.92) = 92 starts at x = 54 and straddles the
        // boundary, so it must contain both colours.
        let crop = &regions[1];
        assert_eq!(crop.get_pixel(0, 56), &Rgb([0, 0, 0]));
        assert_eq!(crop.get_pixel(111, 56), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_tiny_image_skips_zero_side_crops() {
        // 1x1: floor(1 * 0.92) == 0, so only the full frame remains.
        let regions = VariantSampler::default().regions(&image(1, 1)).unwrap();
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn test_custom_ratio_list() {
        let sampler = VariantSampler::new(vec![0.9, 0.8, 0.7, 1.5, 0.0]);
        assert_eq!(sampler.crop_ratios(), &[0.9f32, 0.8, 0.7][..]);
        assert_eq!(sampler.regions(&image(300, 300)).unwrap().len(), 4);
    }

    #[test]
    fn test_embed_normalizes_each_variant() {
        let mut extractor = Recording { seen: Vec::new() };
        let embeddings = VariantSampler::default()
            .embed(&mut extractor, &image(320, 240))
            .unwrap();
        assert_eq!(embeddings.len(), 3);
        assert_eq!(extractor.seen, vec![(112, 112); 3]);
        for e in &embeddings {
            assert!((e.as_slice()[0] - 0.6).abs() < 1e-6);
            assert!((e.as_slice()[1] - 0.8).abs() < 1e-6);
        }
    }

    #[test]
    fn test_embed_propagates_extraction_failure() {
        let err = VariantSampler::default()
            .embed(&mut Failing, &image(64, 64))
            .unwrap_err();
        assert!(matches!(err, AugmentError::Recognizer(_)));
    }
}
