//! # OCR Variants
//!
//! The set of images the local engine reads for one photo. Each variant targets a
//! different failure: glare, tiny print, sideways text, faint ink.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing;

use super::filtering::{apply_clahe, apply_morphological_operation, enhance_contrast, median_denoise, sharpen};
use super::rotation::correct_rotation;
use super::thresholding::apply_adaptive_threshold;
use super::types::{MorphologicalOperation, OcrVariant, PreprocessingError};
use crate::ocr_config::{PageSegMode, PreprocessingConfig, STRIP_CHAR_WHITELIST};

/// Scale up so the shorter side is at least `min_short_side`; larger images pass through.
pub fn upscale_to_min_side(image: &DynamicImage, min_short_side: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let short_side = width.min(height);
    if short_side == 0 || short_side >= min_short_side {
        return image.clone();
    }
    let scale = min_short_side as f32 / short_side as f32;
    let new_width = (width as f32 * scale).round() as u32;
    let new_height = (height as f32 * scale).round() as u32;
    tracing::debug!(
        target: "ocr_preprocessing",
        "Upscaling {}x{} to {}x{} (scale {:.2})",
        width,
        height,
        new_width,
        new_height,
        scale
    );
    image.resize_exact(new_width, new_height, FilterType::CatmullRom)
}

/// Binarized strip image: upscale, CLAHE, median, sharpen, adaptive threshold,
/// closing, median.
pub fn preprocess_strip(
    image: &DynamicImage,
    config: &PreprocessingConfig,
) -> Result<DynamicImage, PreprocessingError> {
    let start_time = std::time::Instant::now();

    let scaled = upscale_to_min_side(image, config.min_short_side);
    let equalized = apply_clahe(&scaled, config.clahe_clip_limit, config.clahe_tiles)?;
    let denoised = median_denoise(&equalized.image.to_luma8());
    let sharpened = sharpen(&denoised);
    let binary = apply_adaptive_threshold(
        &DynamicImage::ImageLuma8(sharpened),
        config.adaptive_sigma,
        config.adaptive_offset,
    )?;
    let closed = apply_morphological_operation(&binary.image, MorphologicalOperation::Closing)?;
    let cleaned = median_denoise(&closed.image.to_luma8());

    tracing::debug!(
        target: "ocr_preprocessing",
        "Strip preprocessing completed in {}ms: dimensions={}x{}",
        start_time.elapsed().as_millis(),
        cleaned.width(),
        cleaned.height()
    );
    Ok(DynamicImage::ImageLuma8(cleaned))
}

/// All variants for one photo, in reading order.
///
/// A variant whose preprocessing fails is logged and left out; the rest still run.
pub fn build_ocr_variants(image: &DynamicImage, config: &PreprocessingConfig) -> Vec<OcrVariant> {
    let mut variants = Vec::with_capacity(6);

    match preprocess_strip(image, config) {
        Ok(strip) => variants.push(OcrVariant {
            name: "strip",
            image: strip,
            psm: PageSegMode::SingleBlock,
            whitelist: Some(STRIP_CHAR_WHITELIST),
            min_chars: 0,
        }),
        Err(e) => tracing::warn!(target: "ocr_preprocessing", "Strip variant skipped: {}", e),
    }

    let original = DynamicImage::ImageRgb8(image.to_rgb8());
    variants.push(OcrVariant {
        name: "sparse_original",
        image: original.clone(),
        psm: PageSegMode::SparseText,
        whitelist: None,
        min_chars: 0,
    });

    match correct_rotation(&original, config.deskew_min_degrees, config.deskew_max_degrees) {
        Ok(Some(rotated)) => variants.push(OcrVariant {
            name: "auto_rotated",
            image: rotated.image,
            psm: PageSegMode::SingleBlock,
            whitelist: None,
            min_chars: config.rotated_min_chars,
        }),
        Ok(None) => {}
        Err(e) => tracing::warn!(target: "ocr_preprocessing", "Rotation variant skipped: {}", e),
    }

    // Counter-clockwise quarter turns
    variants.push(OcrVariant {
        name: "rotated_90",
        image: original.rotate270(),
        psm: PageSegMode::SingleBlock,
        whitelist: None,
        min_chars: config.rotated_min_chars,
    });
    variants.push(OcrVariant {
        name: "rotated_270",
        image: original.rotate90(),
        psm: PageSegMode::SingleBlock,
        whitelist: None,
        min_chars: config.rotated_min_chars,
    });

    variants.push(OcrVariant {
        name: "high_contrast",
        image: DynamicImage::ImageLuma8(enhance_contrast(image, config.contrast_factor)),
        psm: PageSegMode::Auto,
        whitelist: None,
        min_chars: 0,
    });

    variants
}

/// PNG bytes for engines that take an encoded buffer
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, PreprocessingError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| PreprocessingError::ImageLoad {
            message: format!("PNG encoding failed: {}", e),
        })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upscale_to_min_side() {
        let img = DynamicImage::new_rgb8(100, 50);
        let scaled = upscale_to_min_side(&img, 150);
        assert_eq!((scaled.width(), scaled.height()), (300, 150));

        let big = DynamicImage::new_rgb8(400, 300);
        let same = upscale_to_min_side(&big, 150);
        assert_eq!((same.width(), same.height()), (400, 300));
    }

    #[test]
    fn test_encode_png_roundtrip_dimensions() {
        let img = DynamicImage::new_luma8(12, 7);
        let bytes = encode_png(&img).expect("encode");
        let decoded = image::load_from_memory(&bytes).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (12, 7));
    }
}
