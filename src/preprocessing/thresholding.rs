//! # Image Thresholding Module
//!
//! Adaptive binarization for strips under uneven light. A single global threshold
//! loses text in glare; comparing each pixel against its own neighbourhood does not.

use image::{DynamicImage, GrayImage, Luma};
use tracing;

use super::types::{PreprocessingError, ThresholdedImageResult};

/// Binarize against a Gaussian-weighted local mean.
///
/// A pixel turns white when it is brighter than `local_mean - offset`, black otherwise,
/// so dark print on a light foil stays black.
///
/// # Arguments
///
/// * `image` - The input image; converted to grayscale first
/// * `sigma` - Standard deviation of the Gaussian that defines the neighbourhood
/// * `offset` - Value subtracted from the local mean before comparing
pub fn apply_adaptive_threshold(
    image: &DynamicImage,
    sigma: f32,
    offset: i16,
) -> Result<ThresholdedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if sigma <= 0.0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: format!("Invalid sigma value: {}. Must be > 0.0", sigma),
        });
    }

    let gray = image.to_luma8();
    let local_mean = image::imageops::blur(&gray, sigma);

    let mut binary = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let mean = local_mean.get_pixel(x, y)[0] as i16;
        let value = if pixel[0] as i16 > mean - offset {
            255u8
        } else {
            0u8
        };
        binary.put_pixel(x, y, Luma([value]));
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Adaptive thresholding completed in {}ms: sigma={:.1}, offset={}, dimensions={}x{}",
        processing_time.as_millis(),
        sigma,
        offset,
        gray.width(),
        gray.height()
    );

    Ok(ThresholdedImageResult {
        image: DynamicImage::ImageLuma8(binary),
        sigma,
        offset,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_is_binary() {
        let mut img = GrayImage::new(40, 40);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            pixel[0] = (x * 6) as u8;
        }
        let result = apply_adaptive_threshold(&DynamicImage::ImageLuma8(img), 3.0, 10)
            .expect("thresholding should succeed");
        for pixel in result.image.to_luma8().pixels() {
            assert!(pixel[0] == 0 || pixel[0] == 255);
        }
        assert_eq!(result.offset, 10);
    }

    #[test]
    fn test_dark_stroke_on_light_background() {
        let mut img = GrayImage::from_pixel(30, 30, Luma([220]));
        for y in 5..25 {
            img.put_pixel(15, y, Luma([20]));
        }
        let result = apply_adaptive_threshold(&DynamicImage::ImageLuma8(img), 4.0, 10)
            .expect("thresholding should succeed");
        let binary = result.image.to_luma8();
        assert_eq!(binary.get_pixel(15, 15)[0], 0);
        assert_eq!(binary.get_pixel(2, 2)[0], 255);
    }

    #[test]
    fn test_uniform_image_is_white() {
        let img = GrayImage::from_pixel(10, 10, Luma([128]));
        let result = apply_adaptive_threshold(&DynamicImage::ImageLuma8(img), 2.0, 10)
            .expect("thresholding should succeed");
        assert!(result.image.to_luma8().pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_invalid_sigma() {
        let img = DynamicImage::new_luma8(5, 5);
        assert!(apply_adaptive_threshold(&img, 0.0, 10).is_err());
    }
}
