//! # Image Filtering Module
//!
//! Contrast enhancement, denoising, sharpening and morphological cleanup used to build
//! the OCR variants.

use image::{DynamicImage, GrayImage, Luma};
use tracing;

use super::types::{
    ClaheImageResult, MorphologicalImageResult, MorphologicalOperation, PreprocessingError,
};

/// Applies morphological operations to clean up binary images using a 3x3 kernel.
///
/// Border pixels are copied through unchanged.
pub fn apply_morphological_operation(
    image: &DynamicImage,
    operation: MorphologicalOperation,
) -> Result<MorphologicalImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    let gray = image.to_luma8();

    let processed = match operation {
        MorphologicalOperation::Erosion => apply_erosion(&gray),
        MorphologicalOperation::Dilation => apply_dilation(&gray),
        MorphologicalOperation::Closing => {
            let dilated = apply_dilation(&gray);
            apply_erosion(&dilated)
        }
    };

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Morphological operation completed in {}ms: operation={:?}, dimensions={}x{}",
        processing_time.as_millis(),
        operation,
        processed.width(),
        processed.height()
    );

    Ok(MorphologicalImageResult {
        image: DynamicImage::ImageLuma8(processed),
        operation,
        kernel_size: 3,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// 3x3 neighbourhood reduction; `pick` chooses min (erosion) or max (dilation).
fn apply_kernel(image: &GrayImage, pick: fn(u8, u8) -> u8, start: u8) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut result = image.clone();
    if width < 3 || height < 3 {
        return result;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut value = start;
            for ky in -1i32..=1 {
                for kx in -1i32..=1 {
                    let nx = (x as i32 + kx) as u32;
                    let ny = (y as i32 + ky) as u32;
                    value = pick(value, image.get_pixel(nx, ny)[0]);
                }
            }
            result.put_pixel(x, y, Luma([value]));
        }
    }

    result
}

fn apply_erosion(image: &GrayImage) -> GrayImage {
    apply_kernel(image, u8::min, 255)
}

fn apply_dilation(image: &GrayImage) -> GrayImage {
    apply_kernel(image, u8::max, 0)
}

/// Contrast Limited Adaptive Histogram Equalization over a `tile_grid` of
/// (columns, rows) tiles. Evens out glare and shadow on foil packs.
pub fn apply_clahe(
    image: &DynamicImage,
    clip_limit: f32,
    tile_grid: (u32, u32),
) -> Result<ClaheImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if clip_limit <= 0.0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: format!("Invalid clip limit: {}. Must be > 0.0", clip_limit),
        });
    }
    if tile_grid.0 == 0 || tile_grid.1 == 0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: "Invalid tile grid: dimensions must be > 0".to_string(),
        });
    }

    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: "Cannot equalize an empty image".to_string(),
        });
    }

    let tile_width = width.div_ceil(tile_grid.0).max(1);
    let tile_height = height.div_ceil(tile_grid.1).max(1);

    let mut output = GrayImage::new(width, height);
    let mut tile_y = 0;
    while tile_y < height {
        let mut tile_x = 0;
        while tile_x < width {
            let end_x = (tile_x + tile_width).min(width);
            let end_y = (tile_y + tile_height).min(height);
            let tile = image::imageops::crop_imm(&gray, tile_x, tile_y, end_x - tile_x, end_y - tile_y)
                .to_image();
            let enhanced = equalize_tile(&tile, clip_limit);
            image::imageops::replace(&mut output, &enhanced, tile_x as i64, tile_y as i64);
            tile_x += tile_width;
        }
        tile_y += tile_height;
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "CLAHE applied in {}ms: clip_limit={}, tile_grid={:?}",
        processing_time.as_millis(),
        clip_limit,
        tile_grid
    );

    Ok(ClaheImageResult {
        image: DynamicImage::ImageLuma8(output),
        clip_limit,
        tile_grid,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Clipped histogram equalization of one tile.
fn equalize_tile(tile: &GrayImage, clip_limit: f32) -> GrayImage {
    let (width, height) = tile.dimensions();
    let total_pixels = (width * height) as f32;

    let mut histogram = [0u32; 256];
    for pixel in tile.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    // Clip, then hand the excess back evenly
    let clip_pixels = ((clip_limit * (total_pixels / 256.0)).round() as u32).max(1);
    let mut excess = 0u32;
    for count in &mut histogram {
        if *count > clip_pixels {
            excess += *count - clip_pixels;
            *count = clip_pixels;
        }
    }
    let increment = excess / 256;
    let mut remainder = excess % 256;
    for count in &mut histogram {
        *count += increment;
        if remainder > 0 {
            *count += 1;
            remainder -= 1;
        }
    }

    let mut cdf = [0.0f32; 256];
    let mut cumulative = 0.0;
    for (slot, count) in cdf.iter_mut().zip(histogram.iter()) {
        cumulative += *count as f32 / total_pixels;
        *slot = cumulative;
    }

    let mut result = GrayImage::new(width, height);
    for (x, y, pixel) in tile.enumerate_pixels() {
        let value = (cdf[pixel[0] as usize] * 255.0).round().clamp(0.0, 255.0) as u8;
        result.put_pixel(x, y, Luma([value]));
    }
    result
}

/// 3x3 median filter; removes speckle left by thresholding.
pub fn median_denoise(image: &GrayImage) -> GrayImage {
    imageproc::filter::median_filter(image, 1, 1)
}

pub fn sharpen(image: &GrayImage) -> GrayImage {
    imageproc::filter::sharpen3x3(image)
}

/// Stretch intensities away from mid-grey by `factor`, clamping to the valid range.
pub fn enhance_contrast(image: &DynamicImage, factor: f32) -> GrayImage {
    let mut gray = image.to_luma8();
    for pixel in gray.pixels_mut() {
        let stretched = 128.0 + (pixel[0] as f32 - 128.0) * factor;
        pixel[0] = stretched.round().clamp(0.0, 255.0) as u8;
    }
    tracing::debug!(
        target: "ocr_preprocessing",
        "Contrast enhanced: factor={:.1}, dimensions={}x{}",
        factor,
        gray.width(),
        gray.height()
    );
    gray
}
