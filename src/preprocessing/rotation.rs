//! # Rotation Correction
//!
//! Strips are often photographed at an angle, and some print runs sideways. The
//! dominant text direction is estimated from straight edges: Canny edge detection,
//! a Hough transform, then the median angle of the detected lines.

use image::{DynamicImage, GrayImage, Rgb};
use imageproc::edges::canny;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::hough::{detect_lines, LineDetectionOptions};
use tracing;

use super::types::{PreprocessingError, RotationResult};

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const HOUGH_VOTE_THRESHOLD: u32 = 100;
const HOUGH_SUPPRESSION_RADIUS: u32 = 8;

/// Map a Hough normal angle in `[0, 180)` to a line direction in `(-90, 90]`.
///
/// A normal at 90° is a horizontal line, so direction = normal - 90.
pub fn line_direction_degrees(normal_degrees: u32) -> f32 {
    let direction = normal_degrees as f32 - 90.0;
    if direction <= -90.0 {
        direction + 180.0
    } else {
        direction
    }
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Median direction of the straight lines in `gray` with the number of lines,
/// or `None` when no line clears the vote threshold.
pub fn detect_dominant_angle(gray: &GrayImage) -> Option<(f32, usize)> {
    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: HOUGH_VOTE_THRESHOLD,
            suppression_radius: HOUGH_SUPPRESSION_RADIUS,
        },
    );
    let mut angles: Vec<f32> = lines
        .iter()
        .map(|line| line_direction_degrees(line.angle_in_degrees))
        .collect();
    let count = angles.len();
    median(&mut angles).map(|angle| (angle, count))
}

/// Rotate `image` to undo a dominant line angle, but only when
/// `min_degrees < |angle| < max_degrees`. Smaller angles are noise and larger ones are
/// handled by the quarter-turn variants.
pub fn correct_rotation(
    image: &DynamicImage,
    min_degrees: f32,
    max_degrees: f32,
) -> Result<Option<RotationResult>, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: "Cannot rotate an empty image".to_string(),
        });
    }

    let gray = image.to_luma8();
    let Some((angle, line_count)) = detect_dominant_angle(&gray) else {
        tracing::debug!(target: "ocr_preprocessing", "No lines detected for rotation correction");
        return Ok(None);
    };
    if angle.abs() <= min_degrees || angle.abs() >= max_degrees {
        tracing::debug!(
            target: "ocr_preprocessing",
            "Dominant angle {:.1} outside correction range, skipping",
            angle
        );
        return Ok(None);
    }

    // rotate_about_center turns clockwise; undo the line's slope
    let rotated = rotate_about_center(
        &image.to_rgb8(),
        -angle.to_radians(),
        Interpolation::Bilinear,
        Rgb([255, 255, 255]),
    );

    let processing_time = start_time.elapsed();
    tracing::debug!(
        target: "ocr_preprocessing",
        "Rotation corrected in {}ms: angle={:.1}, lines={}",
        processing_time.as_millis(),
        angle,
        line_count
    );

    Ok(Some(RotationResult {
        image: DynamicImage::ImageRgb8(rotated),
        angle_degrees: angle,
        line_count,
        processing_time_ms: processing_time.as_millis() as u32,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_line_direction_mapping() {
        assert_eq!(line_direction_degrees(90), 0.0);
        assert_eq!(line_direction_degrees(0), 90.0);
        assert_eq!(line_direction_degrees(120), 30.0);
        assert_eq!(line_direction_degrees(45), -45.0);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn test_blank_image_has_no_angle() {
        let gray = GrayImage::from_pixel(64, 64, Luma([255]));
        assert_eq!(detect_dominant_angle(&gray), None);
        let result = correct_rotation(&DynamicImage::ImageLuma8(gray), 5.0, 85.0)
            .expect("blank image is not an error");
        assert!(result.is_none());
    }

    #[test]
    fn test_empty_image_is_error() {
        assert!(correct_rotation(&DynamicImage::new_rgb8(0, 0), 5.0, 85.0).is_err());
    }
}
