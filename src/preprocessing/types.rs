//! # Shared Types for Image Preprocessing
//!
//! Result structs and errors shared by the preprocessing sub-modules.

use image::DynamicImage;

use crate::ocr_config::PageSegMode;

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone)]
pub enum PreprocessingError {
    /// Image processing operation failed
    ProcessingFailed { message: String },
    /// Failed to load, decode or encode an image
    ImageLoad { message: String },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::ProcessingFailed { message } => {
                write!(f, "Image processing failed: {}", message)
            }
            PreprocessingError::ImageLoad { message } => {
                write!(f, "Failed to load image: {}", message)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

impl From<PreprocessingError> for crate::ocr_errors::OcrError {
    fn from(err: PreprocessingError) -> Self {
        crate::ocr_errors::OcrError::ImageLoad(err.to_string())
    }
}

/// Result of adaptive thresholding.
#[derive(Debug, Clone)]
pub struct ThresholdedImageResult {
    /// The thresholded binary image
    pub image: DynamicImage,
    /// Gaussian sigma used for the local mean
    pub sigma: f32,
    /// Offset subtracted from the local mean
    pub offset: i16,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of morphological operations on binary images.
#[derive(Debug, Clone)]
pub struct MorphologicalImageResult {
    /// The morphologically processed image
    pub image: DynamicImage,
    /// Type of morphological operation applied
    pub operation: MorphologicalOperation,
    /// Kernel size used (e.g., 3 for 3x3 kernel)
    pub kernel_size: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Types of morphological operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MorphologicalOperation {
    /// Shrinks bright regions
    Erosion,
    /// Expands bright regions
    Dilation,
    /// Dilation followed by erosion, fills small gaps
    Closing,
}

/// Result of CLAHE contrast enhancement operation.
#[derive(Debug, Clone)]
pub struct ClaheImageResult {
    /// The contrast-enhanced image
    pub image: DynamicImage,
    /// Clip limit used for histogram clipping
    pub clip_limit: f32,
    /// Tile grid used for local equalization (columns, rows)
    pub tile_grid: (u32, u32),
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of rotation correction.
#[derive(Debug, Clone)]
pub struct RotationResult {
    /// The rotated image
    pub image: DynamicImage,
    /// Dominant line angle that was corrected, in degrees
    pub angle_degrees: f32,
    /// Number of detected lines the angle was taken from
    pub line_count: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// One image the local engine should read, with how to read it.
#[derive(Debug, Clone)]
pub struct OcrVariant {
    /// Stable label for logs
    pub name: &'static str,
    pub image: DynamicImage,
    pub psm: PageSegMode,
    /// Restrict recognition to these characters
    pub whitelist: Option<&'static str>,
    /// Text must be longer than this (after trimming) to be kept
    pub min_chars: usize,
}

impl OcrVariant {
    /// Whether `text` read from this variant is worth keeping
    pub fn accepts(&self, text: &str) -> bool {
        text.trim().chars().count() > self.min_chars
    }
}
