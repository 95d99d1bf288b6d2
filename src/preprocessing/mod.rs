//! # Image Preprocessing Module
//!
//! Turns one photo into the set of images the local OCR engine reads.
//!
//! The module is organized into focused sub-modules:
//! - `filtering`: CLAHE, median denoise, sharpening, contrast, morphology
//! - `thresholding`: adaptive binarization
//! - `rotation`: dominant-angle detection and correction
//! - `variants`: the strip pipeline and the full variant list
//! - `types`: shared types and error definitions

pub mod filtering;
pub mod rotation;
pub mod thresholding;
pub mod types;
pub mod variants;

pub use types::{
    ClaheImageResult, MorphologicalImageResult, MorphologicalOperation, OcrVariant,
    PreprocessingError, RotationResult, ThresholdedImageResult,
};

pub use filtering::{apply_clahe, apply_morphological_operation, enhance_contrast, median_denoise, sharpen};
pub use rotation::{correct_rotation, detect_dominant_angle};
pub use thresholding::apply_adaptive_threshold;
pub use variants::{build_ocr_variants, encode_png, preprocess_strip, upscale_to_min_side};
