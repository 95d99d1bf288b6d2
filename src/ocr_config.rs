//! # OCR Configuration Module
//!
//! This module defines configuration structures for the local OCR engine and the
//! image preprocessing it depends on, including input size limits per format.

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "eng";
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB general limit for image files

/// Characters the strip variant is allowed to produce.
///
/// Packaging labels carry batch codes, dates and prices, so the set is
/// alphanumerics plus the separators those fields use.
pub const STRIP_CHAR_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789./-:₹Rs ";

/// Format-specific file size limits for different image formats
#[derive(Debug, Clone)]
pub struct FormatSizeLimits {
    /// PNG format limit (higher due to better compression)
    pub png_max: u64,
    /// JPEG format limit (phone photos land here)
    pub jpeg_max: u64,
    /// BMP format limit (lower due to uncompressed nature)
    pub bmp_max: u64,
    /// TIFF format limit
    pub tiff_max: u64,
    /// WebP format limit
    pub webp_max: u64,
    /// Anything above this is rejected before format sniffing
    pub min_quick_reject: u64,
}

impl Default for FormatSizeLimits {
    fn default() -> Self {
        Self {
            png_max: 15 * 1024 * 1024,          // 15MB for PNG
            jpeg_max: 10 * 1024 * 1024,         // 10MB for JPEG
            bmp_max: 5 * 1024 * 1024,           // 5MB for BMP
            tiff_max: 20 * 1024 * 1024,         // 20MB for TIFF
            webp_max: 10 * 1024 * 1024,         // 10MB for WebP
            min_quick_reject: 50 * 1024 * 1024, // 50MB quick reject
        }
    }
}

impl FormatSizeLimits {
    /// Validate format size limits
    pub fn validate(&self) -> crate::errors::AppResult<()> {
        let limits = [
            ("png_max", self.png_max),
            ("jpeg_max", self.jpeg_max),
            ("bmp_max", self.bmp_max),
            ("tiff_max", self.tiff_max),
            ("webp_max", self.webp_max),
            ("min_quick_reject", self.min_quick_reject),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(crate::errors::AppError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.bmp_max > self.png_max {
            return Err(crate::errors::AppError::Config(format!(
                "bmp_max ({}) should not exceed png_max ({})",
                self.bmp_max, self.png_max
            )));
        }
        if self.min_quick_reject < self.tiff_max {
            return Err(crate::errors::AppError::Config(format!(
                "min_quick_reject ({}) must be >= tiff_max ({})",
                self.min_quick_reject, self.tiff_max
            )));
        }

        Ok(())
    }
}

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSegMode {
    /// Orientation and script detection (OSD) only
    OsdOnly = 0,
    /// Automatic page segmentation with OSD
    AutoOsd = 1,
    /// Automatic page segmentation, no OSD
    AutoNoOsd = 2,
    /// Fully automatic page segmentation
    #[default]
    Auto = 3,
    /// Assume a single column of text
    SingleColumn = 4,
    /// Assume a single uniform block of vertically aligned text
    SingleBlockVert = 5,
    /// Assume a single uniform block of text
    SingleBlock = 6,
    /// Treat the image as a single text line
    SingleLine = 7,
    /// Treat the image as a single word
    SingleWord = 8,
    /// Treat the image as a single word in a circle
    WordInCircle = 9,
    /// Treat the image as a single character
    SingleChar = 10,
    /// Find as much text as possible in no particular order
    SparseText = 11,
    /// Sparse text with OSD
    SparseTextOsd = 12,
    /// Treat the image as a single text line, bypassing hacks that are Tesseract-specific
    RawLine = 13,
}

impl PageSegMode {
    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::OsdOnly => "0",
            PageSegMode::AutoOsd => "1",
            PageSegMode::AutoNoOsd => "2",
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlockVert => "5",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SingleLine => "7",
            PageSegMode::SingleWord => "8",
            PageSegMode::WordInCircle => "9",
            PageSegMode::SingleChar => "10",
            PageSegMode::SparseText => "11",
            PageSegMode::SparseTextOsd => "12",
            PageSegMode::RawLine => "13",
        }
    }
}

/// Tesseract model type for different accuracy/speed trade-offs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    /// Fast model (tessdata_fast)
    #[default]
    Fast,
    /// Best model (tessdata_best)
    Best,
}

impl ModelType {
    /// Get the tessdata directory name for this model type
    pub fn tessdata_dir(&self) -> &'static str {
        match self {
            ModelType::Fast => "tessdata_fast",
            ModelType::Best => "tessdata_best",
        }
    }
}

/// Parameters for the image variants the local engine reads.
#[derive(Debug, Clone)]
pub struct PreprocessingConfig {
    /// Shorter image side is scaled up to at least this many pixels for the strip variant
    pub min_short_side: u32,
    /// CLAHE clip limit
    pub clahe_clip_limit: f32,
    /// CLAHE tile grid (columns, rows)
    pub clahe_tiles: (u32, u32),
    /// Gaussian sigma for the local mean in adaptive thresholding
    pub adaptive_sigma: f32,
    /// Offset subtracted from the local mean before comparing
    pub adaptive_offset: i16,
    /// Contrast factor for the high-contrast variant
    pub contrast_factor: f32,
    /// Rotation correction only runs when the dominant angle is strictly inside this range
    pub deskew_min_degrees: f32,
    pub deskew_max_degrees: f32,
    /// Minimum text length for the rotated variants to count
    pub rotated_min_chars: usize,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            min_short_side: 1500,
            clahe_clip_limit: 3.0,
            clahe_tiles: (8, 8),
            adaptive_sigma: 11.0,
            adaptive_offset: 10,
            contrast_factor: 3.0,
            deskew_min_degrees: 5.0,
            deskew_max_degrees: 85.0,
            rotated_min_chars: 20,
        }
    }
}

impl PreprocessingConfig {
    pub fn validate(&self) -> crate::errors::AppResult<()> {
        if self.min_short_side == 0 {
            return Err(crate::errors::AppError::Config(
                "min_short_side must be greater than 0".to_string(),
            ));
        }
        if self.clahe_clip_limit <= 0.0 {
            return Err(crate::errors::AppError::Config(
                "clahe_clip_limit must be greater than 0".to_string(),
            ));
        }
        if self.clahe_tiles.0 == 0 || self.clahe_tiles.1 == 0 {
            return Err(crate::errors::AppError::Config(
                "clahe_tiles must be greater than 0 in both directions".to_string(),
            ));
        }
        if self.adaptive_sigma <= 0.0 {
            return Err(crate::errors::AppError::Config(
                "adaptive_sigma must be greater than 0".to_string(),
            ));
        }
        if self.deskew_min_degrees >= self.deskew_max_degrees {
            return Err(crate::errors::AppError::Config(format!(
                "deskew_min_degrees ({}) must be < deskew_max_degrees ({})",
                self.deskew_min_degrees, self.deskew_max_degrees
            )));
        }
        Ok(())
    }
}

/// Configuration structure for the local OCR engine
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Whether the local engine may be used at all
    pub tesseract_enabled: bool,
    /// OCR language codes (e.g., "eng", "eng+hin")
    pub languages: String,
    /// Tesseract model type (Fast vs Best accuracy)
    pub model_type: ModelType,
    /// Explicit tessdata directory; probed when absent
    pub tessdata_path: Option<String>,
    /// Maximum allowed file size in bytes for formats without their own limit
    pub max_file_size: u64,
    /// Format-specific size limits
    pub format_limits: FormatSizeLimits,
    /// Upper bound on one local OCR run over all variants, in seconds
    pub operation_timeout_secs: u64,
    pub preprocessing: PreprocessingConfig,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_enabled: true,
            languages: DEFAULT_LANGUAGES.to_string(),
            model_type: ModelType::default(),
            tessdata_path: None,
            max_file_size: MAX_FILE_SIZE,
            format_limits: FormatSizeLimits::default(),
            operation_timeout_secs: 60,
            preprocessing: PreprocessingConfig::default(),
        }
    }
}

impl OcrConfig {
    /// Validate OCR configuration parameters
    pub fn validate(&self) -> crate::errors::AppResult<()> {
        if self.languages.trim().is_empty() {
            return Err(crate::errors::AppError::Config(
                "languages cannot be empty".to_string(),
            ));
        }
        if self.max_file_size == 0 {
            return Err(crate::errors::AppError::Config(
                "max_file_size must be greater than 0".to_string(),
            ));
        }
        if self.operation_timeout_secs == 0 {
            return Err(crate::errors::AppError::Config(
                "operation_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.format_limits.validate()?;
        self.preprocessing.validate()?;

        Ok(())
    }
}
