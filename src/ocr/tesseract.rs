//! Local Tesseract backend.
//!
//! Medicine strips are small, reflective and often printed sideways, so a single pass
//! misses fields. The backend reads every variant from
//! [`crate::preprocessing::build_ocr_variants`] and returns the union of their lines.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::{BackendFuture, BackendKind, OcrBackend};
use crate::ocr_config::OcrConfig;
use crate::ocr_errors::OcrError;
use crate::preprocessing::build_ocr_variants;

const BACKEND: &str = "tesseract";

/// Install roots probed for tessdata when no explicit path is configured
const TESSDATA_ROOTS: &[&str] = &[
    "/usr/share/tesseract-ocr/5",
    "/usr/share/tesseract-ocr/4.00",
    "/usr/share",
    "/usr/local/share",
];

/// Union of all lines across `texts`, trimmed, blanks dropped,
/// de-duplicated case-insensitively in first-seen order.
pub fn merge_unique_lines<I, S>(texts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for text in texts {
        for line in text.as_ref().lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if seen.insert(line.to_lowercase()) {
                lines.push(line.to_string());
            }
        }
    }
    lines.join("\n")
}

/// Explicit `TESSDATA_PATH`, else the first installed directory for the model type.
pub fn resolve_tessdata_path(config: &OcrConfig) -> Option<String> {
    if let Some(path) = &config.tessdata_path {
        return Some(path.clone());
    }
    let dir = config.model_type.tessdata_dir();
    TESSDATA_ROOTS
        .iter()
        .map(|root| std::path::Path::new(root).join(dir))
        .find(|path| path.is_dir())
        .map(|path| path.to_string_lossy().into_owned())
}

pub struct TesseractBackend {
    config: OcrConfig,
    available: bool,
}

impl TesseractBackend {
    pub fn new(config: &OcrConfig) -> Self {
        let available = config.tesseract_enabled && cfg!(feature = "tesseract");
        if config.tesseract_enabled && !available {
            info!("Tesseract enabled in configuration but not compiled in (feature `tesseract`)");
        }
        Self {
            config: config.clone(),
            available,
        }
    }

    /// Blocking: decode, build variants, run the engine on each, merge.
    fn recognize_all(config: &OcrConfig, bytes: &[u8]) -> Result<Option<String>, OcrError> {
        let image = image::load_from_memory(bytes)?;
        let variants = build_ocr_variants(&image, &config.preprocessing);
        let tessdata = resolve_tessdata_path(config);

        let mut texts = Vec::with_capacity(variants.len());
        for variant in &variants {
            match engine::recognize(config, tessdata.as_deref(), variant) {
                Ok(text) if variant.accepts(&text) => {
                    debug!(
                        variant = variant.name,
                        psm = variant.psm.as_str(),
                        chars = text.trim().len(),
                        "Variant produced text"
                    );
                    texts.push(text);
                }
                Ok(_) => debug!(variant = variant.name, "Variant text below threshold"),
                Err(OcrError::BackendUnavailable { backend }) => {
                    return Err(OcrError::BackendUnavailable { backend });
                }
                Err(e) => warn!(variant = variant.name, error = %e, "Variant OCR failed"),
            }
        }

        let merged = merge_unique_lines(&texts);
        if merged.is_empty() {
            Ok(None)
        } else {
            Ok(Some(merged))
        }
    }
}

impl OcrBackend for TesseractBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Tesseract
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn extract_text<'a>(&'a self, image: &'a [u8]) -> BackendFuture<'a> {
        Box::pin(async move {
            if !self.available {
                return Err(OcrError::BackendUnavailable {
                    backend: BACKEND.to_string(),
                });
            }
            let config = self.config.clone();
            let bytes = image.to_vec();
            tokio::task::spawn_blocking(move || Self::recognize_all(&config, &bytes))
                .await
                .map_err(|e| OcrError::call_failed(BACKEND, format!("OCR worker failed: {}", e)))?
        })
    }
}

#[cfg(feature = "tesseract")]
mod engine {
    use leptess::{LepTess, Variable};

    use super::BACKEND;
    use crate::ocr_config::OcrConfig;
    use crate::ocr_errors::OcrError;
    use crate::preprocessing::{encode_png, OcrVariant};

    fn failed(step: &str, err: impl std::fmt::Display) -> OcrError {
        OcrError::call_failed(BACKEND, format!("{}: {}", step, err))
    }

    pub fn recognize(
        config: &OcrConfig,
        tessdata: Option<&str>,
        variant: &OcrVariant,
    ) -> Result<String, OcrError> {
        let png = encode_png(&variant.image)?;
        let mut tess =
            LepTess::new(tessdata, &config.languages).map_err(|e| failed("init", e))?;
        tess.set_variable(Variable::TesseditPagesegMode, variant.psm.as_str())
            .map_err(|e| failed("set page segmentation mode", e))?;
        if let Some(whitelist) = variant.whitelist {
            tess.set_variable(Variable::TesseditCharWhitelist, whitelist)
                .map_err(|e| failed("set whitelist", e))?;
        }
        tess.set_image_from_mem(&png)
            .map_err(|e| failed("load image", e))?;
        tess.get_utf8_text().map_err(|e| failed("recognize", e))
    }
}

// Without the `tesseract` feature there is no engine to link against.
#[cfg(not(feature = "tesseract"))]
mod engine {
    use super::BACKEND;
    use crate::ocr_config::OcrConfig;
    use crate::ocr_errors::OcrError;
    use crate::preprocessing::OcrVariant;

    pub fn recognize(
        _config: &OcrConfig,
        _tessdata: Option<&str>,
        _variant: &OcrVariant,
    ) -> Result<String, OcrError> {
        Err(OcrError::BackendUnavailable {
            backend: BACKEND.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_unique_lines_keeps_first_seen_order() {
        let merged = merge_unique_lines([
            "BIFILAC\n  B.No. ALA306  \n\n",
            "bifilac\nMFG 10/2023\nB.NO. ala306",
            "EXP 09/2025",
        ]);
        assert_eq!(merged, "BIFILAC\nB.No. ALA306\nMFG 10/2023\nEXP 09/2025");
    }

    #[test]
    fn test_merge_unique_lines_empty() {
        assert_eq!(merge_unique_lines(Vec::<String>::new()), "");
        assert_eq!(merge_unique_lines(["", "   \n \n"]), "");
    }

    #[test]
    fn test_explicit_tessdata_path_wins() {
        let config = OcrConfig {
            tessdata_path: Some("/opt/tessdata".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_tessdata_path(&config).as_deref(), Some("/opt/tessdata"));
    }

    #[tokio::test]
    async fn test_disabled_backend_reports_unavailable() {
        let config = OcrConfig {
            tesseract_enabled: false,
            ..Default::default()
        };
        let backend = TesseractBackend::new(&config);
        assert!(!backend.is_available());
        let result = backend.extract_text(b"bytes").await;
        assert!(matches!(result, Err(OcrError::BackendUnavailable { .. })));
    }
}
