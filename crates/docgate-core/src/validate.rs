//! Cross-field checks run before a configuration reaches the engine.
//!
//! A failure here is a Validation error with no native code; the engine is
//! never called and no handle is allocated.

use crate::error::{GatewayError, Result};
use crate::models::config::{
    ChunkingConfig, ExtractionConfig, ImageExtractionConfig, KeywordConfig, TesseractConfig,
};

/// Largest chunk size or `max_chars` the engine accepts (100 MiB).
pub const MAX_CHUNK_CHARS: usize = 100 * 1024 * 1024;

/// Check that a confidence or score lies in `[0.0, 1.0]`.
pub fn validate_confidence(field: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(GatewayError::validation(format!(
            "{field} must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}

pub fn validate_dpi(field: &str, value: i32) -> Result<()> {
    if value <= 0 {
        return Err(GatewayError::validation(format!(
            "{field} must be positive, got {value}"
        )));
    }
    Ok(())
}

/// Tesseract page segmentation mode, 0 through 13.
pub fn validate_tesseract_psm(psm: i32) -> Result<()> {
    if !(0..=13).contains(&psm) {
        return Err(GatewayError::validation(format!(
            "psm must be between 0 and 13, got {psm}"
        )));
    }
    Ok(())
}

/// Tesseract OCR engine mode, 0 through 3.
pub fn validate_tesseract_oem(oem: i32) -> Result<()> {
    if !(0..=3).contains(&oem) {
        return Err(GatewayError::validation(format!(
            "oem must be between 0 and 3, got {oem}"
        )));
    }
    Ok(())
}

/// Check a `max_chars` / `max_overlap` pair.
pub fn validate_chunking_params(max_chars: usize, max_overlap: usize) -> Result<()> {
    if max_chars == 0 {
        return Err(GatewayError::validation("max_chars must be greater than 0"));
    }
    if max_chars > MAX_CHUNK_CHARS {
        return Err(GatewayError::validation(format!(
            "max_chars must not exceed {MAX_CHUNK_CHARS}, got {max_chars}"
        )));
    }
    if max_overlap >= max_chars {
        return Err(GatewayError::validation(format!(
            "max_overlap ({max_overlap}) must be less than max_chars ({max_chars})"
        )));
    }
    Ok(())
}

impl ExtractionConfig {
    /// Check every present sub-tree. Absent sub-trees are not checked.
    pub fn validate(&self) -> Result<()> {
        if let Some(chunking) = &self.chunking {
            validate_chunking(chunking)?;
        }
        if let Some(tesseract) = self.ocr.as_ref().and_then(|ocr| ocr.tesseract.as_ref()) {
            validate_tesseract(tesseract)?;
        }
        if let Some(images) = &self.images {
            validate_images(images)?;
        }
        if let Some(min) = self.language_detection.as_ref().and_then(|l| l.min_confidence) {
            validate_confidence("language_detection.min_confidence", min)?;
        }
        if let Some(keywords) = &self.keywords {
            validate_keywords(keywords)?;
        }
        if self.max_concurrent_extractions == Some(0) {
            return Err(GatewayError::validation(
                "max_concurrent_extractions must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn validate_chunking(chunking: &ChunkingConfig) -> Result<()> {
    if let Some(size) = chunking.chunk_size {
        if size > MAX_CHUNK_CHARS {
            return Err(GatewayError::validation(format!(
                "chunk_size must not exceed {MAX_CHUNK_CHARS}, got {size}"
            )));
        }
        if let Some(overlap) = chunking.chunk_overlap {
            if overlap >= size {
                return Err(GatewayError::validation(format!(
                    "chunk_overlap ({overlap}) must be less than chunk_size ({size})"
                )));
            }
        }
    }

    match (chunking.max_chars, chunking.max_overlap) {
        (Some(max_chars), Some(max_overlap)) => validate_chunking_params(max_chars, max_overlap),
        (Some(max_chars), None) => validate_chunking_params(max_chars, 0),
        _ => Ok(()),
    }
}

fn validate_tesseract(tesseract: &TesseractConfig) -> Result<()> {
    if let Some(psm) = tesseract.psm {
        validate_tesseract_psm(psm)?;
    }
    if let Some(oem) = tesseract.oem {
        validate_tesseract_oem(oem)?;
    }
    if let Some(min) = tesseract.min_confidence {
        validate_confidence("tesseract_config.min_confidence", min)?;
    }
    if let Some(min) = tesseract.table_min_confidence {
        validate_confidence("tesseract_config.table_min_confidence", min)?;
    }
    if let Some(dpi) = tesseract.preprocessing.as_ref().and_then(|p| p.target_dpi) {
        validate_dpi("preprocessing.target_dpi", dpi)?;
    }
    Ok(())
}

fn validate_images(images: &ImageExtractionConfig) -> Result<()> {
    if let Some(dpi) = images.target_dpi {
        validate_dpi("images.target_dpi", dpi)?;
    }
    if let Some(dpi) = images.min_dpi {
        validate_dpi("images.min_dpi", dpi)?;
    }
    if let Some(dpi) = images.max_dpi {
        validate_dpi("images.max_dpi", dpi)?;
    }
    if let (Some(min), Some(max)) = (images.min_dpi, images.max_dpi) {
        if min > max {
            return Err(GatewayError::validation(format!(
                "images.min_dpi ({min}) must not exceed images.max_dpi ({max})"
            )));
        }
    }
    Ok(())
}

fn validate_keywords(keywords: &KeywordConfig) -> Result<()> {
    if keywords.max_keywords == Some(0) {
        return Err(GatewayError::validation("max_keywords must be greater than 0"));
    }
    if let Some(score) = keywords.min_score {
        validate_confidence("keywords.min_score", score)?;
    }
    if let Some([min, max]) = keywords.ngram_range {
        if min == 0 || min > max {
            return Err(GatewayError::validation(format!(
                "ngram_range must satisfy 1 <= min <= max, got [{min}, {max}]"
            )));
        }
    }
    Ok(())
}
