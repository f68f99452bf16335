//! Extraction configuration handed to the native engine.
//!
//! Every leaf is an `Option`: `None` defers to the engine default, while
//! `Some(false)` / `Some(0)` explicitly sets the value. Absent leaves are
//! omitted from the JSON payload; there is no explicit-null encoding.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Root of one extraction request's settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Cache results for identical inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_cache: Option<bool>,

    /// Apply quality improvements (deskew, denoise, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_quality_processing: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr: Option<OcrConfig>,

    /// Run OCR even on documents with a text layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_ocr: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunking: Option<ChunkingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageExtractionConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_options: Option<PdfConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_reduction: Option<TokenReductionConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_detection: Option<LanguageDetectionConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<KeywordConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub postprocessor: Option<PostProcessorConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_options: Option<HtmlConversionOptions>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<PageConfig>,

    /// Upper bound on extractions the engine runs at once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_extractions: Option<usize>,
}

/// OCR backend selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Backend name, e.g. "tesseract".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    /// Language code, e.g. "eng".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(rename = "tesseract_config", skip_serializing_if = "Option::is_none")]
    pub tesseract: Option<TesseractConfig>,
}

/// Tesseract-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TesseractConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Page segmentation mode (0-13).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psm: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,

    /// OCR engine mode (0-3).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oem: Option<i32>,

    /// Minimum confidence for accepted text (0.0 - 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocessing: Option<ImagePreprocessingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_table_detection: Option<bool>,

    /// Minimum confidence for table detection (0.0 - 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_min_confidence: Option<f64>,

    /// Pixel threshold for column detection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_column_threshold: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_row_threshold_ratio: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_cache: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tessedit_enable_dict_correction: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tessedit_char_whitelist: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tessedit_char_blacklist: Option<String>,
}

/// Image normalization before OCR.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagePreprocessingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dpi: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_rotate: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deskew: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoise: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast_enhance: Option<bool>,

    #[serde(rename = "binarization_method", skip_serializing_if = "Option::is_none")]
    pub binarization_mode: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub invert_colors: Option<bool>,
}

/// Text chunking for retrieval pipelines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_chars: Option<usize>,

    /// Maximum overlap between chunks, in characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_overlap: Option<usize>,

    /// Target chunk size, in characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,

    /// Overlap between consecutive chunks, in characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_overlap: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Embedding generation for chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<EmbeddingModel>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalize: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_download_progress: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
}

/// Embedding model selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingModel {
    /// Model family, e.g. "preset" or "custom".
    #[serde(rename = "type")]
    pub model_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

/// A built-in embedding preset as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingPreset {
    pub name: String,
    pub chunk_size: usize,
    pub overlap: usize,
    pub model_name: String,
    pub dimensions: usize,
    pub description: String,
}

/// Image extraction from PDFs and office documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageExtractionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_images: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dpi: Option<i32>,

    /// Longest side of an extracted image, in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_image_dimension: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_adjust_dpi: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_dpi: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_dpi: Option<i32>,
}

/// Font provider for PDF extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontConfig {
    pub enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_font_dirs: Option<Vec<String>>,
}

/// PDF-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_images: Option<bool>,

    /// Passwords tried in order on encrypted documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passwords: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_metadata: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_config: Option<FontConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenReductionConfig {
    /// Strategy, e.g. "off", "light", "moderate", "aggressive".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_important_words: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetectionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Minimum detection confidence (0.0 - 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detect_multiple: Option<bool>,
}

/// Keyword extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordConfig {
    /// "yake" or "rake".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_keywords: Option<usize>,

    /// Minimum candidate score (0.0 - 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,

    /// Inclusive `[min, max]` n-gram size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ngram_range: Option<[usize; 2]>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(rename = "yake_params", skip_serializing_if = "Option::is_none")]
    pub yake: Option<YakeParams>,

    #[serde(rename = "rake_params", skip_serializing_if = "Option::is_none")]
    pub rake: Option<RakeParams>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YakeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RakeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_word_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_words_per_phrase: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostProcessorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Processors to run, replacing the default set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_processors: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_processors: Option<Vec<String>>,
}

/// HTML to Markdown conversion knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HtmlConversionOptions {
    /// "atx", "atx_closed" or "underlined".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_style: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_indent_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_indent_width: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bullets: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub strong_em_symbol: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub escape_asterisks: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub escape_underscores: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub autolinks: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_metadata: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitespace_mode: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_width: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub strip_tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocessing: Option<HtmlPreprocessingOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HtmlPreprocessingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_navigation: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_forms: Option<bool>,
}

/// Page tracking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_pages: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_page_markers: Option<bool>,

    /// Marker template, e.g. "<!-- page {page_num} -->".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_format: Option<String>,
}

impl ExtractionConfig {
    /// Parse a configuration from its JSON payload.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Err(GatewayError::validation("config JSON cannot be empty"));
        }
        serde_json::from_str(json)
            .map_err(|e| GatewayError::serialization("failed to parse config JSON", e))
    }

    /// Encode as the boundary payload. Absent leaves are omitted.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| GatewayError::serialization("failed to encode config", e))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GatewayError::serialization("failed to encode config", e))
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Overlay `overrides` onto `base`.
    ///
    /// Shallow at sub-tree granularity: a top-level scalar or sub-tree present
    /// in `overrides` replaces the base value wholesale; nothing inside a
    /// sub-tree is merged.
    pub fn merge(base: &Self, overrides: &Self) -> Self {
        fn pick<T: Clone>(base: &Option<T>, overrides: &Option<T>) -> Option<T> {
            overrides.as_ref().or(base.as_ref()).cloned()
        }

        Self {
            use_cache: pick(&base.use_cache, &overrides.use_cache),
            enable_quality_processing: pick(
                &base.enable_quality_processing,
                &overrides.enable_quality_processing,
            ),
            ocr: pick(&base.ocr, &overrides.ocr),
            force_ocr: pick(&base.force_ocr, &overrides.force_ocr),
            chunking: pick(&base.chunking, &overrides.chunking),
            images: pick(&base.images, &overrides.images),
            pdf_options: pick(&base.pdf_options, &overrides.pdf_options),
            token_reduction: pick(&base.token_reduction, &overrides.token_reduction),
            language_detection: pick(&base.language_detection, &overrides.language_detection),
            keywords: pick(&base.keywords, &overrides.keywords),
            postprocessor: pick(&base.postprocessor, &overrides.postprocessor),
            html_options: pick(&base.html_options, &overrides.html_options),
            pages: pick(&base.pages, &overrides.pages),
            max_concurrent_extractions: pick(
                &base.max_concurrent_extractions,
                &overrides.max_concurrent_extractions,
            ),
        }
    }

    /// Whether no leaf is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
