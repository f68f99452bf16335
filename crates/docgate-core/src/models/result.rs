//! Managed extraction results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::models::metadata::Metadata;

/// One materialized extraction.
///
/// Collections are `None` when the engine did not produce them and
/// `Some(vec![])` when it produced an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub content: String,
    pub mime_type: String,
    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<Table>>,

    /// Languages detected in the content, most likely first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_languages: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<Chunk>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ExtractedImage>>,

    /// Per-page content, when page extraction was enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageContent>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<Element>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_elements: Option<Vec<OcrElement>>,
}

/// A metadata lookup by top-level key.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataField {
    pub name: String,
    pub value: Option<Value>,
    /// True when the key is absent or explicitly null.
    pub is_null: bool,
}

impl ExtractionResult {
    /// Number of pages, 0 when the engine reported no page structure.
    pub fn page_count(&self) -> usize {
        self.metadata.pages.as_ref().map_or(0, |p| p.total_count)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.as_ref().map_or(0, Vec::len)
    }

    /// Primary language from metadata, else the first detected language.
    pub fn detected_language(&self) -> Option<&str> {
        self.metadata.language.as_deref().or_else(|| {
            self.detected_languages
                .as_ref()
                .and_then(|langs| langs.first())
                .map(String::as_str)
        })
    }

    /// Look up a top-level metadata key as it appears on the wire.
    pub fn metadata_field(&self, name: &str) -> Result<MetadataField> {
        if name.is_empty() {
            return Err(GatewayError::validation("field name cannot be empty"));
        }
        let metadata = serde_json::to_value(&self.metadata)
            .map_err(|e| GatewayError::serialization("failed to encode metadata", e))?;
        let value = metadata.get(name).filter(|v| !v.is_null()).cloned();
        Ok(MetadataField {
            name: name.to_string(),
            is_null: value.is_none(),
            value,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| GatewayError::serialization("failed to encode result", e))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Err(GatewayError::validation("result JSON cannot be empty"));
        }
        serde_json::from_str(json)
            .map_err(|e| GatewayError::serialization("failed to decode result JSON", e))
    }
}

impl fmt::Display for ExtractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExtractionResult {{ mime_type: {}, content_len: {}, tables: {}, chunks: {} }}",
            self.mime_type,
            self.content.len(),
            self.tables.as_ref().map_or(0, Vec::len),
            self.chunk_count()
        )
    }
}

/// A table found in the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub cells: Vec<Vec<String>>,
    pub markdown: String,
    pub page_number: usize,
}

/// A chunk of content, optionally with its embedding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkMetadata {
    pub byte_start: usize,
    pub byte_end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_page: Option<usize>,
}

/// An image pulled out of the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedImage {
    /// Encoded image bytes.
    pub data: Vec<u8>,
    /// Encoding, e.g. "png" or "jpeg".
    pub format: String,
    pub image_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorspace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits_per_component: Option<u32>,
    #[serde(default)]
    pub is_mask: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// OCR run on the image itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_result: Option<Box<ExtractionResult>>,
}

/// Content of one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub page_number: usize,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<Table>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ExtractedImage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<PageHierarchy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageHierarchy {
    pub block_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<HierarchicalBlock>>,
}

/// A text block with its inferred heading level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalBlock {
    pub text: String,
    pub font_size: f32,
    /// "h1" .. "h6" or "body".
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f32; 4]>,
}

/// Semantic element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Title,
    NarrativeText,
    Heading,
    ListItem,
    Table,
    Image,
    PageBreak,
    CodeBlock,
    BlockQuote,
    Footer,
    Header,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional: Option<BTreeMap<String, String>>,
}

/// A semantic element of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub element_id: String,
    pub element_type: ElementType,
    pub text: String,
    #[serde(default)]
    pub metadata: ElementMetadata,
}

/// Where an OCR element sits on the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrBoundingGeometry {
    /// "rectangle" or "quadrilateral".
    #[serde(rename = "type")]
    pub geometry_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognition: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrRotation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_degrees: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// One recognized unit of text (word, line, block) with its geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrElement {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<OcrBoundingGeometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<OcrConfidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<OcrRotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_metadata: Option<serde_json::Map<String, Value>>,
}
