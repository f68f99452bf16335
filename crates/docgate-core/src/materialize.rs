//! Decoding of copied-out native payloads into managed results.
//!
//! Decoding is all-or-nothing: one malformed sub-payload fails the whole
//! result, and one failed result fails the whole batch.

use docgate_native::{RawBatch, RawResult};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::models::metadata::{Metadata, PageStructure};
use crate::models::result::ExtractionResult;

/// Decode one embedded JSON sub-document. Absent or empty means `None`.
fn decode_part<T: DeserializeOwned>(json: Option<&str>, what: &str) -> Result<Option<T>> {
    match json.map(str::trim) {
        None | Some("") | Some("null") => Ok(None),
        Some(text) => serde_json::from_str(text)
            .map(Some)
            .map_err(|e| GatewayError::serialization(format!("failed to decode {what}"), e)),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Decode a single native result.
pub fn decode_result(raw: &RawResult) -> Result<ExtractionResult> {
    let tables = decode_part(raw.tables_json.as_deref(), "tables")?;
    let detected_languages =
        decode_part(raw.detected_languages_json.as_deref(), "detected languages")?;
    let mut metadata: Metadata =
        decode_part(raw.metadata_json.as_deref(), "metadata")?.unwrap_or_default();

    // Older engines report these only as scalar fields.
    if metadata.language.is_none() {
        metadata.language = non_empty(raw.language.as_deref());
    }
    if metadata.subject.is_none() {
        metadata.subject = non_empty(raw.subject.as_deref());
    }
    let page_structure: Option<PageStructure> =
        decode_part(raw.page_structure_json.as_deref(), "page structure")?;
    if metadata.pages.is_none() {
        metadata.pages = page_structure;
    }

    Ok(ExtractionResult {
        content: raw.content.clone(),
        mime_type: raw.mime_type.clone(),
        metadata,
        tables,
        detected_languages,
        chunks: decode_part(raw.chunks_json.as_deref(), "chunks")?,
        images: decode_part(raw.images_json.as_deref(), "images")?,
        pages: decode_part(raw.pages_json.as_deref(), "pages")?,
        elements: decode_part(raw.elements_json.as_deref(), "elements")?,
        ocr_elements: decode_part(raw.ocr_elements_json.as_deref(), "ocr elements")?,
    })
}

/// Decode a native batch, slot for slot.
///
/// A `None` slot is an item the engine already recorded as failed and stays
/// `None`. The output always has as many slots as the batch.
pub fn decode_batch(raw: &RawBatch) -> Result<Vec<Option<ExtractionResult>>> {
    debug!(
        count = raw.len(),
        failed = ?raw.failed_slots(),
        "Decoding native batch"
    );
    raw.items
        .iter()
        .map(|slot| slot.as_ref().map(decode_result).transpose())
        .collect()
}
