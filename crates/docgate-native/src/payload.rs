//! Payloads copied out of native result handles.

use std::ffi::CStr;

/// One in-memory document handed to a batch call.
#[derive(Debug, Clone, Copy)]
pub struct NativeBytes<'a> {
    pub data: &'a [u8],
    pub mime_type: &'a CStr,
}

impl<'a> NativeBytes<'a> {
    pub fn new(data: &'a [u8], mime_type: &'a CStr) -> Self {
        Self { data, mime_type }
    }
}

/// Managed copy of a native extraction result.
///
/// The header (content, MIME type) is always present. Every `*_json` field
/// is an independently encoded sub-document that the engine may omit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    pub content: String,
    pub mime_type: String,
    /// Legacy scalar kept for older engines that do not put it in metadata.
    pub language: Option<String>,
    /// Legacy scalar kept for older engines that do not put it in metadata.
    pub subject: Option<String>,
    pub tables_json: Option<String>,
    pub detected_languages_json: Option<String>,
    pub metadata_json: Option<String>,
    pub chunks_json: Option<String>,
    pub images_json: Option<String>,
    pub page_structure_json: Option<String>,
    pub pages_json: Option<String>,
    pub elements_json: Option<String>,
    pub ocr_elements_json: Option<String>,
}

impl RawResult {
    /// Create a result with only the header populated.
    pub fn new(content: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            mime_type: mime_type.into(),
            ..Default::default()
        }
    }
}

/// Managed copy of a native batch.
///
/// Slot `i` corresponds to input `i`. `None` marks an item the engine
/// recorded as failed. A batch the engine failed as a whole has no handle,
/// so there is no batch-level status to carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub items: Vec<Option<RawResult>>,
}

impl RawBatch {
    /// Number of slots, failed ones included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Indices of slots the engine recorded as failed.
    pub fn failed_slots(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.is_none().then_some(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_result_new_has_only_header() {
        let raw = RawResult::new("hello", "text/plain");
        assert_eq!(raw.content, "hello");
        assert_eq!(raw.mime_type, "text/plain");
        assert!(raw.language.is_none());
        assert!(raw.metadata_json.is_none());
    }

    #[test]
    fn test_failed_slots() {
        let batch = RawBatch {
            items: vec![Some(RawResult::new("a", "text/plain")), None, None],
        };
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.failed_slots(), vec![1, 2]);
    }
}
