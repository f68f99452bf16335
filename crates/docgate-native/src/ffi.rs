//! `extern "C"` binding to the compiled extraction engine (libkreuzberg_ffi).

use std::ffi::{CStr, c_char};
use std::ptr;

use tracing::debug;

use crate::{
    BatchHandle, ConfigHandle, NativeBytes, NativeEngine, RawBatch, RawResult, ResultHandle,
    StringHandle,
};

/// `CExtractionResult`: 14 pointers + bool + 7 bytes padding (120 bytes).
#[repr(C)]
struct CExtractionResult {
    content: *mut c_char,
    mime_type: *mut c_char,
    language: *mut c_char,
    _date: *mut c_char,
    subject: *mut c_char,
    tables_json: *mut c_char,
    detected_languages_json: *mut c_char,
    metadata_json: *mut c_char,
    chunks_json: *mut c_char,
    images_json: *mut c_char,
    page_structure_json: *mut c_char,
    pages_json: *mut c_char,
    elements_json: *mut c_char,
    ocr_elements_json: *mut c_char,
    _success: bool,
    _padding1: [u8; 7],
}

/// `CBatchResult`: results array + count + bool + padding (24 bytes).
#[repr(C)]
struct CBatchResult {
    results: *mut *mut CExtractionResult,
    count: usize,
    _success: bool,
    _padding2: [u8; 7],
}

/// `CBytesWithMime`: caller keeps ownership of both pointers.
#[repr(C)]
struct CBytesWithMime {
    data: *const u8,
    data_len: usize,
    mime_type: *const c_char,
}

/// Engine-side `ExtractionConfig`, never dereferenced here.
#[repr(C)]
struct CExtractionConfig {
    _private: [u8; 0],
}

#[link(name = "kreuzberg_ffi")]
unsafe extern "C" {
    fn kreuzberg_last_error() -> *const c_char;
    fn kreuzberg_last_error_code() -> i32;
    fn kreuzberg_last_panic_context() -> *mut c_char;
    fn kreuzberg_version() -> *const c_char;
    fn kreuzberg_free_string(ptr: *mut c_char);
    fn kreuzberg_free_result(result: *mut CExtractionResult);
    fn kreuzberg_free_batch_result(batch: *mut CBatchResult);
    fn kreuzberg_extract_file_sync(path: *const c_char) -> *mut CExtractionResult;
    fn kreuzberg_extract_file_sync_with_config(
        path: *const c_char,
        config_json: *const c_char,
    ) -> *mut CExtractionResult;
    fn kreuzberg_extract_bytes_sync(
        data: *const u8,
        data_len: usize,
        mime_type: *const c_char,
    ) -> *mut CExtractionResult;
    fn kreuzberg_extract_bytes_sync_with_config(
        data: *const u8,
        data_len: usize,
        mime_type: *const c_char,
        config_json: *const c_char,
    ) -> *mut CExtractionResult;
    fn kreuzberg_batch_extract_files_sync(
        paths: *const *const c_char,
        count: usize,
        config_json: *const c_char,
    ) -> *mut CBatchResult;
    fn kreuzberg_batch_extract_bytes_sync(
        items: *const CBytesWithMime,
        count: usize,
        config_json: *const c_char,
    ) -> *mut CBatchResult;
    fn kreuzberg_detect_mime_type_from_bytes(data: *const u8, data_len: usize) -> *mut c_char;
    fn kreuzberg_detect_mime_type_from_path(path: *const c_char) -> *mut c_char;
    fn kreuzberg_get_extensions_for_mime(mime_type: *const c_char) -> *mut c_char;
    fn kreuzberg_validate_mime_type(mime_type: *const c_char) -> *mut c_char;
    fn kreuzberg_load_extraction_config_from_file(path: *const c_char) -> *mut c_char;
    fn kreuzberg_list_embedding_presets() -> *mut c_char;
    fn kreuzberg_get_embedding_preset(name: *const c_char) -> *mut c_char;
    fn kreuzberg_config_from_json(json_config: *const c_char) -> *mut CExtractionConfig;
    fn kreuzberg_config_free(config: *mut CExtractionConfig);
    fn kreuzberg_config_is_valid(json_config: *const c_char) -> i32;
    fn kreuzberg_config_to_json(config: *const CExtractionConfig) -> *mut c_char;
    fn kreuzberg_config_get_field(
        config: *const CExtractionConfig,
        field_name: *const c_char,
    ) -> *mut c_char;
    fn kreuzberg_config_merge(
        base: *mut CExtractionConfig,
        override_config: *const CExtractionConfig,
    ) -> i32;
    fn kreuzberg_validate_binarization_method(method: *const c_char) -> i32;
    fn kreuzberg_validate_ocr_backend(backend: *const c_char) -> i32;
    fn kreuzberg_validate_language_code(code: *const c_char) -> i32;
    fn kreuzberg_validate_token_reduction_level(level: *const c_char) -> i32;
    fn kreuzberg_validate_output_format(format: *const c_char) -> i32;
    fn kreuzberg_get_valid_binarization_methods() -> *mut c_char;
    fn kreuzberg_get_valid_language_codes() -> *mut c_char;
    fn kreuzberg_get_valid_ocr_backends() -> *mut c_char;
    fn kreuzberg_get_valid_token_reduction_levels() -> *mut c_char;
    fn kreuzberg_error_code_count() -> u32;
    fn kreuzberg_error_code_name(code: u32) -> *const c_char;
    fn kreuzberg_error_code_description(code: u32) -> *const c_char;
}

/// Engine backed by the linked `libkreuzberg_ffi`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfiEngine;

impl FfiEngine {
    pub fn new() -> Self {
        Self
    }
}

fn config_ptr(config_json: Option<&CStr>) -> *const c_char {
    config_json.map_or(ptr::null(), CStr::as_ptr)
}

/// Copy a possibly-null C string.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
unsafe fn copy_opt(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// # Safety
/// `res` must point to a live `CExtractionResult`.
unsafe fn copy_result(res: *const CExtractionResult) -> RawResult {
    let res = unsafe { &*res };
    unsafe {
        RawResult {
            content: copy_opt(res.content).unwrap_or_default(),
            mime_type: copy_opt(res.mime_type).unwrap_or_default(),
            language: copy_opt(res.language),
            subject: copy_opt(res.subject),
            tables_json: copy_opt(res.tables_json),
            detected_languages_json: copy_opt(res.detected_languages_json),
            metadata_json: copy_opt(res.metadata_json),
            chunks_json: copy_opt(res.chunks_json),
            images_json: copy_opt(res.images_json),
            page_structure_json: copy_opt(res.page_structure_json),
            pages_json: copy_opt(res.pages_json),
            elements_json: copy_opt(res.elements_json),
            ocr_elements_json: copy_opt(res.ocr_elements_json),
        }
    }
}

impl NativeEngine for FfiEngine {
    fn extract_file(&self, path: &CStr, config_json: Option<&CStr>) -> Option<ResultHandle> {
        let raw = unsafe {
            match config_json {
                Some(cfg) => kreuzberg_extract_file_sync_with_config(path.as_ptr(), cfg.as_ptr()),
                None => kreuzberg_extract_file_sync(path.as_ptr()),
            }
        };
        unsafe { ResultHandle::from_ptr(raw) }
    }

    fn extract_bytes(
        &self,
        data: &[u8],
        mime_type: &CStr,
        config_json: Option<&CStr>,
    ) -> Option<ResultHandle> {
        let raw = unsafe {
            match config_json {
                Some(cfg) => kreuzberg_extract_bytes_sync_with_config(
                    data.as_ptr(),
                    data.len(),
                    mime_type.as_ptr(),
                    cfg.as_ptr(),
                ),
                None => kreuzberg_extract_bytes_sync(data.as_ptr(), data.len(), mime_type.as_ptr()),
            }
        };
        unsafe { ResultHandle::from_ptr(raw) }
    }

    fn batch_extract_files(&self, paths: &[&CStr], config_json: Option<&CStr>) -> Option<BatchHandle> {
        let ptrs: Vec<*const c_char> = paths.iter().map(|p| p.as_ptr()).collect();
        debug!("Native batch over {} paths", ptrs.len());
        let raw = unsafe {
            kreuzberg_batch_extract_files_sync(ptrs.as_ptr(), ptrs.len(), config_ptr(config_json))
        };
        unsafe { BatchHandle::from_ptr(raw) }
    }

    fn batch_extract_bytes(
        &self,
        items: &[NativeBytes<'_>],
        config_json: Option<&CStr>,
    ) -> Option<BatchHandle> {
        let c_items: Vec<CBytesWithMime> = items
            .iter()
            .map(|item| CBytesWithMime {
                data: item.data.as_ptr(),
                data_len: item.data.len(),
                mime_type: item.mime_type.as_ptr(),
            })
            .collect();
        debug!("Native batch over {} byte buffers", c_items.len());
        let raw = unsafe {
            kreuzberg_batch_extract_bytes_sync(c_items.as_ptr(), c_items.len(), config_ptr(config_json))
        };
        unsafe { BatchHandle::from_ptr(raw) }
    }

    fn read_result(&self, handle: &ResultHandle) -> RawResult {
        unsafe { copy_result(handle.cast::<CExtractionResult>()) }
    }

    fn read_batch(&self, handle: &BatchHandle) -> RawBatch {
        let batch = unsafe { &*handle.cast::<CBatchResult>() };
        let mut items = Vec::with_capacity(batch.count);
        if !batch.results.is_null() {
            let slots = unsafe { std::slice::from_raw_parts(batch.results, batch.count) };
            for &slot in slots {
                if slot.is_null() {
                    items.push(None);
                } else {
                    items.push(Some(unsafe { copy_result(slot) }));
                }
            }
        }
        RawBatch { items }
    }

    fn free_result(&self, handle: ResultHandle) {
        unsafe { kreuzberg_free_result(handle.cast::<CExtractionResult>()) }
    }

    fn free_batch(&self, handle: BatchHandle) {
        unsafe { kreuzberg_free_batch_result(handle.cast::<CBatchResult>()) }
    }

    fn config_from_json(&self, json: &CStr) -> Option<ConfigHandle> {
        let raw = unsafe { kreuzberg_config_from_json(json.as_ptr()) };
        unsafe { ConfigHandle::from_ptr(raw) }
    }

    fn config_free(&self, handle: ConfigHandle) {
        unsafe { kreuzberg_config_free(handle.cast::<CExtractionConfig>()) }
    }

    fn config_to_json(&self, handle: &ConfigHandle) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_config_to_json(handle.cast::<CExtractionConfig>()) };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn config_get_field(&self, handle: &ConfigHandle, field_path: &CStr) -> Option<StringHandle> {
        let raw = unsafe {
            kreuzberg_config_get_field(handle.cast::<CExtractionConfig>(), field_path.as_ptr())
        };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn config_merge(&self, base: &ConfigHandle, overlay: &ConfigHandle) -> bool {
        let rc = unsafe {
            kreuzberg_config_merge(
                base.cast::<CExtractionConfig>(),
                overlay.cast::<CExtractionConfig>(),
            )
        };
        rc == 1
    }

    fn config_is_valid(&self, json: &CStr) -> bool {
        unsafe { kreuzberg_config_is_valid(json.as_ptr()) == 1 }
    }

    fn load_config_file(&self, path: &CStr) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_load_extraction_config_from_file(path.as_ptr()) };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn detect_mime_type(&self, data: &[u8]) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_detect_mime_type_from_bytes(data.as_ptr(), data.len()) };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn detect_mime_type_from_path(&self, path: &CStr) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_detect_mime_type_from_path(path.as_ptr()) };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn validate_mime_type(&self, mime_type: &CStr) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_validate_mime_type(mime_type.as_ptr()) };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn extensions_for_mime(&self, mime_type: &CStr) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_get_extensions_for_mime(mime_type.as_ptr()) };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn list_embedding_presets(&self) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_list_embedding_presets() };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn embedding_preset(&self, name: &CStr) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_get_embedding_preset(name.as_ptr()) };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn validate_binarization_method(&self, method: &CStr) -> bool {
        unsafe { kreuzberg_validate_binarization_method(method.as_ptr()) == 1 }
    }

    fn validate_ocr_backend(&self, backend: &CStr) -> bool {
        unsafe { kreuzberg_validate_ocr_backend(backend.as_ptr()) == 1 }
    }

    fn validate_language_code(&self, code: &CStr) -> bool {
        unsafe { kreuzberg_validate_language_code(code.as_ptr()) == 1 }
    }

    fn validate_token_reduction_level(&self, level: &CStr) -> bool {
        unsafe { kreuzberg_validate_token_reduction_level(level.as_ptr()) == 1 }
    }

    fn validate_output_format(&self, format: &CStr) -> bool {
        unsafe { kreuzberg_validate_output_format(format.as_ptr()) == 1 }
    }

    fn valid_binarization_methods(&self) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_get_valid_binarization_methods() };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn valid_language_codes(&self) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_get_valid_language_codes() };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn valid_ocr_backends(&self) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_get_valid_ocr_backends() };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn valid_token_reduction_levels(&self) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_get_valid_token_reduction_levels() };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn error_code_count(&self) -> u32 {
        unsafe { kreuzberg_error_code_count() }
    }

    fn error_code_name(&self, code: u32) -> Option<String> {
        // Static engine string; copied, never freed.
        unsafe { copy_opt(kreuzberg_error_code_name(code)) }
    }

    fn error_code_description(&self, code: u32) -> Option<String> {
        unsafe { copy_opt(kreuzberg_error_code_description(code)) }
    }

    fn read_string(&self, handle: &StringHandle) -> String {
        unsafe { copy_opt(handle.cast::<c_char>()) }.unwrap_or_default()
    }

    fn free_string(&self, handle: StringHandle) {
        unsafe { kreuzberg_free_string(handle.cast::<c_char>()) }
    }

    fn last_error_message(&self) -> Option<String> {
        // Borrowed thread-local buffer; copied, never freed.
        unsafe { copy_opt(kreuzberg_last_error()) }
    }

    fn last_error_code(&self) -> i32 {
        unsafe { kreuzberg_last_error_code() }
    }

    fn last_panic_context(&self) -> Option<StringHandle> {
        let raw = unsafe { kreuzberg_last_panic_context() };
        unsafe { StringHandle::from_ptr(raw) }
    }

    fn version(&self) -> String {
        unsafe { copy_opt(kreuzberg_version()) }.unwrap_or_default()
    }
}
