//! The native engine's call surface.

use std::ffi::CStr;

use crate::{BatchHandle, ConfigHandle, NativeBytes, RawBatch, RawResult, ResultHandle, StringHandle};

/// Trait for native extraction engines.
///
/// Every method maps to one entry point of the compiled engine. Allocating
/// calls return `None` when the engine signals failure with a null return;
/// the reason is then available through the last-call side channel
/// ([`last_error_message`](Self::last_error_message),
/// [`last_error_code`](Self::last_error_code),
/// [`last_panic_context`](Self::last_panic_context)) until the next call.
///
/// Implementations are NOT expected to be safe for concurrent invocation.
/// Callers must serialize all calls, including reads of the side channel.
/// Calling an engine directly bypasses that; hand it to a gateway instead.
pub trait NativeEngine: Send + Sync {
    /// Extract a document from a filesystem path.
    fn extract_file(&self, path: &CStr, config_json: Option<&CStr>) -> Option<ResultHandle>;

    /// Extract an in-memory document of the given MIME type.
    fn extract_bytes(
        &self,
        data: &[u8],
        mime_type: &CStr,
        config_json: Option<&CStr>,
    ) -> Option<ResultHandle>;

    /// Extract several files in one call.
    fn batch_extract_files(&self, paths: &[&CStr], config_json: Option<&CStr>) -> Option<BatchHandle>;

    /// Extract several in-memory documents in one call.
    fn batch_extract_bytes(
        &self,
        items: &[NativeBytes<'_>],
        config_json: Option<&CStr>,
    ) -> Option<BatchHandle>;

    /// Copy the payload of a live result handle into managed memory.
    fn read_result(&self, handle: &ResultHandle) -> RawResult;

    /// Copy every slot of a live batch handle into managed memory.
    fn read_batch(&self, handle: &BatchHandle) -> RawBatch;

    /// Release a single result.
    fn free_result(&self, handle: ResultHandle);

    /// Release a batch, including every per-item result it owns.
    fn free_batch(&self, handle: BatchHandle);

    /// Parse a JSON configuration into a native configuration object.
    fn config_from_json(&self, json: &CStr) -> Option<ConfigHandle>;

    /// Release a native configuration object.
    fn config_free(&self, handle: ConfigHandle);

    /// Serialize a native configuration object back to JSON.
    fn config_to_json(&self, handle: &ConfigHandle) -> Option<StringHandle>;

    /// Look up a field by dotted path, returned as JSON text.
    fn config_get_field(&self, handle: &ConfigHandle, field_path: &CStr) -> Option<StringHandle>;

    /// Merge `overlay` into `base` in place. Returns `false` on failure.
    fn config_merge(&self, base: &ConfigHandle, overlay: &ConfigHandle) -> bool;

    /// Whether the JSON text parses as a valid configuration.
    fn config_is_valid(&self, json: &CStr) -> bool;

    /// Parse a TOML/YAML/JSON config file, returned as JSON text.
    fn load_config_file(&self, path: &CStr) -> Option<StringHandle>;

    /// Detect a MIME type from magic bytes.
    fn detect_mime_type(&self, data: &[u8]) -> Option<StringHandle>;

    /// Detect a MIME type from a path (extension and content).
    fn detect_mime_type_from_path(&self, path: &CStr) -> Option<StringHandle>;

    /// Normalize a MIME type, failing if it is unsupported.
    fn validate_mime_type(&self, mime_type: &CStr) -> Option<StringHandle>;

    /// File extensions for a MIME type, as a JSON array.
    fn extensions_for_mime(&self, mime_type: &CStr) -> Option<StringHandle>;

    /// Names of the built-in embedding presets, as a JSON array.
    fn list_embedding_presets(&self) -> Option<StringHandle>;

    /// One embedding preset, as a JSON object.
    fn embedding_preset(&self, name: &CStr) -> Option<StringHandle>;

    /// Whether the engine knows this image binarization method.
    fn validate_binarization_method(&self, method: &CStr) -> bool;

    /// Whether the engine has this OCR backend.
    fn validate_ocr_backend(&self, backend: &CStr) -> bool;

    /// Whether the engine accepts this OCR language code.
    fn validate_language_code(&self, code: &CStr) -> bool;

    /// Whether the engine knows this token reduction level.
    fn validate_token_reduction_level(&self, level: &CStr) -> bool;

    /// Whether the engine can render this output format.
    fn validate_output_format(&self, format: &CStr) -> bool;

    /// Accepted binarization methods, as a JSON array.
    fn valid_binarization_methods(&self) -> Option<StringHandle>;

    /// Accepted OCR language codes, as a JSON array.
    fn valid_language_codes(&self) -> Option<StringHandle>;

    /// Available OCR backends, as a JSON array.
    fn valid_ocr_backends(&self) -> Option<StringHandle>;

    /// Accepted token reduction levels, as a JSON array.
    fn valid_token_reduction_levels(&self) -> Option<StringHandle>;

    /// Number of status codes the engine defines.
    fn error_code_count(&self) -> u32;

    /// Name of a status code, `None` if the engine does not define it.
    /// The engine keeps ownership of the text; it is copied, never freed.
    fn error_code_name(&self, code: u32) -> Option<String>;

    /// Description of a status code, `None` if the engine does not define it.
    fn error_code_description(&self, code: u32) -> Option<String>;

    /// Copy a native string into managed memory.
    fn read_string(&self, handle: &StringHandle) -> String;

    /// Release a native string.
    fn free_string(&self, handle: StringHandle);

    /// Message recorded by the last failing call.
    fn last_error_message(&self) -> Option<String>;

    /// Raw status code recorded by the last failing call.
    fn last_error_code(&self) -> i32;

    /// Panic context (JSON) recorded by the last call, if it panicked.
    fn last_panic_context(&self) -> Option<StringHandle>;

    /// Version of the compiled engine.
    fn version(&self) -> String;
}
