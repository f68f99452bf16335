//! Public entry points into the native engine.
//!
//! Every method follows the same shape: validate and encode inputs on the
//! managed side, enter the critical section, make the native call, copy the
//! output out and release the handle, leave the critical section, then decode.

use std::env;
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use docgate_native::{
    BatchHandle, NativeBytes, NativeEngine, RawBatch, RawResult, ResultHandle, StatusCode,
    StringHandle,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::critical::{self, NativeSession};
use crate::error::{GatewayError, PanicContext, Result};
use crate::materialize::{decode_batch, decode_result};
use crate::models::config::{EmbeddingPreset, ExtractionConfig};
use crate::models::result::ExtractionResult;

/// Config file names looked for in each directory, in order.
pub const CONFIG_FILE_NAMES: [&str; 4] =
    ["docgate.toml", "docgate.yaml", "docgate.yml", "docgate.json"];

/// Cooperative cancellation, honored only before a call enters the engine.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(GatewayError::cancelled());
        }
        Ok(())
    }
}

/// One in-memory document for a batch call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BytesWithMime {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl BytesWithMime {
    pub fn new(data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

fn c_string(what: &str, value: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| GatewayError::validation(format!("{what} contains an interior NUL byte")))
}

fn path_string(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| GatewayError::validation(format!("path is not valid UTF-8: {}", path.display())))
}

/// Validate and encode an optional config. Runs before any native call.
fn encode_config(config: Option<&ExtractionConfig>) -> Result<Option<CString>> {
    let Some(config) = config else {
        return Ok(None);
    };
    config.validate()?;
    let json = config.to_json()?;
    c_string("config JSON", &json).map(Some)
}

fn decode_json<T: DeserializeOwned>(json: &str, what: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| GatewayError::serialization(format!("failed to decode {what}"), e))
}

/// Serialized access to one native engine.
///
/// The gateway takes ownership of the engine and never hands it back out, so
/// every call into it goes through the process-wide critical section. All
/// gateways share that one section, so two gateways over the same library
/// never call into it concurrently either.
///
/// The engine cannot be borrowed back from a gateway:
///
/// ```compile_fail
/// fn bypass<E: docgate_core::NativeEngine>(gateway: &docgate_core::Gateway<E>) {
///     let _ = gateway.engine();
/// }
/// ```
///
/// and the critical section is not reachable from outside the crate:
///
/// ```compile_fail
/// fn bypass<E: docgate_core::NativeEngine>(engine: &E) {
///     let _session = docgate_core::critical::enter(engine);
/// }
/// ```
pub struct Gateway<E: NativeEngine> {
    engine: E,
}

impl<E: NativeEngine> Gateway<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    fn session(&self) -> NativeSession<'_, E> {
        critical::enter(&self.engine)
    }

    /// Run one result-returning native call and copy its payload out.
    fn call_result<F>(&self, call: F) -> Result<RawResult>
    where
        F: FnOnce(&E) -> Option<ResultHandle>,
    {
        let session = self.session();
        session.with_handle(call, |handle| Ok(session.engine().read_result(handle)))
    }

    /// Run one batch-returning native call and copy every slot out.
    fn call_batch<F>(&self, expected: usize, call: F) -> Result<RawBatch>
    where
        F: FnOnce(&E) -> Option<BatchHandle>,
    {
        let raw = {
            let session = self.session();
            session.with_handle(call, |handle| Ok(session.engine().read_batch(handle)))?
        };
        if raw.len() != expected {
            return Err(GatewayError::runtime(format!(
                "engine returned {} results for {} inputs",
                raw.len(),
                expected
            )));
        }
        Ok(raw)
    }

    /// Run one string-returning native call.
    fn call_string<F>(&self, call: F) -> Result<String>
    where
        F: FnOnce(&E) -> Option<StringHandle>,
    {
        let session = self.session();
        session.take_string(call(session.engine()))
    }

    /// Extract a document from disk.
    pub fn extract_file(
        &self,
        path: impl AsRef<Path>,
        config: Option<&ExtractionConfig>,
    ) -> Result<ExtractionResult> {
        let path = path_string(path.as_ref())?;
        if path.is_empty() {
            return Err(GatewayError::validation("path is required"));
        }
        let c_config = encode_config(config)?;
        let c_path = c_string("path", path)?;

        debug!(path, "Extracting file");
        let raw = self.call_result(|engine| engine.extract_file(&c_path, c_config.as_deref()))?;
        decode_result(&raw)
    }

    /// Extract an in-memory document of the given MIME type.
    pub fn extract_bytes(
        &self,
        data: &[u8],
        mime_type: &str,
        config: Option<&ExtractionConfig>,
    ) -> Result<ExtractionResult> {
        if mime_type.is_empty() {
            return Err(GatewayError::validation("mime_type is required"));
        }
        let c_config = encode_config(config)?;
        let c_mime = c_string("mime_type", mime_type)?;

        debug!(len = data.len(), mime_type, "Extracting bytes");
        let raw = self
            .call_result(|engine| engine.extract_bytes(data, &c_mime, c_config.as_deref()))?;
        decode_result(&raw)
    }

    /// Extract several files in one native call.
    ///
    /// Slot `i` of the output belongs to `paths[i]`; `None` marks an item the
    /// engine failed on.
    pub fn batch_extract_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        config: Option<&ExtractionConfig>,
    ) -> Result<Vec<Option<ExtractionResult>>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let c_config = encode_config(config)?;
        let c_paths = paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let path = path_string(path.as_ref())?;
                if path.is_empty() {
                    return Err(GatewayError::validation(format!("path at index {i} is empty")));
                }
                c_string("path", path)
            })
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<_> = c_paths.iter().map(CString::as_c_str).collect();

        debug!(count = refs.len(), "Extracting file batch");
        let raw = self.call_batch(refs.len(), |engine| {
            engine.batch_extract_files(&refs, c_config.as_deref())
        })?;
        decode_batch(&raw)
    }

    /// Extract several in-memory documents in one native call.
    pub fn batch_extract_bytes(
        &self,
        items: &[BytesWithMime],
        config: Option<&ExtractionConfig>,
    ) -> Result<Vec<Option<ExtractionResult>>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let c_config = encode_config(config)?;
        let c_mimes = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                if item.data.is_empty() {
                    return Err(GatewayError::validation(format!("data at index {i} is empty")));
                }
                if item.mime_type.is_empty() {
                    return Err(GatewayError::validation(format!(
                        "mime_type at index {i} is empty"
                    )));
                }
                c_string("mime_type", &item.mime_type)
            })
            .collect::<Result<Vec<_>>>()?;
        let native_items: Vec<_> = items
            .iter()
            .zip(&c_mimes)
            .map(|(item, mime)| NativeBytes::new(&item.data, mime))
            .collect();

        debug!(count = native_items.len(), "Extracting byte batch");
        let raw = self.call_batch(native_items.len(), |engine| {
            engine.batch_extract_bytes(&native_items, c_config.as_deref())
        })?;
        decode_batch(&raw)
    }

    pub fn extract_file_cancellable(
        &self,
        path: impl AsRef<Path>,
        config: Option<&ExtractionConfig>,
        cancel: &CancellationFlag,
    ) -> Result<ExtractionResult> {
        cancel.check()?;
        self.extract_file(path, config)
    }

    pub fn extract_bytes_cancellable(
        &self,
        data: &[u8],
        mime_type: &str,
        config: Option<&ExtractionConfig>,
        cancel: &CancellationFlag,
    ) -> Result<ExtractionResult> {
        cancel.check()?;
        self.extract_bytes(data, mime_type, config)
    }

    pub fn batch_extract_files_cancellable<P: AsRef<Path>>(
        &self,
        paths: &[P],
        config: Option<&ExtractionConfig>,
        cancel: &CancellationFlag,
    ) -> Result<Vec<Option<ExtractionResult>>> {
        cancel.check()?;
        self.batch_extract_files(paths, config)
    }

    pub fn batch_extract_bytes_cancellable(
        &self,
        items: &[BytesWithMime],
        config: Option<&ExtractionConfig>,
        cancel: &CancellationFlag,
    ) -> Result<Vec<Option<ExtractionResult>>> {
        cancel.check()?;
        self.batch_extract_bytes(items, config)
    }

    /// Detect a MIME type from magic bytes.
    pub fn detect_mime_type(&self, data: &[u8]) -> Result<String> {
        if data.is_empty() {
            return Err(GatewayError::validation("data cannot be empty"));
        }
        self.call_string(|engine| engine.detect_mime_type(data))
    }

    /// Detect a MIME type from a path's extension and content.
    pub fn detect_mime_type_from_path(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path_string(path.as_ref())?;
        if path.is_empty() {
            return Err(GatewayError::validation("path cannot be empty"));
        }
        let c_path = c_string("path", path)?;
        self.call_string(|engine| engine.detect_mime_type_from_path(&c_path))
    }

    /// Normalize a MIME type; unsupported types fail.
    pub fn validate_mime_type(&self, mime_type: &str) -> Result<String> {
        if mime_type.is_empty() {
            return Err(GatewayError::validation("mime_type cannot be empty"));
        }
        let c_mime = c_string("mime_type", mime_type)?;
        self.call_string(|engine| engine.validate_mime_type(&c_mime))
    }

    pub fn extensions_for_mime(&self, mime_type: &str) -> Result<Vec<String>> {
        if mime_type.is_empty() {
            return Err(GatewayError::validation("mime_type cannot be empty"));
        }
        let c_mime = c_string("mime_type", mime_type)?;
        let json = self.call_string(|engine| engine.extensions_for_mime(&c_mime))?;
        decode_json(&json, "extensions list")
    }

    pub fn list_embedding_presets(&self) -> Result<Vec<String>> {
        let json = self.call_string(|engine| engine.list_embedding_presets())?;
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        decode_json(&json, "preset names")
    }

    pub fn embedding_preset(&self, name: &str) -> Result<EmbeddingPreset> {
        if name.is_empty() {
            return Err(GatewayError::validation("preset name cannot be empty"));
        }
        let c_name = c_string("preset name", name)?;
        let json = self.call_string(|engine| engine.embedding_preset(&c_name))?;
        decode_json(&json, "embedding preset")
    }

    /// Ask the engine whether it accepts `value` as a `what`.
    fn check_name<F>(&self, what: &str, value: &str, accepts: F) -> Result<()>
    where
        F: FnOnce(&E, &CStr) -> bool,
    {
        if value.is_empty() {
            return Err(GatewayError::validation(format!("{what} cannot be empty")));
        }
        let c_value = c_string(what, value)?;
        if !accepts(self.session().engine(), &c_value) {
            return Err(GatewayError::validation(format!("invalid {what}: {value}")));
        }
        Ok(())
    }

    /// Fetch one of the engine's accepted-value lists.
    fn name_list<F>(&self, what: &str, call: F) -> Result<Vec<String>>
    where
        F: FnOnce(&E) -> Option<StringHandle>,
    {
        let json = self.call_string(call)?;
        serde_json::from_str(&json)
            .map_err(|e| GatewayError::serialization(format!("failed to parse {what} list"), e))
    }

    pub fn validate_binarization_method(&self, method: &str) -> Result<()> {
        self.check_name("binarization method", method, |engine, value| {
            engine.validate_binarization_method(value)
        })
    }

    pub fn validate_ocr_backend(&self, backend: &str) -> Result<()> {
        self.check_name("OCR backend", backend, |engine, value| {
            engine.validate_ocr_backend(value)
        })
    }

    pub fn validate_language_code(&self, code: &str) -> Result<()> {
        self.check_name("language code", code, |engine, value| {
            engine.validate_language_code(value)
        })
    }

    pub fn validate_token_reduction_level(&self, level: &str) -> Result<()> {
        self.check_name("token reduction level", level, |engine, value| {
            engine.validate_token_reduction_level(value)
        })
    }

    pub fn validate_output_format(&self, format: &str) -> Result<()> {
        self.check_name("output format", format, |engine, value| {
            engine.validate_output_format(value)
        })
    }

    pub fn valid_binarization_methods(&self) -> Result<Vec<String>> {
        self.name_list("binarization methods", |engine| engine.valid_binarization_methods())
    }

    pub fn valid_language_codes(&self) -> Result<Vec<String>> {
        self.name_list("language codes", |engine| engine.valid_language_codes())
    }

    pub fn valid_ocr_backends(&self) -> Result<Vec<String>> {
        self.name_list("OCR backends", |engine| engine.valid_ocr_backends())
    }

    pub fn valid_token_reduction_levels(&self) -> Result<Vec<String>> {
        self.name_list("token reduction levels", |engine| engine.valid_token_reduction_levels())
    }

    /// Number of status codes the linked engine defines.
    pub fn error_code_count(&self) -> u32 {
        self.session().engine().error_code_count()
    }

    /// The engine's name for a status code, `"unknown"` if it has none.
    pub fn error_code_name(&self, code: u32) -> String {
        self.session()
            .engine()
            .error_code_name(code)
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// The engine's description of a status code.
    pub fn error_code_description(&self, code: u32) -> String {
        self.session()
            .engine()
            .error_code_description(code)
            .unwrap_or_else(|| "Unknown error code".to_string())
    }

    /// Version of the linked engine.
    pub fn library_version(&self) -> String {
        self.session().engine().version()
    }

    /// Status code left by the most recent native call in the process.
    ///
    /// Only meaningful right after a failed call. Codes outside the
    /// documented set are `None`.
    pub fn last_error_code(&self) -> Option<StatusCode> {
        StatusCode::from_raw(self.session().engine().last_error_code())
    }

    /// Panic context left by the most recent native call, if it panicked.
    pub fn last_panic_context(&self) -> Option<PanicContext> {
        let json = {
            let session = self.session();
            let handle = session.engine().last_panic_context()?;
            session.take_string(Some(handle)).ok()?
        };
        crate::classify::parse_panic_context(&json)
    }

    /// Parse a TOML, YAML or JSON config file with the engine's loader.
    pub fn load_config_file(&self, path: impl AsRef<Path>) -> Result<ExtractionConfig> {
        let path = path_string(path.as_ref())?;
        if path.is_empty() {
            return Err(GatewayError::validation("config path cannot be empty"));
        }
        let c_path = c_string("config path", path)?;
        let json = self.call_string(|engine| engine.load_config_file(&c_path))?;
        decode_json(&json, "config JSON")
    }

    /// Find and load the nearest config file, walking up from the working
    /// directory. `Ok(None)` when there is none.
    pub fn discover_config(&self) -> Result<Option<ExtractionConfig>> {
        let cwd = env::current_dir()?;
        self.discover_config_from(&cwd)
    }

    /// Like [`discover_config`](Self::discover_config), starting at `start`.
    pub fn discover_config_from(&self, start: &Path) -> Result<Option<ExtractionConfig>> {
        match find_config_file(start) {
            Some(path) => {
                info!(path = %path.display(), "Found config file");
                self.load_config_file(&path).map(Some)
            }
            None => {
                debug!(start = %start.display(), "No config file found");
                Ok(None)
            }
        }
    }

    /// Parse a JSON config through the engine, then decode it locally.
    pub fn parse_config(&self, json: &str) -> Result<ExtractionConfig> {
        if json.trim().is_empty() {
            return Err(GatewayError::validation("config JSON cannot be empty"));
        }
        let c_json = c_string("config JSON", json)?;
        {
            let session = self.session();
            session.with_handle(|engine| engine.config_from_json(&c_json), |_| Ok(()))?;
        }
        decode_json(json, "config JSON")
    }

    /// Whether the engine accepts `json` as a configuration.
    pub fn config_is_valid(&self, json: &str) -> bool {
        if json.trim().is_empty() {
            return false;
        }
        let Ok(c_json) = c_string("config JSON", json) else {
            return false;
        };
        self.session().engine().config_is_valid(&c_json)
    }

    /// Serialize a config the way the engine sees it, defaults included.
    pub fn config_to_json(&self, config: &ExtractionConfig) -> Result<String> {
        let c_json = c_string("config JSON", &config.to_json()?)?;
        let session = self.session();
        session.with_handle(
            |engine| engine.config_from_json(&c_json),
            |config| session.take_string(session.engine().config_to_json(config)),
        )
    }

    /// Look up a field by dotted path (e.g. `"ocr.backend"`).
    pub fn config_get_field(
        &self,
        config: &ExtractionConfig,
        field_path: &str,
    ) -> Result<serde_json::Value> {
        if field_path.is_empty() {
            return Err(GatewayError::validation("field name cannot be empty"));
        }
        let c_json = c_string("config JSON", &config.to_json()?)?;
        let c_field = c_string("field name", field_path)?;

        let json = {
            let session = self.session();
            session.with_handle(
                |engine| engine.config_from_json(&c_json),
                |config| match session.engine().config_get_field(config, &c_field) {
                    Some(value) => session.take_string(Some(value)),
                    None => Err(GatewayError::validation(format!(
                        "field not found: {field_path}"
                    ))),
                },
            )?
        };
        decode_json(&json, "field value")
    }

    /// Merge `overrides` into `base` with the engine's merge rules.
    pub fn config_merge_native(
        &self,
        base: &ExtractionConfig,
        overrides: &ExtractionConfig,
    ) -> Result<ExtractionConfig> {
        let c_base = c_string("config JSON", &base.to_json()?)?;
        let c_overrides = c_string("config JSON", &overrides.to_json()?)?;

        let json = {
            let session = self.session();
            let base = session.acquire(session.engine().config_from_json(&c_base))?;
            let overrides = session.acquire(session.engine().config_from_json(&c_overrides))?;
            if !session.engine().config_merge(&base, &overrides) {
                return Err(session.fail());
            }
            session.take_string(session.engine().config_to_json(&base))?
        };
        decode_json(&json, "merged config")
    }
}

impl<E: NativeEngine + 'static> Gateway<E> {
    /// Run a blocking gateway call on the blocking pool.
    async fn spawn<T, F>(self: &Arc<Self>, cancel: &CancellationFlag, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Gateway<E>) -> Result<T> + Send + 'static,
    {
        cancel.check()?;
        let gateway = Arc::clone(self);
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            cancel.check()?;
            call(&gateway)
        })
        .await
        .map_err(|e| GatewayError::runtime(format!("blocking task failed: {e}")).with_source(e))?
    }

    pub async fn extract_file_async(
        self: &Arc<Self>,
        path: impl Into<PathBuf>,
        config: Option<ExtractionConfig>,
        cancel: &CancellationFlag,
    ) -> Result<ExtractionResult> {
        let path = path.into();
        self.spawn(cancel, move |gateway| gateway.extract_file(&path, config.as_ref()))
            .await
    }

    pub async fn extract_bytes_async(
        self: &Arc<Self>,
        data: Vec<u8>,
        mime_type: impl Into<String>,
        config: Option<ExtractionConfig>,
        cancel: &CancellationFlag,
    ) -> Result<ExtractionResult> {
        let mime_type = mime_type.into();
        self.spawn(cancel, move |gateway| {
            gateway.extract_bytes(&data, &mime_type, config.as_ref())
        })
        .await
    }

    pub async fn batch_extract_files_async(
        self: &Arc<Self>,
        paths: Vec<PathBuf>,
        config: Option<ExtractionConfig>,
        cancel: &CancellationFlag,
    ) -> Result<Vec<Option<ExtractionResult>>> {
        self.spawn(cancel, move |gateway| {
            gateway.batch_extract_files(&paths, config.as_ref())
        })
        .await
    }

    pub async fn batch_extract_bytes_async(
        self: &Arc<Self>,
        items: Vec<BytesWithMime>,
        config: Option<ExtractionConfig>,
        cancel: &CancellationFlag,
    ) -> Result<Vec<Option<ExtractionResult>>> {
        self.spawn(cancel, move |gateway| {
            gateway.batch_extract_bytes(&items, config.as_ref())
        })
        .await
    }
}

/// Nearest config file at or above `start`.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}
