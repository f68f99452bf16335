//! In-process stand-in for the native engine.
//!
//! Tracks every allocation it hands out, panics on double or unknown frees,
//! and records how many calls were ever inside it at the same time. Tests
//! read those records through a [`Monitor`], since the gateway owns the engine.
//!
//! Input conventions:
//! - path `fail:<code>:<message>` fails with that code and message
//! - path `panic:<message>` fails as an internal panic with a panic context
//! - path `badjson:<anything>` succeeds with undecodable metadata
//! - MIME type `fail/<anything>` fails as an unsupported format
//!
//! Accepted-value lists come from the constants below.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::{CStr, c_void};
use std::fs;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use docgate_core::{NativeEngine, StatusCode};
use docgate_native::{
    BatchHandle, ConfigHandle, HandleKind, NativeBytes, NativeHandle, RawBatch, RawResult,
    ResultHandle, StringHandle,
};
use serde_json::{Map, Value};

pub const BINARIZATION_METHODS: [&str; 3] = ["otsu", "adaptive", "sauvola"];
pub const LANGUAGE_CODES: [&str; 4] = ["eng", "deu", "fra", "chi_sim"];
pub const OCR_BACKENDS: [&str; 3] = ["tesseract", "easyocr", "paddleocr"];
pub const TOKEN_REDUCTION_LEVELS: [&str; 5] = ["off", "light", "moderate", "aggressive", "maximum"];
pub const OUTPUT_FORMATS: [&str; 4] = ["plain", "markdown", "djot", "html"];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

enum Allocation {
    Result(RawResult),
    Batch(RawBatch),
    Config(Map<String, Value>),
    Text(String),
}

impl Allocation {
    fn kind(&self) -> &'static str {
        match self {
            Allocation::Result(_) => "result",
            Allocation::Batch(_) => "batch",
            Allocation::Config(_) => "config",
            Allocation::Text(_) => "string",
        }
    }
}

#[derive(Default)]
struct LastError {
    message: Option<String>,
    code: i32,
    panic_context: Option<String>,
}

#[derive(Default)]
struct State {
    next_addr: usize,
    live: HashMap<usize, Allocation>,
    allocated: HashMap<&'static str, usize>,
    released: HashMap<&'static str, usize>,
    last_error: LastError,
    last_config: Option<String>,
}

/// Overlap counters, shareable between engines in one process.
#[derive(Default)]
struct Overlap {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    calls: AtomicUsize,
    call_delay_micros: AtomicUsize,
    empty_presets: AtomicBool,
    malformed_lists: AtomicBool,
    missing_lists: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

/// The engine handed to a gateway. Tests observe it through a [`Monitor`].
#[derive(Default)]
pub struct FakeEngine {
    shared: Arc<Shared>,
    overlap: Arc<Overlap>,
}

/// Read-only view of a [`FakeEngine`] after it moved into a gateway.
///
/// Exposes counters and switches only, never the native call surface.
#[derive(Clone)]
pub struct Monitor {
    shared: Arc<Shared>,
    overlap: Arc<Overlap>,
}

/// Decrements the in-flight counter when a call returns.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Monitor {
    pub fn report_no_presets(&self) {
        self.shared.empty_presets.store(true, Ordering::SeqCst);
    }

    /// Make every accepted-value list come back as undecodable text.
    pub fn report_malformed_lists(&self) {
        self.shared.malformed_lists.store(true, Ordering::SeqCst);
    }

    /// Make every accepted-value list fail with a null return.
    pub fn report_missing_lists(&self) {
        self.shared.missing_lists.store(true, Ordering::SeqCst);
    }

    /// Entry-point calls made so far, excluding reads and frees.
    pub fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.overlap.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn allocated(&self, kind: &str) -> usize {
        self.shared.lock().allocated.get(kind).copied().unwrap_or(0)
    }

    pub fn released(&self, kind: &str) -> usize {
        self.shared.lock().released.get(kind).copied().unwrap_or(0)
    }

    /// Allocations handed out and not yet released.
    pub fn live(&self) -> usize {
        self.shared.lock().live.len()
    }

    /// Config JSON passed to the most recent extraction call.
    pub fn last_config(&self) -> Option<String> {
        self.shared.lock().last_config.clone()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep inside every extraction call, widening any race window.
    pub fn with_call_delay(self, delay: Duration) -> Self {
        self.shared
            .call_delay_micros
            .store(delay.as_micros() as usize, Ordering::SeqCst);
        self
    }

    /// Count overlap together with `other`, as two engines in one process.
    pub fn sharing_overlap_with(mut self, other: &Monitor) -> Self {
        self.overlap = Arc::clone(&other.overlap);
        self
    }

    /// Take a monitor before moving the engine into a gateway.
    pub fn monitor(&self) -> Monitor {
        Monitor {
            shared: Arc::clone(&self.shared),
            overlap: Arc::clone(&self.overlap),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared.lock()
    }

    fn track(&self) -> InFlight<'_> {
        let now = self.overlap.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.overlap.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.overlap.in_flight)
    }

    /// Start an entry-point call: count it and clear the side channel.
    fn begin(&self) -> InFlight<'_> {
        let guard = self.track();
        self.shared.calls.fetch_add(1, Ordering::SeqCst);
        self.lock().last_error = LastError::default();
        guard
    }

    fn pause(&self) {
        let micros = self.shared.call_delay_micros.load(Ordering::SeqCst);
        if micros > 0 {
            thread::sleep(Duration::from_micros(micros as u64));
        }
    }

    fn set_error(&self, code: i32, message: &str) {
        self.lock().last_error = LastError {
            message: Some(message.to_string()),
            code,
            panic_context: None,
        };
    }

    fn alloc<K: HandleKind>(&self, allocation: Allocation) -> NativeHandle<K> {
        let mut state = self.lock();
        state.next_addr += 1;
        let addr = 0x1000 + state.next_addr * 16;
        *state.allocated.entry(allocation.kind()).or_default() += 1;
        state.live.insert(addr, allocation);
        let ptr = NonNull::new(addr as *mut c_void).unwrap();
        unsafe { NativeHandle::from_raw(ptr) }
    }

    fn release<K: HandleKind>(&self, handle: NativeHandle<K>) {
        let _in_flight = self.track();
        let addr = handle.into_raw().as_ptr() as usize;
        let mut state = self.lock();
        let allocation = state
            .live
            .remove(&addr)
            .unwrap_or_else(|| panic!("{} {addr:#x} released twice or never allocated", K::NAME));
        assert_eq!(allocation.kind(), K::NAME, "released with the wrong free function");
        *state.released.entry(K::NAME).or_default() += 1;
    }

    fn with_allocation<K: HandleKind, T>(
        &self,
        handle: &NativeHandle<K>,
        read: impl FnOnce(&mut Allocation) -> T,
    ) -> T {
        let addr = handle.as_ptr() as usize;
        let mut state = self.lock();
        let allocation = state
            .live
            .get_mut(&addr)
            .unwrap_or_else(|| panic!("{} {addr:#x} used after release", K::NAME));
        read(allocation)
    }

    fn string(&self, text: impl Into<String>) -> Option<StringHandle> {
        Some(self.alloc(Allocation::Text(text.into())))
    }

    /// Outcome of extracting one path: a result, or (code, message).
    fn outcome_for_path(&self, path: &str) -> Result<RawResult, (i32, String)> {
        if let Some(rest) = path.strip_prefix("fail:") {
            let (code, message) = rest.split_once(':').unwrap_or(("4", rest));
            return Err((code.parse().unwrap_or(4), message.to_string()));
        }
        if path.starts_with("panic:") {
            return Err((7, path.to_string()));
        }
        let mut raw = RawResult::new(format!("content of {path}"), "text/plain");
        if path.starts_with("badjson:") {
            raw.metadata_json = Some("{broken".to_string());
        } else {
            raw.metadata_json =
                Some(format!(r#"{{"format_type":"text","line_count":1,"word_count":3,"character_count":{}}}"#, path.len() + 11));
        }
        Ok(raw)
    }

    fn fail(&self, code: i32, message: &str) {
        if let Some(panic_message) = message.strip_prefix("panic:") {
            let context = serde_json::json!({
                "file": "src/extract.rs",
                "line": 42,
                "function": "extract_file",
                "message": panic_message,
                "timestamp_secs": 1_700_000_000,
            });
            self.lock().last_error = LastError {
                message: Some(format!("Panic in native call: {panic_message}")),
                code,
                panic_context: Some(context.to_string()),
            };
        } else {
            self.set_error(code, message);
        }
    }

    fn accepts(&self, allowed: &[&str], value: &CStr) -> bool {
        let _in_flight = self.begin();
        allowed.contains(&text(value).as_str())
    }

    fn name_list(&self, names: &[&str]) -> Option<StringHandle> {
        let _in_flight = self.begin();
        if self.shared.missing_lists.load(Ordering::SeqCst) {
            self.set_error(7, "Internal error: list unavailable");
            return None;
        }
        if self.shared.malformed_lists.load(Ordering::SeqCst) {
            return self.string(names.join(","));
        }
        self.string(serde_json::to_string(names).unwrap())
    }

    fn remember_config(&self, config_json: Option<&CStr>) {
        self.lock().last_config = config_json.map(|c| c.to_string_lossy().into_owned());
    }
}

fn text(value: &CStr) -> String {
    value.to_string_lossy().into_owned()
}

impl NativeEngine for FakeEngine {
    fn extract_file(&self, path: &CStr, config_json: Option<&CStr>) -> Option<ResultHandle> {
        let _in_flight = self.begin();
        self.remember_config(config_json);
        let outcome = self.outcome_for_path(&text(path));
        self.pause();
        match outcome {
            Ok(raw) => Some(self.alloc(Allocation::Result(raw))),
            Err((code, message)) => {
                self.fail(code, &message);
                // Another caller overwriting the side channel now would be caught.
                self.pause();
                None
            }
        }
    }

    fn extract_bytes(
        &self,
        data: &[u8],
        mime_type: &CStr,
        config_json: Option<&CStr>,
    ) -> Option<ResultHandle> {
        let _in_flight = self.begin();
        self.remember_config(config_json);
        self.pause();
        let mime = text(mime_type);
        if mime.starts_with("fail/") {
            self.set_error(6, &format!("Unsupported format: {mime}"));
            return None;
        }
        let raw = RawResult::new(String::from_utf8_lossy(data), mime);
        Some(self.alloc(Allocation::Result(raw)))
    }

    fn batch_extract_files(&self, paths: &[&CStr], config_json: Option<&CStr>) -> Option<BatchHandle> {
        let _in_flight = self.begin();
        self.remember_config(config_json);
        self.pause();
        if paths.iter().any(|p| text(p) == "batchfail") {
            self.set_error(1, "Parsing error: batch aborted");
            return None;
        }
        let items = paths
            .iter()
            .map(|p| self.outcome_for_path(&text(p)).ok())
            .collect();
        Some(self.alloc(Allocation::Batch(RawBatch { items })))
    }

    fn batch_extract_bytes(
        &self,
        items: &[NativeBytes<'_>],
        config_json: Option<&CStr>,
    ) -> Option<BatchHandle> {
        let _in_flight = self.begin();
        self.remember_config(config_json);
        self.pause();
        let items = items
            .iter()
            .map(|item| {
                let mime = text(item.mime_type);
                (!mime.starts_with("fail/"))
                    .then(|| RawResult::new(String::from_utf8_lossy(item.data), mime))
            })
            .collect();
        Some(self.alloc(Allocation::Batch(RawBatch { items })))
    }

    fn read_result(&self, handle: &ResultHandle) -> RawResult {
        let _in_flight = self.track();
        self.with_allocation(handle, |a| match a {
            Allocation::Result(raw) => raw.clone(),
            _ => panic!("not a result"),
        })
    }

    fn read_batch(&self, handle: &BatchHandle) -> RawBatch {
        let _in_flight = self.track();
        self.with_allocation(handle, |a| match a {
            Allocation::Batch(raw) => raw.clone(),
            _ => panic!("not a batch"),
        })
    }

    fn free_result(&self, handle: ResultHandle) {
        self.release(handle);
    }

    fn free_batch(&self, handle: BatchHandle) {
        self.release(handle);
    }

    fn config_from_json(&self, json: &CStr) -> Option<ConfigHandle> {
        let _in_flight = self.begin();
        match serde_json::from_str::<Value>(&text(json)) {
            Ok(Value::Object(map)) => Some(self.alloc(Allocation::Config(map))),
            Ok(_) => {
                self.set_error(0, "Validation error: config must be an object");
                None
            }
            Err(e) => {
                self.set_error(0, &format!("Validation error: invalid config JSON: {e}"));
                None
            }
        }
    }

    fn config_free(&self, handle: ConfigHandle) {
        self.release(handle);
    }

    fn config_to_json(&self, handle: &ConfigHandle) -> Option<StringHandle> {
        let _in_flight = self.begin();
        let json = self.with_allocation(handle, |a| match a {
            Allocation::Config(map) => Value::Object(map.clone()).to_string(),
            _ => panic!("not a config"),
        });
        self.string(json)
    }

    fn config_get_field(&self, handle: &ConfigHandle, field_path: &CStr) -> Option<StringHandle> {
        let _in_flight = self.begin();
        let path = text(field_path);
        let value = self.with_allocation(handle, |a| match a {
            Allocation::Config(map) => {
                let mut parts = path.split('.');
                let first = map.get(parts.next()?)?;
                parts.try_fold(first, |value, part| value.get(part)).cloned()
            }
            _ => panic!("not a config"),
        });
        match value {
            Some(value) => self.string(value.to_string()),
            None => {
                self.set_error(0, &format!("Field not found: {path}"));
                None
            }
        }
    }

    fn config_merge(&self, base: &ConfigHandle, overlay: &ConfigHandle) -> bool {
        let _in_flight = self.begin();
        let overlay = self.with_allocation(overlay, |a| match a {
            Allocation::Config(map) => map.clone(),
            _ => panic!("not a config"),
        });
        self.with_allocation(base, |a| match a {
            Allocation::Config(map) => map.extend(overlay),
            _ => panic!("not a config"),
        });
        true
    }

    fn config_is_valid(&self, json: &CStr) -> bool {
        let _in_flight = self.begin();
        matches!(serde_json::from_str::<Value>(&text(json)), Ok(Value::Object(_)))
    }

    fn load_config_file(&self, path: &CStr) -> Option<StringHandle> {
        let _in_flight = self.begin();
        let path = text(path);
        match fs::read_to_string(&path) {
            Ok(contents) if Path::new(&path).extension().is_some_and(|e| e == "json") => {
                self.string(contents)
            }
            // Only JSON files are understood here; other formats load as empty.
            Ok(_) => self.string("{}"),
            Err(e) => {
                self.set_error(4, &format!("IO error: {e}"));
                None
            }
        }
    }

    fn detect_mime_type(&self, data: &[u8]) -> Option<StringHandle> {
        let _in_flight = self.begin();
        if data.starts_with(b"%PDF") {
            self.string("application/pdf")
        } else {
            self.string("text/plain")
        }
    }

    fn detect_mime_type_from_path(&self, path: &CStr) -> Option<StringHandle> {
        let _in_flight = self.begin();
        let path = text(path);
        match Path::new(&path).extension().and_then(|e| e.to_str()) {
            Some("pdf") => self.string("application/pdf"),
            Some("txt") => self.string("text/plain"),
            other => {
                self.set_error(6, &format!("Unsupported format: {}", other.unwrap_or("")));
                None
            }
        }
    }

    fn validate_mime_type(&self, mime_type: &CStr) -> Option<StringHandle> {
        let _in_flight = self.begin();
        let mime = text(mime_type).to_ascii_lowercase();
        if mime == "application/pdf" || mime == "text/plain" {
            self.string(mime)
        } else {
            self.set_error(6, &format!("Unsupported format: {mime}"));
            None
        }
    }

    fn extensions_for_mime(&self, mime_type: &CStr) -> Option<StringHandle> {
        let _in_flight = self.begin();
        match text(mime_type).as_str() {
            "application/pdf" => self.string(r#"["pdf"]"#),
            "text/plain" => self.string(r#"["txt","text"]"#),
            "broken/list" => self.string("not a list"),
            other => {
                self.set_error(6, &format!("Unsupported format: {other}"));
                None
            }
        }
    }

    fn list_embedding_presets(&self) -> Option<StringHandle> {
        let _in_flight = self.begin();
        if self.shared.empty_presets.load(Ordering::SeqCst) {
            self.string("")
        } else {
            self.string(r#"["balanced","fast"]"#)
        }
    }

    fn embedding_preset(&self, name: &CStr) -> Option<StringHandle> {
        let _in_flight = self.begin();
        match text(name).as_str() {
            "fast" => self.string(
                r#"{"name":"fast","chunk_size":512,"overlap":50,"model_name":"AllMiniLML6V2Q","dimensions":384,"description":"Fast and small"}"#,
            ),
            other => {
                self.set_error(0, &format!("Validation error: unknown embedding preset '{other}'"));
                None
            }
        }
    }

    fn validate_binarization_method(&self, method: &CStr) -> bool {
        self.accepts(&BINARIZATION_METHODS, method)
    }

    fn validate_ocr_backend(&self, backend: &CStr) -> bool {
        self.accepts(&OCR_BACKENDS, backend)
    }

    fn validate_language_code(&self, code: &CStr) -> bool {
        self.accepts(&LANGUAGE_CODES, code)
    }

    fn validate_token_reduction_level(&self, level: &CStr) -> bool {
        self.accepts(&TOKEN_REDUCTION_LEVELS, level)
    }

    fn validate_output_format(&self, format: &CStr) -> bool {
        self.accepts(&OUTPUT_FORMATS, format)
    }

    fn valid_binarization_methods(&self) -> Option<StringHandle> {
        self.name_list(&BINARIZATION_METHODS)
    }

    fn valid_language_codes(&self) -> Option<StringHandle> {
        self.name_list(&LANGUAGE_CODES)
    }

    fn valid_ocr_backends(&self) -> Option<StringHandle> {
        self.name_list(&OCR_BACKENDS)
    }

    fn valid_token_reduction_levels(&self) -> Option<StringHandle> {
        self.name_list(&TOKEN_REDUCTION_LEVELS)
    }

    fn error_code_count(&self) -> u32 {
        let _in_flight = self.track();
        StatusCode::ALL.len() as u32
    }

    fn error_code_name(&self, code: u32) -> Option<String> {
        let _in_flight = self.track();
        let code = StatusCode::from_raw(i32::try_from(code).ok()?)?;
        Some(code.name().to_string())
    }

    fn error_code_description(&self, code: u32) -> Option<String> {
        let _in_flight = self.track();
        let code = StatusCode::from_raw(i32::try_from(code).ok()?)?;
        Some(code.description().to_string())
    }

    fn read_string(&self, handle: &StringHandle) -> String {
        let _in_flight = self.track();
        self.with_allocation(handle, |a| match a {
            Allocation::Text(text) => text.clone(),
            _ => panic!("not a string"),
        })
    }

    fn free_string(&self, handle: StringHandle) {
        self.release(handle);
    }

    fn last_error_message(&self) -> Option<String> {
        let _in_flight = self.track();
        self.lock().last_error.message.clone()
    }

    fn last_error_code(&self) -> i32 {
        let _in_flight = self.track();
        self.lock().last_error.code
    }

    fn last_panic_context(&self) -> Option<StringHandle> {
        let _in_flight = self.track();
        let context = self.lock().last_error.panic_context.clone()?;
        self.string(context)
    }

    fn version(&self) -> String {
        "4.0.0-fake".to_string()
    }
}
