//! Error types for the docgate gateway.

use std::fmt;

use chrono::{DateTime, Utc};
use docgate_native::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of error kinds the gateway reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid input or configuration.
    Validation,
    /// The document could not be parsed.
    Parsing,
    /// OCR processing failed.
    Ocr,
    /// Cache read or write failed.
    Cache,
    /// Image processing failed.
    ImageProcessing,
    /// A payload crossing the boundary could not be encoded or decoded.
    Serialization,
    /// A required system dependency is missing.
    MissingDependency {
        /// Dependency name, empty when the message did not name one.
        dependency: String,
    },
    /// A plugin failed to register or run.
    Plugin {
        /// Plugin name, empty when the message did not name one.
        plugin: String,
    },
    /// The MIME type or document format is not supported.
    UnsupportedFormat {
        /// Format name, empty when the message did not name one.
        format: String,
    },
    /// File system or I/O failure.
    Io,
    /// Internal engine failure, unknown status codes, cancellation.
    Runtime,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Parsing => "parsing",
            ErrorKind::Ocr => "ocr",
            ErrorKind::Cache => "cache",
            ErrorKind::ImageProcessing => "image_processing",
            ErrorKind::Serialization => "serialization",
            ErrorKind::MissingDependency { .. } => "missing_dependency",
            ErrorKind::Plugin { .. } => "plugin",
            ErrorKind::UnsupportedFormat { .. } => "unsupported_format",
            ErrorKind::Io => "io",
            ErrorKind::Runtime => "runtime",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Diagnostic record left behind when a native call panicked.
///
/// Meant for logs and bug reports, not for end users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanicContext {
    pub file: String,
    pub line: u32,
    pub function: String,
    pub message: String,
    /// Seconds since the Unix epoch.
    pub timestamp_secs: i64,
}

impl PanicContext {
    /// Timestamp of the panic, if representable.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp_secs, 0)
    }
}

impl fmt::Display for PanicContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} in {}: {}", self.file, self.line, self.function, self.message)
    }
}

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the gateway.
///
/// Exactly one [`ErrorKind`] per error. Errors produced by a failed native
/// call also carry the native [`StatusCode`] (when it was in the documented
/// set) and, if the call panicked, a [`PanicContext`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct GatewayError {
    kind: ErrorKind,
    message: String,
    code: Option<StatusCode>,
    panic_context: Option<PanicContext>,
    #[source]
    source: Option<BoxedSource>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            panic_context: None,
            source: None,
        }
    }

    /// Invalid input detected before any native call.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// A payload failed to decode. The cause is appended to the message.
    pub fn serialization<S>(message: impl Into<String>, source: S) -> Self
    where
        S: std::error::Error + Send + Sync + 'static,
    {
        let message = format!("{}: {}", message.into(), source);
        Self::new(ErrorKind::Serialization, message).with_source(source)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    /// The caller cancelled before the call entered the critical section.
    pub fn cancelled() -> Self {
        Self::runtime(CANCELLED_MESSAGE)
    }

    pub(crate) fn with_code(mut self, code: Option<StatusCode>) -> Self {
        self.code = code;
        self
    }

    pub(crate) fn with_panic_context(mut self, panic_context: Option<PanicContext>) -> Self {
        self.panic_context = panic_context;
        self
    }

    pub fn with_source<S>(mut self, source: S) -> Self
    where
        S: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Native status code, `None` for errors raised on the managed side.
    pub fn code(&self) -> Option<StatusCode> {
        self.code
    }

    pub fn panic_context(&self) -> Option<&PanicContext> {
        self.panic_context.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Runtime && self.code.is_none() && self.message == CANCELLED_MESSAGE
    }
}

const CANCELLED_MESSAGE: &str = "operation cancelled";

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization, err.to_string()).with_source(err)
    }
}

/// Result type for the gateway.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_is_message() {
        let err = GatewayError::validation("chunk_overlap must be less than chunk_size");
        assert_eq!(err.to_string(), "chunk_overlap must be less than chunk_size");
        assert_eq!(err.kind(), &ErrorKind::Validation);
        assert!(err.code().is_none());
    }

    #[test]
    fn test_serialization_keeps_cause() {
        let cause = serde_json::from_str::<Vec<u32>>("{").unwrap_err();
        let err = GatewayError::serialization("failed to decode tables", cause);
        assert_eq!(err.kind(), &ErrorKind::Serialization);
        assert!(err.message().starts_with("failed to decode tables: "));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_cancelled() {
        let err = GatewayError::cancelled();
        assert!(err.is_cancelled());
        assert_eq!(err.kind(), &ErrorKind::Runtime);
        assert!(!GatewayError::runtime("boom").is_cancelled());
    }

    #[test]
    fn test_panic_context_format() {
        let ctx = PanicContext {
            file: "src/extract.rs".to_string(),
            line: 42,
            function: "extract_pdf".to_string(),
            message: "index out of bounds".to_string(),
            timestamp_secs: 1_700_000_000,
        };
        assert_eq!(ctx.to_string(), "src/extract.rs:42 in extract_pdf: index out of bounds");
        assert_eq!(ctx.timestamp().map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn test_io_conversion() {
        let err: GatewayError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind(), &ErrorKind::Io);
    }
}
