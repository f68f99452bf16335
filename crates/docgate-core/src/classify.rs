//! Turns a native failure signal into one typed [`GatewayError`].
//!
//! Classification is total: every input yields an error, nothing here can
//! fail. Names carried by the structured kinds are extracted best-effort and
//! left empty when the message does not match.

use docgate_native::StatusCode;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::error::{ErrorKind, GatewayError, PanicContext};

lazy_static! {
    // "Missing dependency: tesseract", "Unsupported format: application/x-foo"
    static ref AFTER_COLON: Option<Regex> = Regex::new(r":\s*(.*?)\s*$").ok();

    // "Plugin error in 'custom-ocr'"
    static ref SINGLE_QUOTED: Option<Regex> = Regex::new(r"'([^']*)'").ok();
}

/// Everything the last-call side channel reported for one failed call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeFailure {
    pub message: Option<String>,
    pub code: i32,
    /// Raw panic-context JSON, if the engine recorded one.
    pub panic_context: Option<String>,
}

/// Classify a failed native call.
pub fn classify(failure: &NativeFailure) -> GatewayError {
    let message = match failure.message.as_deref().map(str::trim) {
        Some(msg) if !msg.is_empty() => msg.to_string(),
        _ => "unknown error".to_string(),
    };
    let code = StatusCode::from_raw(failure.code);
    let panic_context = failure.panic_context.as_deref().and_then(parse_panic_context);

    let kind = match code {
        Some(StatusCode::Validation) => ErrorKind::Validation,
        Some(StatusCode::Parsing) => ErrorKind::Parsing,
        Some(StatusCode::Ocr) => ErrorKind::Ocr,
        Some(StatusCode::MissingDependency) => ErrorKind::MissingDependency {
            dependency: text_after_colon(&message),
        },
        Some(StatusCode::Io) => ErrorKind::Io,
        Some(StatusCode::Plugin) => ErrorKind::Plugin {
            plugin: quoted_name(&message),
        },
        Some(StatusCode::UnsupportedFormat) => ErrorKind::UnsupportedFormat {
            format: text_after_colon(&message),
        },
        Some(StatusCode::Internal) | None => ErrorKind::Runtime,
    };

    warn!(kind = kind.name(), code = failure.code, "Native call failed: {}", message);
    if let Some(ctx) = &panic_context {
        warn!(
            file = %ctx.file,
            line = ctx.line,
            function = %ctx.function,
            "Native call panicked: {}",
            ctx.message
        );
    }

    GatewayError::new(kind, message)
        .with_code(code)
        .with_panic_context(panic_context)
}

/// Parse the engine's panic-context JSON. Malformed records are dropped.
pub fn parse_panic_context(json: &str) -> Option<PanicContext> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

fn text_after_colon(message: &str) -> String {
    AFTER_COLON
        .as_ref()
        .and_then(|re| re.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn quoted_name(message: &str) -> String {
    SINGLE_QUOTED
        .as_ref()
        .and_then(|re| re.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn failure(message: &str, code: i32) -> NativeFailure {
        NativeFailure {
            message: Some(message.to_string()),
            code,
            panic_context: None,
        }
    }

    #[test]
    fn test_every_documented_code_maps_to_its_kind() {
        let cases = [
            (0, "validation"),
            (1, "parsing"),
            (2, "ocr"),
            (3, "missing_dependency"),
            (4, "io"),
            (5, "plugin"),
            (6, "unsupported_format"),
            (7, "runtime"),
        ];
        for (code, kind) in cases {
            let err = classify(&failure("boom", code));
            assert_eq!(err.kind().name(), kind, "code {code}");
            assert_eq!(err.code().map(StatusCode::as_raw), Some(code));
        }
    }

    #[test]
    fn test_unknown_code_falls_back_to_runtime() {
        let err = classify(&failure("boom", 42));
        assert_eq!(err.kind(), &ErrorKind::Runtime);
        assert!(err.code().is_none());
    }

    #[test]
    fn test_missing_dependency_name() {
        let err = classify(&failure("Missing dependency: tesseract", 3));
        assert_eq!(
            err.kind(),
            &ErrorKind::MissingDependency {
                dependency: "tesseract".to_string()
            }
        );
    }

    #[test]
    fn test_dependency_name_without_colon_is_empty() {
        let err = classify(&failure("tesseract not installed", 3));
        assert_eq!(
            err.kind(),
            &ErrorKind::MissingDependency {
                dependency: String::new()
            }
        );
    }

    #[test]
    fn test_plugin_name_between_quotes() {
        let err = classify(&failure("Plugin error in 'custom-ocr': init failed", 5));
        assert_eq!(
            err.kind(),
            &ErrorKind::Plugin {
                plugin: "custom-ocr".to_string()
            }
        );

        let err = classify(&failure("Plugin error in custom", 5));
        assert_eq!(err.kind(), &ErrorKind::Plugin { plugin: String::new() });
    }

    #[test]
    fn test_unsupported_format_name() {
        let err = classify(&failure("Unsupported format: application/x-foo", 6));
        assert_eq!(
            err.kind(),
            &ErrorKind::UnsupportedFormat {
                format: "application/x-foo".to_string()
            }
        );
    }

    #[test]
    fn test_empty_message_becomes_unknown_error() {
        let err = classify(&NativeFailure {
            message: Some("   ".to_string()),
            code: 1,
            panic_context: None,
        });
        assert_eq!(err.message(), "unknown error");
        assert_eq!(err.kind(), &ErrorKind::Parsing);

        let err = classify(&NativeFailure::default());
        assert_eq!(err.message(), "unknown error");
        assert_eq!(err.kind(), &ErrorKind::Validation);
    }

    #[test]
    fn test_panic_context_attached() {
        let err = classify(&NativeFailure {
            message: Some("panic in extractor".to_string()),
            code: 7,
            panic_context: Some(
                r#"{"file":"lib.rs","line":10,"function":"run","message":"oops","timestamp_secs":1700000000}"#
                    .to_string(),
            ),
        });
        let ctx = err.panic_context().unwrap();
        assert_eq!(ctx.file, "lib.rs");
        assert_eq!(ctx.line, 10);
        assert_eq!(ctx.function, "run");
    }

    #[test]
    fn test_malformed_panic_context_is_ignored() {
        let err = classify(&NativeFailure {
            message: Some("boom".to_string()),
            code: 7,
            panic_context: Some("not json".to_string()),
        });
        assert!(err.panic_context().is_none());
        assert_eq!(err.kind(), &ErrorKind::Runtime);
    }
}
