//! Status codes reported through the engine's last-call side channel.

use std::fmt;

/// Closed set of failure codes the engine reports.
///
/// Success is never reported as a code: a call succeeded iff it returned a
/// non-null handle (or `true`). The code is only meaningful right after a
/// failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    Validation = 0,
    Parsing = 1,
    Ocr = 2,
    MissingDependency = 3,
    Io = 4,
    Plugin = 5,
    UnsupportedFormat = 6,
    Internal = 7,
}

impl StatusCode {
    /// Every code, in wire order.
    pub const ALL: [StatusCode; 8] = [
        StatusCode::Validation,
        StatusCode::Parsing,
        StatusCode::Ocr,
        StatusCode::MissingDependency,
        StatusCode::Io,
        StatusCode::Plugin,
        StatusCode::UnsupportedFormat,
        StatusCode::Internal,
    ];

    /// Map a raw wire value; values outside the set map to `None`.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(StatusCode::Validation),
            1 => Some(StatusCode::Parsing),
            2 => Some(StatusCode::Ocr),
            3 => Some(StatusCode::MissingDependency),
            4 => Some(StatusCode::Io),
            5 => Some(StatusCode::Plugin),
            6 => Some(StatusCode::UnsupportedFormat),
            7 => Some(StatusCode::Internal),
            _ => None,
        }
    }

    /// The wire value.
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            StatusCode::Validation => "validation",
            StatusCode::Parsing => "parsing",
            StatusCode::Ocr => "ocr",
            StatusCode::MissingDependency => "missing_dependency",
            StatusCode::Io => "io",
            StatusCode::Plugin => "plugin",
            StatusCode::UnsupportedFormat => "unsupported_format",
            StatusCode::Internal => "internal",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StatusCode::Validation => "Input validation error",
            StatusCode::Parsing => "Document parsing error",
            StatusCode::Ocr => "OCR processing error",
            StatusCode::MissingDependency => "Required dependency not available",
            StatusCode::Io => "File system or I/O error",
            StatusCode::Plugin => "Plugin registration or execution error",
            StatusCode::UnsupportedFormat => "Unsupported MIME type or document format",
            StatusCode::Internal => "Internal library error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_raw_covers_closed_set() {
        for code in StatusCode::ALL {
            assert_eq!(StatusCode::from_raw(code.as_raw()), Some(code));
        }
    }

    #[test]
    fn test_from_raw_rejects_unknown() {
        assert_eq!(StatusCode::from_raw(-1), None);
        assert_eq!(StatusCode::from_raw(8), None);
        assert_eq!(StatusCode::from_raw(99), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(StatusCode::MissingDependency.to_string(), "missing_dependency");
        assert_eq!(StatusCode::Internal.description(), "Internal library error");
    }
}
