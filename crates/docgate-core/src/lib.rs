//! Safe gateway to the native document extraction engine.
//!
//! This crate provides:
//! - one process-wide critical section around every native call
//! - exactly-once release of native handles on every exit path
//! - typed errors classified from the engine's last-call side channel
//! - the extraction configuration model (merge, validation, JSON)
//! - decoding of native results and batches into typed values
//! - blocking, cancellable and async extraction entry points

pub mod classify;
mod critical;
pub mod error;
pub mod gateway;
pub mod materialize;
pub mod models;
pub mod validate;

pub use error::{ErrorKind, GatewayError, PanicContext, Result};
pub use gateway::{BytesWithMime, CancellationFlag, Gateway, find_config_file};
pub use models::config::{
    ChunkingConfig, EmbeddingPreset, ExtractionConfig, ImageExtractionConfig, KeywordConfig,
    OcrConfig, PdfConfig, TesseractConfig,
};
pub use models::metadata::{FormatMetadata, Metadata, PageStructure};
pub use models::result::{Chunk, Element, ExtractionResult, MetadataField, Table};
pub use validate::{
    validate_chunking_params, validate_confidence, validate_dpi, validate_tesseract_oem,
    validate_tesseract_psm,
};

/// Re-export the native call surface.
pub use docgate_native::{NativeEngine, StatusCode};

#[cfg(feature = "native")]
pub use docgate_native::FfiEngine;
