//! Boundary call surface of the native extraction engine.
//!
//! This crate describes what the compiled engine offers and nothing more:
//! - [`NativeEngine`], one method per native entry point
//! - opaque [`NativeHandle`]s for every allocation the engine hands out
//! - [`RawResult`] / [`RawBatch`], payloads copied out of result handles
//! - the closed [`StatusCode`] set reported through the last-call side channel
//!
//! With the `native` feature, [`FfiEngine`] binds the real `extern "C"` symbols.
//! Nothing here serializes calls; that is the gateway's job.

mod engine;
mod handle;
mod payload;
mod status;

#[cfg(feature = "native")]
mod ffi;

pub use engine::NativeEngine;
pub use handle::{
    BatchHandle, BatchKind, ConfigHandle, ConfigKind, HandleKind, NativeHandle, ResultHandle,
    ResultKind, StringHandle, StringKind,
};
pub use payload::{NativeBytes, RawBatch, RawResult};
pub use status::StatusCode;

#[cfg(feature = "native")]
pub use ffi::FfiEngine;
