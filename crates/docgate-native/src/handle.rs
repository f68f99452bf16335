//! Opaque handles to memory owned by the native engine.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::NativeEngine;

mod sealed {
    pub trait Sealed {}
}

/// The kind of allocation a [`NativeHandle`] refers to.
///
/// Each kind knows which native free function releases it.
pub trait HandleKind: sealed::Sealed + Sized {
    /// Short name used in logs.
    const NAME: &'static str;

    /// Hand the allocation back to the engine.
    fn release<E: NativeEngine + ?Sized>(engine: &E, handle: NativeHandle<Self>);
}

/// A single extraction result (`CExtractionResult*`).
#[derive(Debug)]
pub enum ResultKind {}

/// A batch of extraction results (`CBatchResult*`), released as one unit.
#[derive(Debug)]
pub enum BatchKind {}

/// A parsed native configuration object.
#[derive(Debug)]
pub enum ConfigKind {}

/// A NUL-terminated string allocated by the engine.
#[derive(Debug)]
pub enum StringKind {}

impl sealed::Sealed for ResultKind {}
impl sealed::Sealed for BatchKind {}
impl sealed::Sealed for ConfigKind {}
impl sealed::Sealed for StringKind {}

impl HandleKind for ResultKind {
    const NAME: &'static str = "result";

    fn release<E: NativeEngine + ?Sized>(engine: &E, handle: NativeHandle<Self>) {
        engine.free_result(handle);
    }
}

impl HandleKind for BatchKind {
    const NAME: &'static str = "batch";

    fn release<E: NativeEngine + ?Sized>(engine: &E, handle: NativeHandle<Self>) {
        engine.free_batch(handle);
    }
}

impl HandleKind for ConfigKind {
    const NAME: &'static str = "config";

    fn release<E: NativeEngine + ?Sized>(engine: &E, handle: NativeHandle<Self>) {
        engine.config_free(handle);
    }
}

impl HandleKind for StringKind {
    const NAME: &'static str = "string";

    fn release<E: NativeEngine + ?Sized>(engine: &E, handle: NativeHandle<Self>) {
        engine.free_string(handle);
    }
}

/// Owning reference to one native allocation.
///
/// A handle is not `Clone`: passing it by value to its free function is the
/// only way to give it up, so it can be released at most once. Dropping a
/// handle without releasing it leaks the allocation; the gateway wraps every
/// handle in a guard that releases it on all exit paths.
pub struct NativeHandle<K: HandleKind> {
    ptr: NonNull<c_void>,
    _kind: PhantomData<K>,
}

// The engine's allocations are plain heap memory; moving the owning pointer
// to another thread is fine as long as calls stay serialized.
unsafe impl<K: HandleKind> Send for NativeHandle<K> {}

impl<K: HandleKind> NativeHandle<K> {
    /// Wrap a pointer returned by the engine.
    ///
    /// # Safety
    /// `ptr` must have been returned by the engine entry point that allocates
    /// this kind, must not have been released, and must not be wrapped twice.
    pub unsafe fn from_raw(ptr: NonNull<c_void>) -> Self {
        Self {
            ptr,
            _kind: PhantomData,
        }
    }

    /// Wrap a possibly-null pointer; null maps to `None`.
    ///
    /// # Safety
    /// Same contract as [`NativeHandle::from_raw`] for non-null pointers.
    pub unsafe fn from_ptr<T>(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr.cast::<c_void>()).map(|p| unsafe { Self::from_raw(p) })
    }

    /// The raw pointer, still owned by this handle.
    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr.as_ptr()
    }

    /// The raw pointer as a typed pointer.
    pub fn cast<T>(&self) -> *mut T {
        self.ptr.as_ptr().cast::<T>()
    }

    /// Give up ownership without releasing.
    pub fn into_raw(self) -> NonNull<c_void> {
        self.ptr
    }
}

impl<K: HandleKind> fmt::Debug for NativeHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeHandle<{}>({:p})", K::NAME, self.ptr)
    }
}

impl<K: HandleKind> PartialEq for NativeHandle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<K: HandleKind> Eq for NativeHandle<K> {}

/// Handle to a single extraction result.
pub type ResultHandle = NativeHandle<ResultKind>;
/// Handle to a batch of extraction results.
pub type BatchHandle = NativeHandle<BatchKind>;
/// Handle to a parsed native configuration.
pub type ConfigHandle = NativeHandle<ConfigKind>;
/// Handle to a native string.
pub type StringHandle = NativeHandle<StringKind>;
