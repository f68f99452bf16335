//! The one critical section around the native engine.
//!
//! Every native call, including frees and side-channel reads, goes through a
//! [`NativeSession`]. A session holds the process-wide lock for as long as it
//! lives, so a failed call and the read of its last-call error state can never
//! interleave with another thread's call. The session is not `Send`, so it
//! cannot be held across an `.await`.
//!
//! The lock is not re-entrant: code holding a session must not open another.

use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::sync::{Mutex, MutexGuard, PoisonError};

use docgate_native::{HandleKind, NativeEngine, NativeHandle, StringHandle};
use tracing::debug;

use crate::classify::{NativeFailure, classify};
use crate::error::{GatewayError, Result};

/// Serializes all native calls in the process, whatever the engine instance.
static NATIVE_CALLS: Mutex<()> = Mutex::new(());

/// Exclusive access to the native engine.
pub struct NativeSession<'e, E: NativeEngine + ?Sized> {
    engine: &'e E,
    _lock: MutexGuard<'static, ()>,
}

/// Block until no other native call is in flight, then open a session.
pub fn enter<E: NativeEngine + ?Sized>(engine: &E) -> NativeSession<'_, E> {
    // The lock guards no data, so a poisoned lock carries no broken state.
    let lock = NATIVE_CALLS.lock().unwrap_or_else(PoisonError::into_inner);
    debug!("Entered native critical section");
    NativeSession {
        engine,
        _lock: lock,
    }
}

impl<'e, E: NativeEngine + ?Sized> NativeSession<'e, E> {
    /// The engine, borrowed no longer than the session holds the lock.
    pub fn engine(&self) -> &E {
        self.engine
    }

    /// Read the last-call side channel. Must follow the failing call directly.
    pub fn last_failure(&self) -> NativeFailure {
        let message = self.engine.last_error_message();
        let code = self.engine.last_error_code();
        let panic_context = self.engine.last_panic_context().map(|handle| {
            let guard = HandleGuard::new(self.engine, handle);
            self.engine.read_string(&guard)
        });
        NativeFailure {
            message,
            code,
            panic_context,
        }
    }

    /// Classify the failure of the call that just returned.
    pub fn fail(&self) -> GatewayError {
        classify(&self.last_failure())
    }

    /// Guard a handle returned by a native call; a null return is classified.
    pub fn acquire<K: HandleKind>(
        &self,
        handle: Option<NativeHandle<K>>,
    ) -> Result<HandleGuard<'e, E, K>> {
        match handle {
            Some(handle) => Ok(HandleGuard::new(self.engine, handle)),
            None => Err(self.fail()),
        }
    }

    /// Acquire one handle, use it, and release it on every exit path.
    ///
    /// If `acquire` returns null, no handle exists and nothing is released.
    pub fn with_handle<K, T, A, U>(&self, acquire: A, use_handle: U) -> Result<T>
    where
        K: HandleKind,
        A: FnOnce(&E) -> Option<NativeHandle<K>>,
        U: FnOnce(&HandleGuard<'e, E, K>) -> Result<T>,
    {
        let guard = self.acquire(acquire(self.engine))?;
        use_handle(&guard)
    }

    /// Copy out and release a string returned by a native call.
    pub fn take_string(&self, handle: Option<StringHandle>) -> Result<String> {
        let guard = self.acquire(handle)?;
        Ok(self.engine.read_string(&guard))
    }
}

impl<E: NativeEngine + ?Sized> Drop for NativeSession<'_, E> {
    fn drop(&mut self) {
        debug!("Leaving native critical section");
    }
}

/// Releases its handle exactly once when dropped.
pub struct HandleGuard<'e, E: NativeEngine + ?Sized, K: HandleKind> {
    engine: &'e E,
    handle: ManuallyDrop<NativeHandle<K>>,
}

impl<'e, E: NativeEngine + ?Sized, K: HandleKind> HandleGuard<'e, E, K> {
    fn new(engine: &'e E, handle: NativeHandle<K>) -> Self {
        Self {
            engine,
            handle: ManuallyDrop::new(handle),
        }
    }
}

impl<E: NativeEngine + ?Sized, K: HandleKind> Deref for HandleGuard<'_, E, K> {
    type Target = NativeHandle<K>;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl<E: NativeEngine + ?Sized, K: HandleKind> Drop for HandleGuard<'_, E, K> {
    fn drop(&mut self) {
        // SAFETY: `drop` runs once and the field is never read afterwards.
        let handle = unsafe { ManuallyDrop::take(&mut self.handle) };
        debug!(kind = K::NAME, "Releasing native handle");
        K::release(self.engine, handle);
    }
}
