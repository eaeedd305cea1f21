use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use raw_window_handle::RawWindowHandle;

use super::{NativeSurfaceHandle, SurfaceBinding, SurfaceProvider};
use crate::coords::{SurfaceBounds, SurfaceSize};
use crate::device::BackendKind;
use crate::error::{Error, Result};

/// A native surface plus the provider that created it.
///
/// The handle slot is emptied before the native objects are released, so a
/// caller racing with teardown sees "already destroyed" instead of a handle
/// that is halfway gone. `destroy` is safe to call any number of times.
pub struct EmbeddedSurface {
    provider: Arc<dyn SurfaceProvider>,
    handle: Mutex<Option<NativeSurfaceHandle>>,
}

impl EmbeddedSurface {
    pub fn create(
        provider: Arc<dyn SurfaceProvider>,
        parent: RawWindowHandle,
        wants_direct_gl: bool,
    ) -> Result<Self> {
        let handle = provider.create_embedded(parent, wants_direct_gl)?;
        log::debug!("created embedded surface {handle:?} (direct gl: {wants_direct_gl})");
        Ok(Self::from_handle(provider, handle))
    }

    pub fn offscreen(provider: Arc<dyn SurfaceProvider>, size: SurfaceSize) -> Result<Self> {
        let handle = provider.create_offscreen(size)?;
        log::debug!("created offscreen surface {handle:?} ({}x{})", size.width, size.height);
        Ok(Self::from_handle(provider, handle))
    }

    pub fn from_handle(provider: Arc<dyn SurfaceProvider>, handle: NativeSurfaceHandle) -> Self {
        Self {
            provider,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// The live handle, or `None` once destroyed.
    pub fn handle(&self) -> Option<NativeSurfaceHandle> {
        *self.slot()
    }

    pub fn is_destroyed(&self) -> bool {
        self.slot().is_none()
    }

    /// Applies `bounds` to the native surface. A destroyed surface ignores it.
    pub fn resize(&self, bounds: SurfaceBounds) -> Result<()> {
        let slot = self.slot();
        match slot.as_ref() {
            Some(handle) => self.provider.resize(handle, bounds),
            None => Ok(()),
        }
    }

    pub fn binding(&self, backend: BackendKind) -> Result<SurfaceBinding> {
        let slot = self.slot();
        let handle = slot
            .as_ref()
            .ok_or_else(|| Error::context_state("surface already destroyed"))?;
        self.provider.binding(handle, backend)
    }

    /// Tears the native surface down.
    ///
    /// Returns `Ok(true)` for the call that actually released it and
    /// `Ok(false)` for every later (or concurrent) call.
    pub fn destroy(&self) -> Result<bool> {
        let Some(handle) = self.slot().take() else {
            return Ok(false);
        };

        log::debug!("destroying surface {handle:?}");
        self.provider.release(handle)?;
        Ok(true)
    }

    fn slot(&self) -> MutexGuard<'_, Option<NativeSurfaceHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for EmbeddedSurface {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            log::error!("failed to destroy native surface: {e:#}");
        }
    }
}

impl std::fmt::Debug for EmbeddedSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedSurface")
            .field("platform", &self.provider.platform())
            .field("handle", &self.handle())
            .finish()
    }
}
