use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle};

use super::{NativeSurfaceHandle, SurfaceProvider, TargetPlatform};
use crate::coords::{SurfaceBounds, SurfaceSize};
use crate::error::{Error, Result};

/// Provider that hands out fake Xlib handles and records what was done to them.
#[derive(Debug, Default)]
pub(crate) struct RecordingProvider {
    next_window: AtomicU64,
    created: AtomicUsize,
    released: AtomicUsize,
    resizes: Mutex<Vec<SurfaceBounds>>,
    reject_resizes: AtomicBool,
}

impl RecordingProvider {
    pub(crate) fn parent() -> RawWindowHandle {
        RawWindowHandle::Xlib(XlibWindowHandle::new(1))
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Makes every later `resize` fail, as a refused native call would.
    pub(crate) fn reject_resizes(&self) {
        self.reject_resizes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn resizes(&self) -> usize {
        self.resizes.lock().unwrap().len()
    }

    pub(crate) fn last_resize(&self) -> Option<SurfaceBounds> {
        self.resizes.lock().unwrap().last().copied()
    }

    fn fake_handle(&self, owned: bool) -> NativeSurfaceHandle {
        self.created.fetch_add(1, Ordering::SeqCst);
        NativeSurfaceHandle::Xlib {
            display: NonNull::<c_void>::dangling(),
            screen: 0,
            window: 100 + self.next_window.fetch_add(1, Ordering::SeqCst),
            visual_id: 0,
            owned,
        }
    }
}

impl SurfaceProvider for RecordingProvider {
    fn platform(&self) -> TargetPlatform {
        TargetPlatform::X11
    }

    fn display_handle(&self) -> Result<RawDisplayHandle> {
        Ok(RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)))
    }

    fn create_embedded(
        &self,
        _parent: RawWindowHandle,
        wants_direct_gl: bool,
    ) -> Result<NativeSurfaceHandle> {
        Ok(self.fake_handle(wants_direct_gl))
    }

    fn create_offscreen(&self, _size: SurfaceSize) -> Result<NativeSurfaceHandle> {
        Ok(self.fake_handle(true))
    }

    fn resize(&self, _handle: &NativeSurfaceHandle, bounds: SurfaceBounds) -> Result<()> {
        if self.reject_resizes.load(Ordering::SeqCst) {
            return Err(Error::native("resize refused", "fake native failure"));
        }
        self.resizes.lock().unwrap().push(bounds);
        Ok(())
    }

    fn release(&self, _handle: NativeSurfaceHandle) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
